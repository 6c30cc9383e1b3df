//! Common types shared by the linkrouter crates.
//!
//! These are the vocabulary types that cross the boundary between the router core and the
//! I/O layer: link and connection attributes, termini, detach conditions and address
//! distribution semantics.

mod condition;
pub use condition::Condition;

mod semantics;
pub use semantics::{Bias, Congestion, Fanout, Semantics};

mod terminus;
pub use terminus::{
    Terminus, CAPABILITY_ROUTER_CONTROL, CAPABILITY_ROUTER_DATA, CAPABILITY_WAYPOINT,
};

mod trie;
pub use trie::PrefixTrie;

mod types;
pub use types::{ConnectionRole, Direction, LinkType};
