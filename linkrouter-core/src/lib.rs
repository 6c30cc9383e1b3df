//! The router core: a single thread that owns the address table and the connection and link
//! registry, fed by an action queue that any I/O thread may push to. Results flow back to the
//! I/O threads through per-connection work queues.

use std::io;

use thiserror::Error;

mod action;

mod address;
pub use address::{prefix_for, Address, AddressId, AddressTable, HashKey};

mod connection;
pub use connection::{Connection, ConnectionHandler, ConnectionId, Context};

mod driver;
pub use driver::{CoreDriver, CoreThread};

mod lifecycle;

mod link;
pub use link::{Link, LinkId};

mod mask;

mod notify;
pub use notify::{NoopNotifier, RouterNotifier};

mod options;
pub use options::{CoreOptions, LinkRouteConfig};

mod router;
pub use router::RouterCore;

mod state;
pub use state::{ConnectionRecord, CoreState, LinkRecord, Resolution};

mod stats;
pub use stats::CoreStats;

#[cfg(test)]
mod test_utils;

pub use linkrouter_common::{
    Bias, Condition, Congestion, ConnectionRole, Direction, Fanout, LinkType, Semantics, Terminus,
};

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Connection handlers already registered")]
    HandlersAlreadyRegistered,
    #[error("Failed to spawn core thread: {0:?}")]
    Spawn(#[from] io::Error),
    #[error("Core thread panicked")]
    CorePanicked,
}
