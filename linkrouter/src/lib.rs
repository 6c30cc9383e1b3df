#![doc(issue_tracker_base_url = "https://github.com/chainbound/linkrouter/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub use linkrouter_common::{
    PrefixTrie, CAPABILITY_ROUTER_CONTROL, CAPABILITY_ROUTER_DATA, CAPABILITY_WAYPOINT,
};
pub use linkrouter_core::*;
