use derive_more::Display;

use crate::{Terminus, CAPABILITY_ROUTER_CONTROL, CAPABILITY_ROUTER_DATA, CAPABILITY_WAYPOINT};

/// The direction of a link, seen from the router.
///
/// An incoming link carries deliveries from the peer into the router, an outgoing link carries
/// deliveries from the router to the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Direction {
    /// Deliveries flow from the peer into the router.
    #[display("incoming")]
    Incoming,
    /// Deliveries flow from the router to the peer.
    #[display("outgoing")]
    Outgoing,
}

impl Direction {
    /// Returns the opposite direction.
    #[inline]
    pub const fn reverse(self) -> Self {
        match self {
            Self::Incoming => Self::Outgoing,
            Self::Outgoing => Self::Incoming,
        }
    }
}

/// The role a link plays in the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum LinkType {
    /// A link to or from an ordinary client or broker.
    #[display("endpoint")]
    Endpoint,
    /// An inter-router control link.
    #[display("control")]
    Control,
    /// An inter-router link for routed message transfer.
    #[display("router")]
    Router,
    /// A link to a waypoint. Only the router itself creates these.
    #[display("waypoint")]
    Waypoint,
}

impl LinkType {
    /// Returns `true` for link types that may only exist on inter-router connections.
    #[inline]
    pub const fn is_inter_router(self) -> bool {
        matches!(self, Self::Control | Self::Router)
    }

    /// Derives the type of a peer-initiated link from the capabilities of its termini.
    ///
    /// Control takes precedence over router-data, which takes precedence over waypoint.
    pub fn from_termini(source: Option<&Terminus>, target: Option<&Terminus>) -> Self {
        let has = |capability: &str| {
            source.is_some_and(|t| t.has_capability(capability)) ||
                target.is_some_and(|t| t.has_capability(capability))
        };

        if has(CAPABILITY_ROUTER_CONTROL) {
            Self::Control
        } else if has(CAPABILITY_ROUTER_DATA) {
            Self::Router
        } else if has(CAPABILITY_WAYPOINT) {
            Self::Waypoint
        } else {
            Self::Endpoint
        }
    }
}

/// The role of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ConnectionRole {
    /// A client or broker connection.
    #[display("normal")]
    Normal,
    /// A connection to a peer router.
    #[display("inter-router")]
    InterRouter,
    /// A connection opened on demand, used for link-route destinations.
    #[display("on-demand")]
    OnDemand,
}
