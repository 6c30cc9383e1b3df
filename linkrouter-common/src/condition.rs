use std::fmt;

/// A detach (or reject) condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// No route exists for the attach's address.
    NoRouteToDestination,
    /// The far end of a link-routed link went away.
    RoutedLinkLost,
    /// The attach is not allowed on this connection.
    Forbidden,
    /// A condition supplied by the peer.
    Remote {
        /// The symbolic condition name.
        name: String,
        /// An optional human readable description.
        description: Option<String>,
    },
}

impl Condition {
    /// Creates a peer-supplied condition.
    pub fn remote(name: impl Into<String>, description: Option<String>) -> Self {
        Self::Remote { name: name.into(), description }
    }

    /// Returns the symbolic AMQP condition name.
    pub fn name(&self) -> &str {
        match self {
            Self::NoRouteToDestination => "qd:no-route-to-dest",
            Self::RoutedLinkLost => "qd:routed-link-lost",
            Self::Forbidden => "qd:forbidden",
            Self::Remote { name, .. } => name,
        }
    }

    /// Returns the description of the condition.
    pub fn description(&self) -> Option<&str> {
        match self {
            Self::NoRouteToDestination => Some("No route to the destination node"),
            Self::RoutedLinkLost => Some("Connectivity to the node is lost"),
            Self::Forbidden => Some("Connectivity to the node is forbidden"),
            Self::Remote { description, .. } => description.as_deref(),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.description() {
            Some(description) => write!(f, "{} ({description})", self.name()),
            None => f.write_str(self.name()),
        }
    }
}
