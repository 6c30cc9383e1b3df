use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, OnceLock,
    },
};

use linkrouter_common::{Condition, ConnectionRole, Direction, LinkType, Terminus};
use tracing::{debug, trace};

use crate::{
    action::{Action, ActionQueue},
    driver::CoreDriver,
    CoreError, CoreOptions, CoreStats, Connection, ConnectionHandler, ConnectionId, Link, LinkId,
};

/// State shared between the front-end handles, the connection and link handles, and the core
/// thread.
pub(crate) struct Shared {
    pub(crate) actions: ActionQueue,
    pub(crate) stats: CoreStats,
    handler: OnceLock<Arc<dyn ConnectionHandler>>,
    next_connection_id: AtomicU64,
    next_link_id: AtomicU64,
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shared")
            .field("pending_actions", &self.actions.len())
            .field("stats", &self.stats)
            .field("handler_registered", &self.handler.get().is_some())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn new() -> Self {
        Self {
            actions: ActionQueue::default(),
            stats: CoreStats::default(),
            handler: OnceLock::new(),
            next_connection_id: AtomicU64::new(0),
            next_link_id: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn handler(&self) -> Option<&Arc<dyn ConnectionHandler>> {
        self.handler.get()
    }

    #[inline]
    pub(crate) fn next_connection_id(&self) -> ConnectionId {
        ConnectionId(self.next_connection_id.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub(crate) fn next_link_id(&self) -> LinkId {
        LinkId(self.next_link_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Hands an action to the core thread.
    pub(crate) fn enqueue(&self, action: Action) {
        let name = action.name();
        match self.actions.enqueue(action) {
            Ok(()) => trace!(action = name, "enqueued action"),
            Err(_) => debug!(action = name, "core is shut down, dropping action"),
        }
    }
}

/// The front-end of the router core. Cheap to clone and usable from any thread.
///
/// Every operation here only enqueues an action; the effect takes place when the
/// [`CoreDriver`] executes it on the core thread. Actions are executed in the order they were
/// enqueued.
#[derive(Debug, Clone)]
pub struct RouterCore {
    shared: Arc<Shared>,
}

impl RouterCore {
    /// Creates a new router core, returning the front-end handle and the driver that owns the
    /// router state. The driver must be run (see [`CoreDriver::spawn`]) for any action to take
    /// effect.
    pub fn new(options: CoreOptions) -> (Self, CoreDriver) {
        let shared = Arc::new(Shared::new());
        let driver = CoreDriver::new(Arc::clone(&shared), options);

        (Self { shared }, driver)
    }

    pub(crate) fn shared(&self) -> Arc<Shared> {
        Arc::clone(&self.shared)
    }

    /// Registers the output callbacks. This can only be done once, and must be done before the
    /// first connection is opened.
    pub fn register_handlers(&self, handler: Arc<dyn ConnectionHandler>) -> Result<(), CoreError> {
        self.shared.handler.set(handler).map_err(|_| CoreError::HandlersAlreadyRegistered)
    }

    /// Signals a new transport-level connection. The returned handle is usable immediately; the
    /// connection becomes visible to the router once the core thread processes it.
    pub fn connection_opened(
        &self,
        incoming: bool,
        role: ConnectionRole,
        label: impl Into<String>,
    ) -> Connection {
        let conn = Connection::new(self.shared(), incoming, role, label.into());
        self.shared.enqueue(Action::ConnectionOpened(conn.clone()));
        conn
    }

    /// Signals that a connection closed.
    pub fn connection_closed(&self, conn: &Connection) {
        self.shared.enqueue(Action::ConnectionClosed(conn.clone()));
    }

    /// Signals a first attach from the peer. The link type is derived from the termini's
    /// capabilities.
    pub fn link_first_attach(
        &self,
        conn: &Connection,
        direction: Direction,
        source: Option<Terminus>,
        target: Option<Terminus>,
    ) -> Link {
        let link_type = LinkType::from_termini(source.as_ref(), target.as_ref());
        let id = self.shared.next_link_id();
        let link = Link::new(self.shared(), id, conn.id(), link_type, direction);

        self.shared.enqueue(Action::LinkFirstAttach {
            conn: conn.clone(),
            link: link.clone(),
            source,
            target,
        });

        link
    }

    /// Signals a second attach from the peer, for a link the router initiated.
    pub fn link_second_attach(
        &self,
        link: &Link,
        source: Option<Terminus>,
        target: Option<Terminus>,
    ) {
        link.core().enqueue(Action::LinkSecondAttach { link: link.clone(), source, target });
    }

    /// Signals a detach from the peer.
    pub fn link_detach(&self, link: &Link, condition: Option<Condition>) {
        link.core().enqueue(Action::LinkDetach { link: link.clone(), condition });
    }

    /// Returns the core statistics.
    pub fn stats(&self) -> &CoreStats {
        &self.shared.stats
    }
}
