use std::{any::Any, collections::VecDeque, fmt, sync::Arc};

use derive_more::Display;
use linkrouter_common::{Condition, ConnectionRole, Terminus};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::{router::Shared, Link};

/// An opaque user context attached to a connection or link by the I/O layer. The core never
/// looks inside it.
pub type Context = Arc<dyn Any + Send + Sync>;

/// The identity of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("conn-{_0}")]
pub struct ConnectionId(pub(crate) u64);

/// Output callbacks from the core to the I/O layer.
///
/// [`ConnectionHandler::activate`] is called on the core thread; it must make sure the
/// connection's own I/O thread eventually calls [`Connection::process`]. The other callbacks
/// are called from within [`Connection::process`], on the I/O thread.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// The connection has new work pending.
    fn activate(&self, conn: &Connection);

    /// Issue a first attach for a link created by the router.
    fn first_attach(
        &self,
        conn: &Connection,
        link: &Link,
        source: Option<Terminus>,
        target: Option<Terminus>,
    );

    /// Issue a second attach, accepting a link.
    fn second_attach(&self, link: &Link, source: Option<Terminus>, target: Option<Terminus>);

    /// Issue a detach, rejecting or closing a link.
    fn detach(&self, link: &Link, condition: Option<Condition>);
}

/// An outbound notification waiting for the connection's I/O thread.
#[derive(Debug)]
pub(crate) enum ConnectionWork {
    FirstAttach { link: Link, source: Option<Terminus>, target: Option<Terminus> },
    SecondAttach { link: Link, source: Option<Terminus>, target: Option<Terminus> },
    Detach { link: Link, condition: Option<Condition> },
}

impl ConnectionWork {
    /// Returns the link the work item is about.
    pub(crate) fn link(&self) -> &Link {
        match self {
            Self::FirstAttach { link, .. } |
            Self::SecondAttach { link, .. } |
            Self::Detach { link, .. } => link,
        }
    }
}

struct ConnectionInner {
    id: ConnectionId,
    incoming: bool,
    role: ConnectionRole,
    label: String,
    context: Mutex<Option<Context>>,
    /// Pending work, appended by the core thread and drained by the I/O thread.
    work: Mutex<VecDeque<ConnectionWork>>,
    core: Arc<Shared>,
}

/// A handle to a connection, shared by the I/O layer and the core.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("incoming", &self.inner.incoming)
            .field("role", &self.inner.role)
            .field("label", &self.inner.label)
            .finish_non_exhaustive()
    }
}

impl Connection {
    pub(crate) fn new(
        core: Arc<Shared>,
        incoming: bool,
        role: ConnectionRole,
        label: String,
    ) -> Self {
        let id = core.next_connection_id();
        Self {
            inner: Arc::new(ConnectionInner {
                id,
                incoming,
                role,
                label,
                context: Mutex::new(None),
                work: Mutex::new(VecDeque::new()),
                core,
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> ConnectionId {
        self.inner.id
    }

    /// Returns `true` if the peer initiated the connection.
    #[inline]
    pub fn is_incoming(&self) -> bool {
        self.inner.incoming
    }

    #[inline]
    pub fn role(&self) -> ConnectionRole {
        self.inner.role
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Attaches a user context to the connection.
    pub fn set_context(&self, context: Context) {
        *self.inner.context.lock() = Some(context);
    }

    /// Returns the user context, if any.
    pub fn context(&self) -> Option<Context> {
        self.inner.context.lock().clone()
    }

    /// Returns the user context if it is a `T`.
    pub fn context_as<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.context()?.downcast::<T>().ok()
    }

    /// Returns the number of work items waiting to be processed.
    pub fn pending_work(&self) -> usize {
        self.inner.work.lock().len()
    }

    /// Delivers all pending work to the registered [`ConnectionHandler`], in the order it was
    /// queued. Must be called from the connection's own I/O thread. Calling it with nothing
    /// pending is a no-op.
    ///
    /// Returns the number of work items delivered.
    pub fn process(&self) -> usize {
        let Some(handler) = self.inner.core.handler() else {
            warn!(conn = %self.id(), "no connection handler registered, leaving work queued");
            return 0;
        };

        // Swap out the whole list so the handlers run without the lock held.
        let work = std::mem::take(&mut *self.inner.work.lock());
        let delivered = work.len();

        for item in work {
            match item {
                ConnectionWork::FirstAttach { link, source, target } => {
                    handler.first_attach(self, &link, source, target)
                }
                ConnectionWork::SecondAttach { link, source, target } => {
                    handler.second_attach(&link, source, target)
                }
                ConnectionWork::Detach { link, condition } => handler.detach(&link, condition),
            }
        }

        if delivered > 0 {
            trace!(conn = %self.id(), delivered, "processed connection work");
            self.inner.core.stats.add_work_delivered(delivered);
        }

        delivered
    }

    /// Appends a work item. Activates the connection if the list was empty.
    pub(crate) fn enqueue_work(&self, work: ConnectionWork) {
        let notify = {
            let mut queue = self.inner.work.lock();
            queue.push_back(work);
            queue.len() == 1
        };

        if notify {
            match self.inner.core.handler() {
                Some(handler) => handler.activate(self),
                None => {
                    warn!(conn = %self.id(), "no connection handler registered, cannot activate")
                }
            }
        }
    }

    /// Drops every undelivered work item, returning how many were dropped.
    pub(crate) fn discard_work(&self) -> usize {
        let work = std::mem::take(&mut *self.inner.work.lock());
        work.len()
    }
}
