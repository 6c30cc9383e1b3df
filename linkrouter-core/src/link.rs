use std::{any::Any, fmt, sync::Arc};

use derive_more::Display;
use linkrouter_common::{Direction, LinkType};
use parking_lot::Mutex;

use crate::{router::Shared, Context, ConnectionId};

/// The identity of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("link-{_0}")]
pub struct LinkId(pub(crate) u64);

struct LinkInner {
    id: LinkId,
    conn: ConnectionId,
    link_type: LinkType,
    direction: Direction,
    context: Mutex<Option<Context>>,
    core: Arc<Shared>,
}

/// A handle to a link. The link refers to its connection by id only; the core owns the
/// association.
#[derive(Clone)]
pub struct Link {
    inner: Arc<LinkInner>,
}

impl fmt::Debug for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Link")
            .field("id", &self.inner.id)
            .field("conn", &self.inner.conn)
            .field("link_type", &self.inner.link_type)
            .field("direction", &self.inner.direction)
            .finish_non_exhaustive()
    }
}

impl Link {
    pub(crate) fn new(
        core: Arc<Shared>,
        id: LinkId,
        conn: ConnectionId,
        link_type: LinkType,
        direction: Direction,
    ) -> Self {
        Self {
            inner: Arc::new(LinkInner {
                id,
                conn,
                link_type,
                direction,
                context: Mutex::new(None),
                core,
            }),
        }
    }

    #[inline]
    pub fn id(&self) -> LinkId {
        self.inner.id
    }

    /// Returns the id of the connection the link belongs to.
    #[inline]
    pub fn connection_id(&self) -> ConnectionId {
        self.inner.conn
    }

    #[inline]
    pub fn link_type(&self) -> LinkType {
        self.inner.link_type
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.inner.direction
    }

    /// Attaches a user context to the link.
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

    pub(crate) fn core(&self) -> &Arc<Shared> {
        &self.inner.core
    }
}
