use std::collections::VecDeque;

use linkrouter_common::{Condition, Terminus};
use parking_lot::{Condvar, Mutex};

use crate::{Connection, Link};

/// A request from any thread, executed later by the core thread.
#[derive(Debug)]
pub(crate) enum Action {
    ConnectionOpened(Connection),
    ConnectionClosed(Connection),
    LinkFirstAttach {
        conn: Connection,
        link: Link,
        source: Option<Terminus>,
        target: Option<Terminus>,
    },
    LinkSecondAttach {
        link: Link,
        source: Option<Terminus>,
        target: Option<Terminus>,
    },
    LinkDetach {
        link: Link,
        condition: Option<Condition>,
    },
}

impl Action {
    pub(crate) const fn name(&self) -> &'static str {
        match self {
            Self::ConnectionOpened(_) => "connection_opened",
            Self::ConnectionClosed(_) => "connection_closed",
            Self::LinkFirstAttach { .. } => "link_first_attach",
            Self::LinkSecondAttach { .. } => "link_second_attach",
            Self::LinkDetach { .. } => "link_detach",
        }
    }
}

/// Actions taken off the queue in one go.
#[derive(Debug)]
pub(crate) struct Batch {
    pub(crate) actions: VecDeque<Action>,
    /// Whether the queue was closed when the batch was taken. A closed batch is drained with
    /// `discard` set.
    pub(crate) closed: bool,
}

#[derive(Debug, Default)]
struct QueueInner {
    actions: VecDeque<Action>,
    closed: bool,
}

/// The FIFO of actions waiting for the core thread. Any thread may push, only the core thread
/// takes.
#[derive(Debug, Default)]
pub(crate) struct ActionQueue {
    inner: Mutex<QueueInner>,
    ready: Condvar,
}

impl ActionQueue {
    /// Appends an action. Returns the action back if the queue has been closed.
    pub(crate) fn enqueue(&self, action: Action) -> Result<(), Action> {
        {
            let mut inner = self.inner.lock();
            if inner.closed {
                return Err(action);
            }
            inner.actions.push_back(action);
        }

        self.ready.notify_one();
        Ok(())
    }

    /// Takes every pending action without blocking.
    pub(crate) fn take(&self) -> Batch {
        let mut inner = self.inner.lock();
        Batch { actions: std::mem::take(&mut inner.actions), closed: inner.closed }
    }

    /// Blocks until there is at least one pending action or the queue is closed, then takes
    /// every pending action.
    pub(crate) fn wait(&self) -> Batch {
        let mut inner = self.inner.lock();
        while inner.actions.is_empty() && !inner.closed {
            self.ready.wait(&mut inner);
        }
        Batch { actions: std::mem::take(&mut inner.actions), closed: inner.closed }
    }

    /// Closes the queue. Further actions are refused and a waiting core thread wakes up.
    pub(crate) fn close(&self) {
        self.inner.lock().closed = true;
        self.ready.notify_all();
    }

    /// Returns the number of pending actions.
    pub(crate) fn len(&self) -> usize {
        self.inner.lock().actions.len()
    }
}
