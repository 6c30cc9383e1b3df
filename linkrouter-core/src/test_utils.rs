use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use linkrouter_common::{Condition, Terminus};
use parking_lot::Mutex;

use crate::{Connection, ConnectionHandler, ConnectionId, Link, LinkId, RouterNotifier};

/// A work item as seen by the I/O layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    FirstAttach {
        conn: ConnectionId,
        link: LinkId,
        source: Option<Terminus>,
        target: Option<Terminus>,
    },
    SecondAttach { link: LinkId, source: Option<Terminus>, target: Option<Terminus> },
    Detach { link: LinkId, condition: Option<Condition> },
}

/// A [`ConnectionHandler`] that records everything it is handed.
#[derive(Debug, Default)]
pub(crate) struct Recorder {
    pub(crate) activations: AtomicUsize,
    pub(crate) events: Mutex<Vec<Event>>,
    /// Links handed out by first attaches, so tests can answer them.
    pub(crate) links: Mutex<Vec<Link>>,
}

impl Recorder {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Takes the recorded events, leaving the list empty.
    pub(crate) fn drain(&self) -> Vec<Event> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Returns the router-initiated link with the given id.
    pub(crate) fn link(&self, id: LinkId) -> Option<Link> {
        self.links.lock().iter().find(|link| link.id() == id).cloned()
    }
}

impl ConnectionHandler for Recorder {
    fn activate(&self, _conn: &Connection) {
        self.activations.fetch_add(1, Ordering::SeqCst);
    }

    fn first_attach(
        &self,
        conn: &Connection,
        link: &Link,
        source: Option<Terminus>,
        target: Option<Terminus>,
    ) {
        self.links.lock().push(link.clone());
        let event = Event::FirstAttach { conn: conn.id(), link: link.id(), source, target };
        self.events.lock().push(event);
    }

    fn second_attach(&self, link: &Link, source: Option<Terminus>, target: Option<Terminus>) {
        self.events.lock().push(Event::SecondAttach { link: link.id(), source, target });
    }

    fn detach(&self, link: &Link, condition: Option<Condition>) {
        self.events.lock().push(Event::Detach { link: link.id(), condition });
    }
}

/// A notification to the routing subsystem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Note {
    MobileAdded(String),
    MobileRemoved(String),
    LinkLost(usize),
}

/// A [`RouterNotifier`] that records into a shared list.
#[derive(Debug, Clone, Default)]
pub(crate) struct Notes(pub(crate) Arc<Mutex<Vec<Note>>>);

impl Notes {
    pub(crate) fn take(&self) -> Vec<Note> {
        std::mem::take(&mut *self.0.lock())
    }
}

impl RouterNotifier for Notes {
    fn mobile_added(&mut self, address: &str) {
        self.0.lock().push(Note::MobileAdded(address.to_string()));
    }

    fn mobile_removed(&mut self, address: &str) {
        self.0.lock().push(Note::MobileRemoved(address.to_string()));
    }

    fn link_lost(&mut self, mask_bit: usize) {
        self.0.lock().push(Note::LinkLost(mask_bit));
    }
}
