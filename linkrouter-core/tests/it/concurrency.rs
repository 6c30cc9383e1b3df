use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use linkrouter_core::{
    Connection, ConnectionRole, CoreOptions, Direction, RouterCore, RouterNotifier, Terminus,
};
use tokio::{sync::Notify, task::JoinSet, time::timeout};

use crate::{setup, Io, Output};

const CLIENTS: usize = 8;
const LINKS: usize = 64;

#[derive(Debug, Clone, Default)]
struct Mobile {
    added: Arc<AtomicUsize>,
    removed: Arc<AtomicUsize>,
}

impl RouterNotifier for Mobile {
    fn mobile_added(&mut self, _address: &str) {
        self.added.fetch_add(1, Ordering::Relaxed);
    }

    fn mobile_removed(&mut self, _address: &str) {
        self.removed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Processes the connection's work whenever it is activated, until `done` holds.
async fn drive(conn: &Connection, notify: &Notify, done: impl Fn() -> bool) {
    loop {
        // Speculative: a no-op when nothing is pending.
        conn.process();
        if done() {
            return;
        }
        notify.notified().await;
    }
}

/// A client that attaches receivers on its own addresses, waits for every accept, then
/// detaches them all and waits for the reciprocal detaches.
async fn client(core: RouterCore, io: Arc<Io>, id: usize) {
    let conn = core.connection_opened(true, ConnectionRole::Normal, format!("client-{id}"));
    let notify = Arc::new(Notify::new());
    conn.set_context(notify.clone());

    let links: Vec<_> = (0..LINKS)
        .map(|n| {
            let source = Some(Terminus::new(format!("client.{id}.{n}")));
            core.link_first_attach(&conn, Direction::Outgoing, source, None)
        })
        .collect();

    let accepted = || io.count(conn.id(), |o| matches!(o, Output::SecondAttach { .. })) == LINKS;
    drive(&conn, &notify, accepted).await;

    for link in &links {
        core.link_detach(link, None);
    }

    let detached = || io.count(conn.id(), |o| matches!(o, Output::Detach { .. })) == LINKS;
    drive(&conn, &notify, detached).await;

    // Work arrives in the order the links were attached.
    let order: Vec<_> = io
        .take(&conn)
        .into_iter()
        .filter_map(|o| match o {
            Output::SecondAttach { link } => Some(link),
            _ => None,
        })
        .collect();
    let expected: Vec<_> = links.iter().map(|l| l.id()).collect();
    assert_eq!(order, expected);

    core.connection_closed(&conn);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn connections_driven_from_tasks() {
    let (core, mut driver, io) = setup(CoreOptions::default().router_id("Router.T"));
    let mobile = Mobile::default();
    driver.set_notifier(mobile.clone());
    let thread = driver.spawn().unwrap();

    let mut clients = JoinSet::new();
    for id in 0..CLIENTS {
        clients.spawn(client(core.clone(), Arc::clone(&io), id));
    }

    let all = async {
        while let Some(result) = clients.join_next().await {
            result.unwrap();
        }
    };
    timeout(Duration::from_secs(10), all).await.expect("clients timed out");

    // Wait for the closes to be executed before stopping the core.
    let closed = async {
        while core.stats().open_connections() > 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    timeout(Duration::from_secs(5), closed).await.expect("closes timed out");

    let driver = thread.shutdown().unwrap();
    let state = driver.state();
    assert_eq!(state.open_connections().count(), 0);
    assert_eq!(state.links().count(), 0);
    assert_eq!(state.addresses().len(), CLIENTS * LINKS);

    let stats = core.stats();
    assert_eq!(stats.actions_processed(), CLIENTS * (2 * LINKS + 2));
    assert_eq!(stats.actions_discarded(), 0);
    assert_eq!(stats.links_created(), CLIENTS * LINKS);
    assert_eq!(stats.work_delivered(), CLIENTS * 2 * LINKS);

    assert_eq!(mobile.added.load(Ordering::Relaxed), CLIENTS * LINKS);
    assert_eq!(mobile.removed.load(Ordering::Relaxed), CLIENTS * LINKS);
}

#[test]
fn actions_after_shutdown_are_dropped() {
    let (core, driver, _io) = setup(CoreOptions::default());
    let thread = driver.spawn().unwrap();

    let conn = core.connection_opened(true, ConnectionRole::Normal, "client");
    let driver = thread.shutdown().unwrap();

    core.connection_closed(&conn);
    let stats = core.stats();
    assert_eq!(stats.actions_processed() + stats.actions_discarded(), 1);
    assert_eq!(driver.state().open_connections().count(), stats.open_connections());
}
