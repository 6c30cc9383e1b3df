use linkrouter_core::{
    Condition, ConnectionRole, CoreError, CoreOptions, Direction, HashKey, LinkType, NoopNotifier,
    Terminus,
};

use crate::{setup, Output};

#[test]
fn handlers_register_once() {
    let (core, _driver, io) = setup(CoreOptions::default());
    assert!(matches!(core.register_handlers(io), Err(CoreError::HandlersAlreadyRegistered)));
}

#[test]
fn open_connections_track_open_and_close() {
    let (core, mut driver, _io) = setup(CoreOptions::default());

    let conns: Vec<_> = (0..10)
        .map(|i| core.connection_opened(i % 2 == 0, ConnectionRole::Normal, format!("c{i}")))
        .collect();
    for conn in conns.iter().step_by(3) {
        core.connection_closed(conn);
    }

    assert_eq!(driver.process_pending(), 14);
    assert_eq!(driver.state().open_connections().count(), 6);
    assert_eq!(core.stats().open_connections(), 6);

    // Still in the order they were opened.
    let ids: Vec<_> = driver.state().open_connections().map(|c| c.connection().id()).collect();
    let expected: Vec<_> =
        conns.iter().enumerate().filter(|(i, _)| i % 3 != 0).map(|(_, c)| c.id()).collect();
    assert_eq!(ids, expected);
}

#[test]
fn inter_router_connector_creates_four_links() {
    let (core, mut driver, io) = setup(CoreOptions::default());
    let conn = core.connection_opened(false, ConnectionRole::InterRouter, "router.b");
    driver.process_pending();

    assert_eq!(conn.pending_work(), 4);
    assert_eq!(conn.process(), 4);

    let kinds: Vec<_> = io
        .take(&conn)
        .into_iter()
        .map(|output| match output {
            Output::FirstAttach { link, .. } => {
                let link = io.link(link);
                (link.link_type(), link.direction())
            }
            other => panic!("unexpected output {other:?}"),
        })
        .collect();
    assert_eq!(
        kinds,
        [
            (LinkType::Control, Direction::Incoming),
            (LinkType::Control, Direction::Outgoing),
            (LinkType::Router, Direction::Incoming),
            (LinkType::Router, Direction::Outgoing),
        ]
    );
}

/// An anonymous sender is accepted without an address. Accepting a peer-initiated link
/// answers it with a second attach, so this is the one work item queued.
#[test]
fn anonymous_target_is_accepted() {
    let (core, mut driver, io) = setup(CoreOptions::default());
    let conn = core.connection_opened(true, ConnectionRole::Normal, "client");
    let link = core.link_first_attach(&conn, Direction::Incoming, None, Some(Terminus::anonymous()));
    driver.process_pending();

    assert_eq!(conn.process(), 1);
    assert_eq!(io.take(&conn), [Output::SecondAttach { link: link.id() }]);
    assert!(driver.state().link_address(link.id()).is_none());
    assert_eq!(core.stats().links_rejected(), 0);
}

#[test]
fn unknown_target_has_no_route() {
    let (core, mut driver, io) = setup(CoreOptions::default());
    let conn = core.connection_opened(true, ConnectionRole::Normal, "client");
    let target = Some(Terminus::new("nowhere"));
    let link = core.link_first_attach(&conn, Direction::Incoming, None, target);
    driver.process_pending();
    conn.process();

    let condition = Some(Condition::NoRouteToDestination);
    assert_eq!(io.take(&conn), [Output::Detach { link: link.id(), condition }]);
    assert!(driver.state().addresses().get_by_key(&HashKey::message("nowhere")).is_none());
}

#[test]
fn control_link_on_normal_connection_is_forbidden() {
    let (core, mut driver, io) = setup(CoreOptions::default());
    let conn = core.connection_opened(true, ConnectionRole::Normal, "client");
    let source = Some(Terminus::router_control());
    let link = core.link_first_attach(&conn, Direction::Incoming, source, None);
    driver.process_pending();
    conn.process();

    let condition = Some(Condition::Forbidden);
    assert_eq!(io.take(&conn), [Output::Detach { link: link.id(), condition }]);
}

#[test]
fn link_route_beats_message_route() {
    let options = CoreOptions::default().link_route("broker", None, "broker-conn");
    let (core, mut driver, _io) = setup(options);

    // Creates the message-routed "broker.q" address.
    let conn = core.connection_opened(true, ConnectionRole::Normal, "client");
    let source = Some(Terminus::new("broker.q"));
    core.link_first_attach(&conn, Direction::Outgoing, source, None);
    driver.process_pending();

    let terminus = Terminus::new("broker.q");
    let state = driver.state_mut();
    let first = state.lookup_terminus_address(Direction::Incoming, &terminus, false, false);
    let second = state.lookup_terminus_address(Direction::Incoming, &terminus, false, false);
    assert_eq!(first, second);
    assert!(first.link_route);

    let addr = state.addresses().get(first.address.unwrap()).unwrap();
    assert_eq!(addr.key(), &HashKey::link_route(Direction::Incoming, "broker"));
}

#[test]
fn shutdown_discards_pending_actions() {
    let (core, mut driver, io) = setup(CoreOptions::default());
    driver.set_notifier(NoopNotifier);

    let conn = core.connection_opened(true, ConnectionRole::Normal, "client");
    core.link_first_attach(&conn, Direction::Outgoing, Some(Terminus::new("q")), None);
    assert_eq!(driver.shutdown(), 2);

    // Refused from here on.
    core.connection_closed(&conn);
    assert_eq!(driver.process_pending(), 0);

    assert_eq!(core.stats().actions_discarded(), 2);
    assert_eq!(core.stats().actions_processed(), 0);
    assert!(driver.state().addresses().is_empty());
    assert_eq!(conn.process(), 0);
    assert!(io.take(&conn).is_empty());
}
