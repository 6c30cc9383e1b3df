//! Core-thread handlers for connection and link events.
//!
//! Every outcome (accept, reject, forward) is expressed as work queued on a connection; none of
//! these handlers fail.

use std::sync::Arc;

use linkrouter_common::{Condition, ConnectionRole, Direction, LinkType, Terminus};
use tracing::{debug, error, info, trace, warn};

use crate::{
    action::Action,
    connection::ConnectionWork,
    state::{ConnectionRecord, CoreState, LinkRecord},
    AddressId, Connection, ConnectionId, Link, LinkId,
};

impl CoreState {
    /// Executes an action. With `discard` set the action is only released.
    pub(crate) fn execute(&mut self, action: Action, discard: bool) {
        if discard {
            trace!(action = action.name(), "discarding action");
            self.shared.stats.increment_discarded();
            return;
        }

        trace!(action = action.name(), "executing action");
        match action {
            Action::ConnectionOpened(conn) => self.connection_opened(conn),
            Action::ConnectionClosed(conn) => self.connection_closed(&conn),
            Action::LinkFirstAttach { conn, link, source, target } => {
                self.link_first_attach(&conn, link, source, target)
            }
            Action::LinkSecondAttach { link, source, target } => {
                self.link_second_attach(&link, source, target)
            }
            Action::LinkDetach { link, condition } => self.link_detach(&link, condition),
        }
        self.shared.stats.increment_processed();
    }

    fn connection_opened(&mut self, conn: Connection) {
        let id = conn.id();
        let role = conn.role();
        self.connections.insert(id, ConnectionRecord::new(conn.clone()));
        self.shared.stats.increment_open_connections();
        debug!(
            conn = %id,
            %role,
            label = conn.label(),
            incoming = conn.is_incoming(),
            "connection opened"
        );

        match role {
            ConnectionRole::Normal => {}
            ConnectionRole::InterRouter => {
                let bit = match self.mask_bits.claim() {
                    Ok(bit) => bit,
                    Err(e) => {
                        error!(critical = true, conn = %id, "{e}");
                        return;
                    }
                };

                if let Some(record) = self.connections.get_mut(&id) {
                    record.mask_bit = Some(bit);
                }
                info!(conn = %id, mask_bit = bit, "inter-router connection established");

                // The connector side sets up the inter-router links: control and routed-data,
                // one of each direction.
                if !conn.is_incoming() {
                    let links = [
                        (LinkType::Control, Direction::Incoming, Terminus::router_control()),
                        (LinkType::Control, Direction::Outgoing, Terminus::router_control()),
                        (LinkType::Router, Direction::Incoming, Terminus::router_data()),
                        (LinkType::Router, Direction::Outgoing, Terminus::router_data()),
                    ];
                    for (link_type, direction, terminus) in links {
                        let (source, target) = match direction {
                            Direction::Incoming => (Some(terminus), None),
                            Direction::Outgoing => (None, Some(terminus)),
                        };
                        self.create_link(id, link_type, direction, source, target);
                    }
                }
            }
            ConnectionRole::OnDemand => self.activate_link_routes(&conn),
        }
    }

    fn connection_closed(&mut self, conn: &Connection) {
        let id = conn.id();
        let Some(links) = self.connections.get(&id).map(|record| record.links.clone()) else {
            warn!(conn = %id, "close for unknown connection");
            return;
        };

        if conn.role() == ConnectionRole::OnDemand {
            self.deactivate_link_routes(id);
        }

        for link_id in links {
            let peer = self.links.get(&link_id).and_then(|record| record.peer);
            if let Some(peer) = peer {
                self.sever_peer(peer);
            }
            self.release_link(link_id);
        }

        if let Some(record) = self.connections.remove(&id) {
            if let Some(bit) = record.mask_bit {
                self.mask_bits.release(bit);
            }
        }
        self.shared.stats.decrement_open_connections();

        let dropped = conn.discard_work();
        debug!(conn = %id, dropped_work = dropped, "connection closed");
    }

    fn link_first_attach(
        &mut self,
        conn: &Connection,
        link: Link,
        source: Option<Terminus>,
        target: Option<Terminus>,
    ) {
        let link_id = link.id();
        let link_type = link.link_type();
        let direction = link.direction();

        let Some(record) = self.connections.get_mut(&conn.id()) else {
            warn!(conn = %conn.id(), link = %link_id, "first attach on unknown connection");
            return;
        };
        record.links.push(link_id);
        let routing = record.mask_bit.is_some();
        self.links.insert(link_id, LinkRecord::new(link));
        self.shared.stats.increment_links_created();
        debug!(conn = %conn.id(), link = %link_id, %link_type, %direction, "first attach");

        // Inter-router links are only allowed on inter-router connections that hold a mask
        // bit, and waypoint links are only ever initiated by the router.
        let forbidden = if link_type.is_inter_router() {
            !routing
        } else {
            link_type == LinkType::Waypoint
        };
        if forbidden {
            self.reject_link(link_id, Condition::Forbidden);
            return;
        }

        match (link_type, direction) {
            (LinkType::Endpoint, Direction::Incoming) => {
                self.attach_incoming_endpoint(link_id, source, target)
            }
            (LinkType::Endpoint, Direction::Outgoing) => {
                self.attach_outgoing_endpoint(link_id, source, target)
            }
            _ => {
                self.note_inter_router_link(link_id);
                self.accept_link(link_id, source, target);
            }
        }
    }

    /// An incoming endpoint link delivers to its target address, which must already exist.
    fn attach_incoming_endpoint(
        &mut self,
        link_id: LinkId,
        source: Option<Terminus>,
        target: Option<Terminus>,
    ) {
        let Some(terminus) = target.as_ref().filter(|t| !t.is_anonymous()) else {
            // Anonymous sender, every delivery carries its own address.
            self.accept_link(link_id, source, target);
            return;
        };

        let res = self.lookup_terminus_address(Direction::Incoming, terminus, false, false);
        match res.address {
            None => self.reject_link(link_id, Condition::NoRouteToDestination),
            Some(addr) if res.link_route => {
                self.forward_first_attach(link_id, addr, source, target)
            }
            Some(addr) => {
                self.bind_address(link_id, addr);
                self.accept_link(link_id, source, target);
            }
        }
    }

    /// An outgoing endpoint link makes its source address a local destination.
    fn attach_outgoing_endpoint(
        &mut self,
        link_id: LinkId,
        source: Option<Terminus>,
        target: Option<Terminus>,
    ) {
        let Some(terminus) = source.as_ref().filter(|t| !t.is_anonymous()) else {
            self.accept_link(link_id, source, target);
            return;
        };

        let res = self.lookup_terminus_address(Direction::Outgoing, terminus, true, true);
        match res.address {
            None => self.reject_link(link_id, Condition::NoRouteToDestination),
            Some(addr) if res.link_route => {
                self.forward_first_attach(link_id, addr, source, target)
            }
            Some(addr) => {
                let mut source = source;
                if let Some(terminus) = source.as_mut().filter(|t| t.is_dynamic()) {
                    if let Some(address) = self.addresses.get(addr) {
                        terminus.set_address(address.text());
                    }
                }

                self.bind_address(link_id, addr);
                self.add_local_destination(link_id, addr);
                self.accept_link(link_id, source, target);
            }
        }
    }

    fn link_second_attach(
        &mut self,
        link: &Link,
        source: Option<Terminus>,
        target: Option<Terminus>,
    ) {
        let link_id = link.id();
        let Some(record) = self.links.get(&link_id) else {
            debug!(link = %link_id, "second attach for released link");
            return;
        };
        let control = record.control;
        let peer = record.peer;
        debug!(link = %link_id, control, ?peer, "second attach");

        if control {
            self.note_inter_router_link(link_id);
        }

        // Link-routed: the far end accepted, pass the attach back toward the originator.
        if let Some(peer) = peer.and_then(|peer| self.links.get(&peer)) {
            let peer_link = peer.link.clone();
            self.send_work(ConnectionWork::SecondAttach { link: peer_link, source, target });
        }
    }

    fn link_detach(&mut self, link: &Link, condition: Option<Condition>) {
        let link_id = link.id();
        let Some(record) = self.links.get_mut(&link_id) else {
            debug!(link = %link_id, "detach for released link");
            return;
        };
        record.detach_received = true;
        let peer = record.peer;
        debug!(link = %link_id, ?peer, ?condition, "detach");

        if let Some(peer) = peer {
            // Propagate along the link-route chain, once.
            if let Some(peer_record) = self.links.get_mut(&peer) {
                if !peer_record.detach_sent {
                    peer_record.detach_sent = true;
                    let peer_link = peer_record.link.clone();
                    self.send_work(ConnectionWork::Detach { link: peer_link, condition });
                }
            }
            self.release_if_detached(peer);
        } else if let Some(record) = self.links.get_mut(&link_id) {
            // Half-detached: answer with our own detach.
            if !record.detach_sent {
                record.detach_sent = true;
                let link = record.link.clone();
                self.send_work(ConnectionWork::Detach { link, condition: None });
            }
        }

        self.release_if_detached(link_id);
    }

    /// Creates a router-initiated link and queues its first attach.
    fn create_link(
        &mut self,
        conn_id: ConnectionId,
        link_type: LinkType,
        direction: Direction,
        source: Option<Terminus>,
        target: Option<Terminus>,
    ) -> Option<LinkId> {
        let record = self.connections.get_mut(&conn_id)?;
        let id = self.shared.next_link_id();
        let link = Link::new(Arc::clone(&self.shared), id, conn_id, link_type, direction);
        let link_id = link.id();
        record.links.push(link_id);
        let conn = record.conn.clone();

        self.links.insert(link_id, LinkRecord::new(link.clone()));
        self.shared.stats.increment_links_created();
        if link_type == LinkType::Control {
            self.note_inter_router_link(link_id);
        }
        debug!(conn = %conn_id, link = %link_id, %link_type, %direction, "created link");

        conn.enqueue_work(ConnectionWork::FirstAttach { link, source, target });
        Some(link_id)
    }

    /// Marks a control link and, for the outgoing one, records it as the connection's control
    /// link.
    fn note_inter_router_link(&mut self, link_id: LinkId) {
        let Some(record) = self.links.get_mut(&link_id) else {
            return;
        };
        if record.link.link_type() != LinkType::Control {
            return;
        }

        record.control = true;
        if record.link.direction() == Direction::Outgoing {
            let conn_id = record.link.connection_id();
            if let Some(conn) = self.connections.get_mut(&conn_id) {
                conn.control_link = Some(link_id);
            }
        }
    }

    fn accept_link(&mut self, link_id: LinkId, source: Option<Terminus>, target: Option<Terminus>) {
        let Some(record) = self.links.get(&link_id) else {
            return;
        };
        let link = record.link.clone();
        trace!(link = %link_id, "accepting link");
        self.send_work(ConnectionWork::SecondAttach { link, source, target });
    }

    fn reject_link(&mut self, link_id: LinkId, condition: Condition) {
        let Some(record) = self.links.get_mut(&link_id) else {
            return;
        };
        record.detach_sent = true;
        let link = record.link.clone();

        debug!(link = %link_id, %condition, "rejecting link");
        self.shared.stats.increment_links_rejected();
        self.send_work(ConnectionWork::Detach { link, condition: Some(condition) });
    }

    /// Forwards a first attach over the link route's connection and pairs the two links.
    fn forward_first_attach(
        &mut self,
        link_id: LinkId,
        addr: AddressId,
        source: Option<Terminus>,
        target: Option<Terminus>,
    ) {
        if let Some(record) = self.links.get_mut(&link_id) {
            record.addr = Some(addr);
        }

        let route_conn = self
            .addresses
            .get(addr)
            .and_then(|address| address.route_conn)
            .filter(|conn| self.connections.contains_key(conn));
        let direction = self.links.get(&link_id).map(|record| record.link.direction());

        let (Some(route_conn), Some(direction)) = (route_conn, direction) else {
            debug!(link = %link_id, %addr, "link route has no active connection");
            self.reject_link(link_id, Condition::NoRouteToDestination);
            return;
        };

        let Some(peer) =
            self.create_link(route_conn, LinkType::Endpoint, direction.reverse(), source, target)
        else {
            self.reject_link(link_id, Condition::NoRouteToDestination);
            return;
        };

        if let Some(record) = self.links.get_mut(&peer) {
            record.addr = Some(addr);
            record.peer = Some(link_id);
        }
        if let Some(record) = self.links.get_mut(&link_id) {
            record.peer = Some(peer);
        }
        debug!(link = %link_id, %peer, conn = %route_conn, "forwarded first attach");
    }

    fn bind_address(&mut self, link_id: LinkId, addr: AddressId) {
        let Some(record) = self.links.get_mut(&link_id) else {
            return;
        };
        record.addr = Some(addr);

        if record.link.direction() == Direction::Incoming {
            if let Some(address) = self.addresses.get_mut(addr) {
                address.inlinks.push(link_id);
            }
        }
    }

    /// Registers an outgoing link as a local destination. The first local destination of a
    /// mobile address is announced to the routing subsystem.
    fn add_local_destination(&mut self, link_id: LinkId, addr: AddressId) {
        let Some(address) = self.addresses.get_mut(addr) else {
            return;
        };
        address.local_dests.push(link_id);

        if address.local_dests.len() == 1 && !address.is_dynamic() {
            debug!(address = address.text(), "mobile address added");
            self.notifier.mobile_added(address.text());
        }
    }

    fn remove_local_destination(&mut self, link_id: LinkId, addr: AddressId) {
        let Some(address) = self.addresses.get_mut(addr) else {
            return;
        };
        address.inlinks.retain(|l| *l != link_id);

        let Some(pos) = address.local_dests.iter().position(|l| *l == link_id) else {
            return;
        };
        address.local_dests.remove(pos);

        if address.local_dests.is_empty() && !address.is_dynamic() {
            debug!(address = address.text(), "mobile address removed");
            self.notifier.mobile_removed(address.text());
        }
    }

    fn release_if_detached(&mut self, link_id: LinkId) {
        if self.links.get(&link_id).is_some_and(LinkRecord::fully_detached) {
            self.release_link(link_id);
        }
    }

    /// Detaches the surviving half of a link-routed pair whose other half is gone.
    fn sever_peer(&mut self, peer: LinkId) {
        let Some(record) = self.links.get_mut(&peer) else {
            return;
        };
        record.peer = None;

        if !record.detach_sent {
            record.detach_sent = true;
            let link = record.link.clone();
            let condition = Some(Condition::RoutedLinkLost);
            self.send_work(ConnectionWork::Detach { link, condition });
        }
        self.release_if_detached(peer);
    }

    /// Forgets a link: unbinds its address, unpairs it and removes it from its connection.
    fn release_link(&mut self, link_id: LinkId) {
        let Some(record) = self.links.remove(&link_id) else {
            return;
        };

        if let Some(peer) = record.peer.and_then(|peer| self.links.get_mut(&peer)) {
            peer.peer = None;
        }

        if let Some(addr) = record.addr {
            self.remove_local_destination(link_id, addr);
        }

        let conn_id = record.link.connection_id();
        if let Some(conn) = self.connections.get_mut(&conn_id) {
            conn.links.retain(|l| *l != link_id);

            if conn.control_link == Some(link_id) {
                conn.control_link = None;
                if let Some(bit) = conn.mask_bit {
                    info!(conn = %conn_id, mask_bit = bit, "control link lost");
                    self.notifier.link_lost(bit);
                }
            }
        }

        debug!(link = %link_id, conn = %conn_id, "link released");
    }

    /// Queues work on the connection owning the work item's link.
    fn send_work(&self, work: ConnectionWork) {
        let link = work.link();
        let (link_id, conn_id) = (link.id(), link.connection_id());

        match self.connections.get(&conn_id) {
            Some(record) => record.conn.enqueue_work(work),
            None => debug!(link = %link_id, conn = %conn_id, "connection gone, dropping work"),
        }
    }

    /// Points the link routes labelled for `conn` at it, unless another open connection
    /// already serves them.
    fn activate_link_routes(&mut self, conn: &Connection) {
        for address in self.addresses.iter_mut() {
            if address.route_label() != Some(conn.label()) {
                continue;
            }
            if address.route_conn.is_some_and(|id| self.connections.contains_key(&id)) {
                continue;
            }

            address.route_conn = Some(conn.id());
            info!(conn = %conn.id(), route = %address.key(), "link route activated");
        }
    }

    /// Moves the link routes served by a closing connection to the next open on-demand
    /// connection with the same label, or deactivates them.
    fn deactivate_link_routes(&mut self, conn_id: ConnectionId) {
        for address in self.addresses.iter_mut() {
            if address.route_conn != Some(conn_id) {
                continue;
            }

            let next = self
                .connections
                .values()
                .map(|record| &record.conn)
                .find(|conn| {
                    conn.id() != conn_id &&
                        conn.role() == ConnectionRole::OnDemand &&
                        address.route_label() == Some(conn.label())
                })
                .map(Connection::id);
            address.route_conn = next;

            match next {
                Some(next) => {
                    info!(conn = %conn_id, %next, route = %address.key(), "link route moved")
                }
                None => info!(conn = %conn_id, route = %address.key(), "link route deactivated"),
            }
        }
    }
}
