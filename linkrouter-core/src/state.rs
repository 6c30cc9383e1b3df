use std::{collections::BTreeMap, fmt, sync::Arc};

use linkrouter_common::{Direction, PrefixTrie, Semantics, Terminus};
use rand::{rngs::StdRng, SeedableRng};
use tracing::{debug, warn};

use crate::{
    address::{generate_temp_address, Address, AddressTable, HashKey},
    mask::MaskBitPool,
    router::Shared,
    AddressId, Connection, ConnectionId, CoreOptions, Link, LinkId, NoopNotifier, RouterNotifier,
};

/// The core's view of an open connection.
#[derive(Debug)]
pub struct ConnectionRecord {
    pub(crate) conn: Connection,
    pub(crate) mask_bit: Option<usize>,
    /// Links on this connection, in attach order.
    pub(crate) links: Vec<LinkId>,
    /// The outgoing control link to the peer router.
    pub(crate) control_link: Option<LinkId>,
}

impl ConnectionRecord {
    pub(crate) fn new(conn: Connection) -> Self {
        Self { conn, mask_bit: None, links: Vec::new(), control_link: None }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Returns the mask bit, for inter-router connections that were assigned one.
    pub fn mask_bit(&self) -> Option<usize> {
        self.mask_bit
    }

    /// Returns the links on this connection, in attach order.
    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn control_link(&self) -> Option<LinkId> {
        self.control_link
    }
}

/// The core's view of a link.
#[derive(Debug)]
pub struct LinkRecord {
    pub(crate) link: Link,
    /// The address the link is bound to.
    pub(crate) addr: Option<AddressId>,
    /// The other half of a link-routed pair.
    pub(crate) peer: Option<LinkId>,
    pub(crate) control: bool,
    pub(crate) detach_sent: bool,
    pub(crate) detach_received: bool,
}

impl LinkRecord {
    pub(crate) fn new(link: Link) -> Self {
        Self {
            link,
            addr: None,
            peer: None,
            control: false,
            detach_sent: false,
            detach_received: false,
        }
    }

    pub fn link(&self) -> &Link {
        &self.link
    }

    pub fn address(&self) -> Option<AddressId> {
        self.addr
    }

    /// Returns the other half of a link-routed pair.
    pub fn peer(&self) -> Option<LinkId> {
        self.peer
    }

    pub fn is_control(&self) -> bool {
        self.control
    }

    /// Returns `true` once a detach was sent to the peer.
    pub fn is_detach_sent(&self) -> bool {
        self.detach_sent
    }

    /// Returns `true` once a detach was received from the peer.
    pub fn is_detach_received(&self) -> bool {
        self.detach_received
    }

    #[inline]
    pub(crate) fn fully_detached(&self) -> bool {
        self.detach_sent && self.detach_received
    }
}

/// The result of resolving a terminus address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    /// The resolved address, if any.
    pub address: Option<AddressId>,
    /// Whether the link-route table produced the match.
    pub link_route: bool,
}

impl Resolution {
    const NONE: Self = Self { address: None, link_route: false };
}

/// All router state. Owned by the core thread and mutated only there.
pub struct CoreState {
    pub(crate) shared: Arc<Shared>,
    pub(crate) connections: BTreeMap<ConnectionId, ConnectionRecord>,
    pub(crate) links: BTreeMap<LinkId, LinkRecord>,
    pub(crate) addresses: AddressTable,
    pub(crate) mask_bits: MaskBitPool,
    pub(crate) notifier: Box<dyn RouterNotifier>,
    /// Configured semantics by address prefix.
    semantics: PrefixTrie<Semantics>,
    default_semantics: Semantics,
    dynamic_semantics: Semantics,
    router_area: String,
    router_id: String,
    rng: StdRng,
}

impl fmt::Debug for CoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreState")
            .field("connections", &self.connections.len())
            .field("links", &self.links.len())
            .field("addresses", &self.addresses.len())
            .field("router_area", &self.router_area)
            .field("router_id", &self.router_id)
            .finish_non_exhaustive()
    }
}

impl CoreState {
    pub(crate) fn new(shared: Arc<Shared>, options: CoreOptions) -> Self {
        let mut semantics = PrefixTrie::new();
        for (prefix, sem) in &options.address_semantics {
            if semantics.insert(prefix, *sem).is_some() {
                warn!(%prefix, "address semantics configured twice, keeping the last");
            }
        }

        let rng = match options.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut state = Self {
            shared,
            connections: BTreeMap::new(),
            links: BTreeMap::new(),
            addresses: AddressTable::new(),
            mask_bits: MaskBitPool::new(options.max_inter_router),
            notifier: Box::new(NoopNotifier),
            semantics,
            default_semantics: options.default_semantics,
            dynamic_semantics: options.dynamic_semantics,
            router_area: options.router_area,
            router_id: options.router_id,
            rng,
        };

        for route in &options.link_routes {
            let directions = match route.direction {
                Some(direction) => vec![direction],
                None => vec![Direction::Incoming, Direction::Outgoing],
            };

            for direction in directions {
                let key = HashKey::link_route(direction, &route.prefix);
                if let Some(existing) = state.addresses.get_by_key(&key) {
                    warn!(
                        prefix = %route.prefix,
                        %direction,
                        connection = %route.connection,
                        kept = existing.route_label(),
                        "link route configured twice, ignoring"
                    );
                    continue;
                }

                let sem = state.semantics_for(&route.prefix);
                let id = state
                    .addresses
                    .insert(Address::new(key, sem).with_route_label(route.connection.as_str()));
                debug!(
                    addr = %id,
                    prefix = %route.prefix,
                    %direction,
                    connection = %route.connection,
                    "configured link route"
                );
            }
        }

        state
    }

    /// Returns the open connections, in the order they were opened.
    pub fn open_connections(&self) -> impl Iterator<Item = &ConnectionRecord> {
        self.connections.values()
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&ConnectionRecord> {
        self.connections.get(&id)
    }

    pub fn link(&self, id: LinkId) -> Option<&LinkRecord> {
        self.links.get(&id)
    }

    /// Returns every live link.
    pub fn links(&self) -> impl Iterator<Item = &LinkRecord> {
        self.links.values()
    }

    pub fn addresses(&self) -> &AddressTable {
        &self.addresses
    }

    /// Returns the address a link is bound to.
    pub fn link_address(&self, id: LinkId) -> Option<&Address> {
        self.links.get(&id)?.addr.and_then(|addr| self.addresses.get(addr))
    }

    /// Returns the number of free mask bits.
    pub fn free_mask_bits(&self) -> usize {
        self.mask_bits.free_count()
    }

    /// Returns the default semantics for a new address: the longest configured prefix, or the
    /// global default.
    pub fn semantics_for(&self, address: &str) -> Semantics {
        self.semantics.longest_match(address).copied().unwrap_or(self.default_semantics)
    }

    /// Resolves a terminus address.
    ///
    /// In order:
    /// 1. A dynamic terminus with a dynamic-node-properties address is looked up as a link
    ///    route (prefix match only, never created).
    /// 2. Any other dynamic terminus gets a freshly generated address, if `accept_dynamic`.
    /// 3. An anonymous terminus resolves to nothing.
    /// 4. A link-route prefix match wins over everything else.
    /// 5. Otherwise the exact message-routed address, created if `create_if_not_found`.
    pub fn lookup_terminus_address(
        &mut self,
        direction: Direction,
        terminus: &Terminus,
        create_if_not_found: bool,
        accept_dynamic: bool,
    ) -> Resolution {
        if terminus.is_dynamic() {
            if let Some(dnp) = terminus.dynamic_node_address() {
                let key = HashKey::link_route(direction, dnp);
                let address = self.addresses.retrieve_prefix(&key);
                return Resolution { address, link_route: true };
            }

            if !accept_dynamic {
                return Resolution::NONE;
            }

            return Resolution { address: Some(self.create_dynamic_address()), link_route: false };
        }

        let Some(text) = terminus.address() else {
            return Resolution::NONE;
        };

        let key = HashKey::link_route(direction, text);
        if let Some(addr) = self.addresses.retrieve_prefix(&key) {
            return Resolution { address: Some(addr), link_route: true };
        }

        let key = HashKey::message(text);
        if let Some(addr) = self.addresses.retrieve(&key) {
            return Resolution { address: Some(addr), link_route: false };
        }

        if !create_if_not_found {
            return Resolution::NONE;
        }

        let sem = self.semantics_for(text);
        let addr = self.addresses.insert(Address::new(key, sem));
        debug!(%addr, address = text, "created address");

        Resolution { address: Some(addr), link_route: false }
    }

    /// Generates a temporary address that collides with no existing one and inserts it.
    fn create_dynamic_address(&mut self) -> AddressId {
        loop {
            let text = generate_temp_address(&mut self.rng, &self.router_area, &self.router_id);
            let key = HashKey::message(&text);

            if self.addresses.retrieve(&key).is_none() {
                let address = Address::new(key, self.dynamic_semantics).dynamic();
                let addr = self.addresses.insert(address);
                debug!(%addr, address = %text, "created dynamic address");
                return addr;
            }

            self.shared.stats.increment_dynamic_retries();
            debug!(address = %text, "generated address collides, regenerating");
        }
    }
}

#[cfg(test)]
mod tests {
    use linkrouter_common::{Bias, Congestion, Fanout};

    use super::*;
    use crate::{address::TEMP_ADDRESS_SCOPE, RouterCore};

    fn new_state(options: CoreOptions) -> CoreState {
        let (core, _driver) = RouterCore::new(CoreOptions::default());
        CoreState::new(core.shared(), options)
    }

    fn text(state: &CoreState, res: Resolution) -> Option<&str> {
        res.address.and_then(|addr| state.addresses.get(addr)).map(Address::text)
    }

    #[test]
    fn anonymous_resolves_to_nothing() {
        let mut state = new_state(CoreOptions::default());
        let res =
            state.lookup_terminus_address(Direction::Incoming, &Terminus::anonymous(), true, true);
        assert_eq!(res, Resolution::NONE);
        assert!(state.addresses.is_empty());
    }

    #[test]
    fn exact_lookup_and_creation() {
        let mut state = new_state(CoreOptions::default());
        let terminus = Terminus::new("orders");

        let res = state.lookup_terminus_address(Direction::Incoming, &terminus, false, false);
        assert_eq!(res, Resolution::NONE);
        assert!(state.addresses.is_empty());

        let created = state.lookup_terminus_address(Direction::Outgoing, &terminus, true, false);
        assert!(!created.link_route);
        assert_eq!(text(&state, created), Some("orders"));

        let found = state.lookup_terminus_address(Direction::Incoming, &terminus, false, false);
        assert_eq!(found, created);
        assert_eq!(state.addresses.len(), 1);
    }

    #[test]
    fn link_route_wins() {
        let options = CoreOptions::default().link_route("broker", None, "broker-conn");
        let mut state = new_state(options);
        let terminus = Terminus::new("broker.q1");

        // Message-routed entry for the same text.
        state.addresses.insert(Address::new(HashKey::message("broker.q1"), Semantics::DEFAULT));

        for direction in [Direction::Incoming, Direction::Outgoing] {
            let res = state.lookup_terminus_address(direction, &terminus, true, true);
            assert!(res.link_route);
            let addr = state.addresses.get(res.address.unwrap()).unwrap();
            assert_eq!(addr.key(), &HashKey::link_route(direction, "broker"));

            // Same inputs, same answer.
            assert_eq!(state.lookup_terminus_address(direction, &terminus, true, true), res);
        }
    }

    #[test]
    fn link_route_per_direction() {
        let options =
            CoreOptions::default().link_route("broker", Some(Direction::Outgoing), "broker-conn");
        let mut state = new_state(options);
        let terminus = Terminus::new("broker.q1");

        let res = state.lookup_terminus_address(Direction::Outgoing, &terminus, false, false);
        assert!(res.link_route);

        let res = state.lookup_terminus_address(Direction::Incoming, &terminus, false, false);
        assert_eq!(res, Resolution::NONE);
    }

    #[test]
    fn dynamic_node_address_is_prefix_only() {
        let options = CoreOptions::default().link_route("broker", None, "broker-conn");
        let mut state = new_state(options);
        let before = state.addresses.len();

        let terminus = Terminus::dynamic().with_dynamic_node_address("broker.tmp");
        let res = state.lookup_terminus_address(Direction::Outgoing, &terminus, true, true);
        assert!(res.link_route);
        assert!(res.address.is_some());

        let terminus = Terminus::dynamic().with_dynamic_node_address("elsewhere");
        let res = state.lookup_terminus_address(Direction::Outgoing, &terminus, true, true);
        assert_eq!(res, Resolution { address: None, link_route: true });
        assert_eq!(state.addresses.len(), before);
    }

    #[test]
    fn dynamic_addresses() {
        let options = CoreOptions::default().router_area("east").router_id("R1").rng_seed(1);
        let mut state = new_state(options);

        let dynamic = Terminus::dynamic();
        let res = state.lookup_terminus_address(Direction::Outgoing, &dynamic, false, false);
        assert_eq!(res, Resolution::NONE);

        let res = state.lookup_terminus_address(Direction::Outgoing, &dynamic, false, true);
        assert!(!res.link_route);
        let addr = state.addresses.get(res.address.unwrap()).unwrap();
        assert!(addr.is_dynamic());
        assert_eq!(addr.semantics(), Semantics::DYNAMIC);
        assert!(addr.text().starts_with(&format!("{TEMP_ADDRESS_SCOPE}/east/R1/temp.")));
    }

    #[test]
    fn dynamic_collision_regenerates() {
        let options = CoreOptions::default().rng_seed(42);
        let mut state = new_state(options);

        // Pre-insert the address the seeded generator produces first.
        let mut rng = StdRng::seed_from_u64(42);
        let first = generate_temp_address(&mut rng, "0", "Router.A");
        state.addresses.insert(Address::new(HashKey::message(&first), Semantics::DEFAULT));

        let dynamic = Terminus::dynamic();
        let res = state.lookup_terminus_address(Direction::Outgoing, &dynamic, false, true);
        let addr = state.addresses.get(res.address.unwrap()).unwrap();

        assert_ne!(addr.text(), first);
        assert!(addr.is_dynamic());
        assert_eq!(state.shared.stats.dynamic_address_retries(), 1);
    }

    #[test]
    fn duplicate_link_route_keeps_first() {
        let options = CoreOptions::default()
            .link_route("broker", Some(Direction::Incoming), "first")
            .link_route("broker", None, "second");
        let state = new_state(options);

        let route = |direction| {
            let key = HashKey::link_route(direction, "broker");
            state.addresses.get_by_key(&key).and_then(Address::route_label)
        };
        assert_eq!(route(Direction::Incoming), Some("first"));
        assert_eq!(route(Direction::Outgoing), Some("second"));
        assert_eq!(state.addresses.len(), 2);
    }

    #[test]
    fn configured_semantics() {
        let multicast = Semantics::new(Fanout::Multiple, Bias::None, Congestion::Drop);
        let closest = Semantics::new(Fanout::Single, Bias::Closest, Congestion::Backpressure);
        let options = CoreOptions::default()
            .address_semantics("multicast", multicast)
            .address_semantics("multicast.closest", closest);
        let mut state = new_state(options);

        let mut created = |address: &str| {
            let terminus = Terminus::new(address);
            let res = state.lookup_terminus_address(Direction::Outgoing, &terminus, true, false);
            state.addresses.get(res.address.unwrap()).unwrap().semantics()
        };

        assert_eq!(created("multicast.news"), multicast);
        assert_eq!(created("multicast.closest.a"), closest);
        assert_eq!(created("queue.a"), Semantics::DEFAULT);
    }
}
