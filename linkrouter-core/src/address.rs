use std::fmt;

use derive_more::Display;
use linkrouter_common::{Direction, Semantics};
use rand::Rng;
use rustc_hash::FxHashMap;

use crate::{ConnectionId, LinkId};

/// The scope under which generated addresses live.
pub(crate) const TEMP_ADDRESS_SCOPE: &str = "amqp:/_topo";
/// The symbols used in generated address tokens.
const TEMP_TOKEN_TABLE: &[u8; 64] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789+_";
/// The length of a generated address token.
pub(crate) const TEMP_TOKEN_LEN: usize = 15;

/// Hash key class for message-routed addresses.
const MESSAGE_CLASS: char = 'M';

/// The identity of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
#[display("addr-{_0}")]
pub struct AddressId(pub(crate) usize);

/// Returns the hash key class used for link-route matching in the given direction.
#[inline]
pub const fn prefix_for(direction: Direction) -> char {
    match direction {
        Direction::Incoming => 'C',
        Direction::Outgoing => 'D',
    }
}

/// A key in the address hash index: a one-character class followed by the address text.
///
/// Message-routed addresses use class `M`. Link-route destinations use the class for the link
/// direction (see [`prefix_for`]), which keeps incoming and outgoing routes for the same text
/// apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HashKey(String);

impl HashKey {
    /// The key of a message-routed address.
    pub fn message(address: &str) -> Self {
        Self::with_class(MESSAGE_CLASS, address)
    }

    /// The key of a link-route destination for links in `direction`.
    pub fn link_route(direction: Direction, address: &str) -> Self {
        Self::with_class(prefix_for(direction), address)
    }

    fn with_class(class: char, address: &str) -> Self {
        let mut key = String::with_capacity(address.len() + 1);
        key.push(class);
        key.push_str(address);
        Self(key)
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the class character.
    #[inline]
    pub fn class(&self) -> char {
        self.0.chars().next().unwrap_or(MESSAGE_CLASS)
    }

    /// Returns the address text without the class.
    #[inline]
    pub fn address(&self) -> &str {
        self.0.get(1..).unwrap_or_default()
    }

    /// Returns `true` if the key is a link-route destination.
    #[inline]
    pub fn is_link_route(&self) -> bool {
        self.class() != MESSAGE_CLASS
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for HashKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// An address record.
#[derive(Debug)]
pub struct Address {
    id: AddressId,
    key: HashKey,
    semantics: Semantics,
    /// Whether the address was generated for a dynamic terminus.
    dynamic: bool,
    /// Outgoing links that deliver to local consumers.
    pub(crate) local_dests: Vec<LinkId>,
    /// Incoming links bound to this address.
    pub(crate) inlinks: Vec<LinkId>,
    /// The label of the connection serving this link route, if configured.
    route_label: Option<String>,
    /// The connection currently serving this link route.
    pub(crate) route_conn: Option<ConnectionId>,
}

impl Address {
    pub(crate) fn new(key: HashKey, semantics: Semantics) -> Self {
        Self {
            id: AddressId(0),
            key,
            semantics,
            dynamic: false,
            local_dests: Vec::new(),
            inlinks: Vec::new(),
            route_label: None,
            route_conn: None,
        }
    }

    pub(crate) fn dynamic(mut self) -> Self {
        self.dynamic = true;
        self
    }

    pub(crate) fn with_route_label(mut self, label: impl Into<String>) -> Self {
        self.route_label = Some(label.into());
        self
    }

    #[inline]
    pub fn id(&self) -> AddressId {
        self.id
    }

    #[inline]
    pub fn key(&self) -> &HashKey {
        &self.key
    }

    /// Returns the address text.
    #[inline]
    pub fn text(&self) -> &str {
        self.key.address()
    }

    #[inline]
    pub fn semantics(&self) -> Semantics {
        self.semantics
    }

    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    #[inline]
    pub fn is_link_route(&self) -> bool {
        self.key.is_link_route()
    }

    /// Returns the outgoing links delivering to local consumers of this address.
    pub fn local_destinations(&self) -> &[LinkId] {
        &self.local_dests
    }

    /// Returns the incoming links bound to this address.
    pub fn incoming_links(&self) -> &[LinkId] {
        &self.inlinks
    }

    pub fn route_label(&self) -> Option<&str> {
        self.route_label.as_deref()
    }

    /// Returns the connection currently serving this link route, if active.
    pub fn route_connection(&self) -> Option<ConnectionId> {
        self.route_conn
    }
}

/// Returns `true` for the characters that separate address tokens.
#[inline]
fn is_separator(c: char) -> bool {
    c == '.' || c == '/'
}

/// Yields the key itself, then each shorter prefix that ends on a token boundary, longest
/// first. The class character is never stripped.
fn candidate_prefixes(key: &str) -> impl Iterator<Item = &str> + '_ {
    std::iter::once(key).chain(
        key.char_indices()
            .rev()
            .filter(|&(idx, c)| idx > 1 && is_separator(c))
            .map(move |(idx, _)| &key[..idx]),
    )
}

/// The address hash index, plus every address in insertion order.
#[derive(Debug, Default)]
pub struct AddressTable {
    hash: FxHashMap<HashKey, AddressId>,
    addrs: Vec<Address>,
}

impl AddressTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Exact lookup.
    pub fn retrieve(&self, key: &HashKey) -> Option<AddressId> {
        self.hash.get(key).copied()
    }

    /// Longest-prefix lookup, matching on token boundaries within the key's class.
    pub fn retrieve_prefix(&self, key: &HashKey) -> Option<AddressId> {
        candidate_prefixes(key.as_str())
            .find_map(|candidate| self.hash.get(candidate).copied())
    }

    /// Inserts an address under its key and appends it to the collection. If the key is
    /// already present the existing address is kept and its id returned.
    pub(crate) fn insert(&mut self, mut address: Address) -> AddressId {
        if let Some(existing) = self.hash.get(&address.key) {
            return *existing;
        }

        let id = AddressId(self.addrs.len());
        address.id = id;
        self.hash.insert(address.key.clone(), id);
        self.addrs.push(address);
        id
    }

    pub fn get(&self, id: AddressId) -> Option<&Address> {
        self.addrs.get(id.0)
    }

    pub(crate) fn get_mut(&mut self, id: AddressId) -> Option<&mut Address> {
        self.addrs.get_mut(id.0)
    }

    /// Looks up an address by its exact key.
    pub fn get_by_key(&self, key: &HashKey) -> Option<&Address> {
        self.retrieve(key).and_then(|id| self.get(id))
    }

    /// Iterates over every address in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Address> {
        self.addrs.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Address> {
        self.addrs.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.addrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addrs.is_empty()
    }
}

/// Generates a temporary address local to this router:
/// `amqp:/_topo/<area>/<router-id>/temp.<token>`.
pub(crate) fn generate_temp_address<R: Rng + ?Sized>(
    rng: &mut R,
    area: &str,
    router_id: &str,
) -> String {
    let token: String = (0..TEMP_TOKEN_LEN)
        .map(|_| TEMP_TOKEN_TABLE[rng.gen_range(0..TEMP_TOKEN_TABLE.len())] as char)
        .collect();

    format!("{TEMP_ADDRESS_SCOPE}/{area}/{router_id}/temp.{token}")
}
