use rustc_hash::FxHashMap;

/// Returns `true` for the characters that separate address tokens.
#[inline]
fn is_separator(c: char) -> bool {
    c == '.' || c == '/'
}

/// A node in the prefix trie.
#[derive(Debug)]
struct Node<V> {
    children: FxHashMap<String, Node<V>>,
    value: Option<V>,
}

impl<V> Node<V> {
    fn new() -> Self {
        Self { children: FxHashMap::default(), value: None }
    }
}

/// A prefix trie keyed by address tokens.
///
/// Addresses are split into tokens on `.` and `/`, so a prefix only matches on a token
/// boundary: `broker` matches `broker.queue` and `broker/queue` but not `brokers.queue`.
#[derive(Debug)]
pub struct PrefixTrie<V> {
    root: Node<V>,
}

impl<V> Default for PrefixTrie<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> PrefixTrie<V> {
    /// Creates a new, empty prefix trie.
    pub fn new() -> Self {
        Self { root: Node::new() }
    }

    /// Inserts a prefix, returning the value it previously held.
    pub fn insert(&mut self, prefix: &str, value: V) -> Option<V> {
        let mut node = &mut self.root;
        for token in prefix.split(is_separator) {
            node = node.children.entry(token.to_string()).or_insert_with(Node::new);
        }

        node.value.replace(value)
    }

    /// Returns the value of the longest stored prefix of `address`, matching on token
    /// boundaries.
    pub fn longest_match(&self, address: &str) -> Option<&V> {
        let mut current = &self.root;
        let mut best = None;
        for token in address.split(is_separator) {
            let Some(node) = current.children.get(token) else {
                break;
            };
            current = node;
            if current.value.is_some() {
                best = current.value.as_ref();
            }
        }
        best
    }
}
