use std::sync::atomic::{AtomicUsize, Ordering};

/// Statistics for the router core. These are shared between the core thread and the
/// front-end handles.
#[derive(Debug, Default)]
pub struct CoreStats {
    /// Total actions executed by the core thread
    actions_processed: AtomicUsize,
    /// Total actions discarded during shutdown
    actions_discarded: AtomicUsize,
    /// Number of connections currently open
    open_connections: AtomicUsize,
    /// Total links created, by peers or by the core
    links_created: AtomicUsize,
    /// Total links rejected
    links_rejected: AtomicUsize,
    /// Total dynamic address regenerations due to a collision
    dynamic_address_retries: AtomicUsize,
    /// Total work items delivered to the I/O layer
    work_delivered: AtomicUsize,
}

impl CoreStats {
    #[inline]
    pub(crate) fn increment_processed(&self) {
        self.actions_processed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_discarded(&self) {
        self.actions_discarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_open_connections(&self) {
        self.open_connections.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn decrement_open_connections(&self) {
        self.open_connections.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_links_created(&self) {
        self.links_created.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_links_rejected(&self) {
        self.links_rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn increment_dynamic_retries(&self) {
        self.dynamic_address_retries.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_work_delivered(&self, n: usize) {
        self.work_delivered.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub fn actions_processed(&self) -> usize {
        self.actions_processed.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn actions_discarded(&self) -> usize {
        self.actions_discarded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn open_connections(&self) -> usize {
        self.open_connections.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn links_created(&self) -> usize {
        self.links_created.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn links_rejected(&self) -> usize {
        self.links_rejected.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dynamic_address_retries(&self) -> usize {
        self.dynamic_address_retries.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn work_delivered(&self) -> usize {
        self.work_delivered.load(Ordering::Relaxed)
    }
}
