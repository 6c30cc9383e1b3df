/// Notifications from the core to the routing subsystem (neighbor discovery and path
/// selection), which lives outside this crate.
///
/// Every callback runs on the core thread. The defaults do nothing.
pub trait RouterNotifier: Send + 'static {
    /// A mobile address gained its first local destination.
    fn mobile_added(&mut self, _address: &str) {}

    /// A mobile address lost its last local destination.
    fn mobile_removed(&mut self, _address: &str) {}

    /// The control link to the peer holding `mask_bit` is gone.
    fn link_lost(&mut self, _mask_bit: usize) {}
}

/// A [`RouterNotifier`] that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopNotifier;

impl RouterNotifier for NoopNotifier {}
