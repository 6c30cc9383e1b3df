/// Capability marking a terminus as an inter-router control endpoint.
pub const CAPABILITY_ROUTER_CONTROL: &str = "qd.router";
/// Capability marking a terminus as an inter-router data endpoint.
pub const CAPABILITY_ROUTER_DATA: &str = "qd.router-data";
/// Capability marking a terminus as a waypoint endpoint.
pub const CAPABILITY_WAYPOINT: &str = "qd.waypoint";

/// A link endpoint descriptor: the source or target of an attach.
///
/// A terminus either names an address, asks the router to generate one (dynamic), or names
/// nothing at all (anonymous).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Terminus {
    /// The literal address, if any.
    address: Option<String>,
    /// Whether the peer asked the router to generate the address.
    dynamic: bool,
    /// The address carried in the dynamic-node-properties, if any.
    dynamic_node_address: Option<String>,
    /// Capabilities advertised on the terminus.
    capabilities: Vec<String>,
}

impl Terminus {
    /// Creates a terminus for the given address.
    pub fn new(address: impl Into<String>) -> Self {
        Self { address: Some(address.into()), ..Default::default() }
    }

    /// Creates a terminus with no address.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Creates a dynamic terminus, for which the router generates an address.
    pub fn dynamic() -> Self {
        Self { dynamic: true, ..Default::default() }
    }

    /// Creates the terminus used for inter-router control links.
    pub fn router_control() -> Self {
        Self::default().with_capability(CAPABILITY_ROUTER_CONTROL)
    }

    /// Creates the terminus used for inter-router data links.
    pub fn router_data() -> Self {
        Self::default().with_capability(CAPABILITY_ROUTER_DATA)
    }

    /// Adds a capability.
    pub fn with_capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    /// Sets the address carried in the dynamic-node-properties. Only meaningful on a dynamic
    /// terminus.
    pub fn with_dynamic_node_address(mut self, address: impl Into<String>) -> Self {
        self.dynamic_node_address = Some(address.into());
        self
    }

    /// Returns the literal address, if any.
    #[inline]
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Sets the literal address. Used to echo a generated address back to the peer.
    pub fn set_address(&mut self, address: impl Into<String>) {
        self.address = Some(address.into());
    }

    /// Returns `true` if the peer asked for a generated address.
    #[inline]
    pub const fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Returns `true` if the terminus has no address and is not dynamic.
    #[inline]
    pub const fn is_anonymous(&self) -> bool {
        !self.dynamic && self.address.is_none()
    }

    /// Returns the address carried in the dynamic-node-properties, if any.
    #[inline]
    pub fn dynamic_node_address(&self) -> Option<&str> {
        self.dynamic_node_address.as_deref()
    }

    /// Returns `true` if the terminus advertises the given capability.
    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }
}
