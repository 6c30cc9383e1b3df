use linkrouter_common::{Direction, Semantics};

/// The default area of this router, used in generated addresses.
const DEFAULT_ROUTER_AREA: &str = "0";
/// The default identity of this router, used in generated addresses.
const DEFAULT_ROUTER_ID: &str = "Router.A";
/// The default number of mask bits, i.e. the maximum number of inter-router connections.
pub(crate) const DEFAULT_MAX_INTER_ROUTER: usize = 64;

/// A configured link-route destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRouteConfig {
    /// The address prefix that is link-routed.
    pub prefix: String,
    /// The link direction that is routed. `None` routes both directions.
    pub direction: Option<Direction>,
    /// The label of the on-demand connection that serves the route.
    pub connection: String,
}

/// Options for the router core.
#[derive(Debug, Clone)]
pub struct CoreOptions {
    /// The area of this router.
    pub(crate) router_area: String,
    /// The identity of this router.
    pub(crate) router_id: String,
    /// The capacity of the mask-bit pool.
    pub(crate) max_inter_router: usize,
    /// Semantics for created addresses that match no configured prefix.
    pub(crate) default_semantics: Semantics,
    /// Semantics for generated (dynamic) addresses.
    pub(crate) dynamic_semantics: Semantics,
    /// Semantics per configured address prefix.
    pub(crate) address_semantics: Vec<(String, Semantics)>,
    /// Configured link-route destinations.
    pub(crate) link_routes: Vec<LinkRouteConfig>,
    /// Seed for the dynamic address generator. Seeded from entropy if `None`.
    pub(crate) rng_seed: Option<u64>,
}

impl Default for CoreOptions {
    fn default() -> Self {
        Self {
            router_area: DEFAULT_ROUTER_AREA.to_string(),
            router_id: DEFAULT_ROUTER_ID.to_string(),
            max_inter_router: DEFAULT_MAX_INTER_ROUTER,
            default_semantics: Semantics::DEFAULT,
            dynamic_semantics: Semantics::DYNAMIC,
            address_semantics: Vec::new(),
            link_routes: Vec::new(),
            rng_seed: None,
        }
    }
}

impl CoreOptions {
    /// Sets the area of this router.
    pub fn router_area(mut self, area: impl Into<String>) -> Self {
        self.router_area = area.into();
        self
    }

    /// Sets the identity of this router.
    pub fn router_id(mut self, id: impl Into<String>) -> Self {
        self.router_id = id.into();
        self
    }

    /// Sets the maximum number of concurrent inter-router connections, i.e. the number of
    /// mask bits available.
    pub fn max_inter_router(mut self, max: usize) -> Self {
        self.max_inter_router = max;
        self
    }

    /// Sets the semantics used for created addresses that match no configured prefix.
    pub fn default_semantics(mut self, semantics: Semantics) -> Self {
        self.default_semantics = semantics;
        self
    }

    /// Sets the semantics used for generated (dynamic) addresses.
    pub fn dynamic_semantics(mut self, semantics: Semantics) -> Self {
        self.dynamic_semantics = semantics;
        self
    }

    /// Configures the semantics of addresses under `prefix`. The longest matching prefix wins.
    pub fn address_semantics(mut self, prefix: impl Into<String>, semantics: Semantics) -> Self {
        self.address_semantics.push((prefix.into(), semantics));
        self
    }

    /// Configures a link route: attaches to addresses under `prefix` in `direction` (or both,
    /// if `None`) are forwarded to the on-demand connection labelled `connection`.
    pub fn link_route(
        mut self,
        prefix: impl Into<String>,
        direction: Option<Direction>,
        connection: impl Into<String>,
    ) -> Self {
        self.link_routes.push(LinkRouteConfig {
            prefix: prefix.into(),
            direction,
            connection: connection.into(),
        });
        self
    }

    /// Seeds the dynamic address generator, making generated addresses reproducible.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.rng_seed = Some(seed);
        self
    }
}
