/// How many consumers receive each message sent to an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fanout {
    /// Each message goes to exactly one consumer.
    Single,
    /// Each message goes to every consumer.
    Multiple,
    /// Messages are gathered towards a single point.
    Gather,
}

/// Which consumer is preferred when a message goes to a single one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bias {
    /// No preference.
    None,
    /// Prefer the closest consumer.
    Closest,
    /// Spread load across consumers.
    Spread,
}

/// What happens when consumers cannot keep up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Congestion {
    /// Drop messages.
    Drop,
    /// Withhold credit from producers.
    Backpressure,
    /// Redirect to an alternate destination.
    Redirect,
}

/// The distribution semantics of an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Semantics {
    /// Fanout mode.
    pub fanout: Fanout,
    /// Bias mode.
    pub bias: Bias,
    /// Congestion policy.
    pub congestion: Congestion,
}

impl Semantics {
    /// Semantics applied to addresses when no configured prefix matches.
    pub const DEFAULT: Self =
        Self { fanout: Fanout::Single, bias: Bias::Spread, congestion: Congestion::Backpressure };

    /// Semantics applied to generated (dynamic) addresses.
    pub const DYNAMIC: Self =
        Self { fanout: Fanout::Single, bias: Bias::Closest, congestion: Congestion::Backpressure };

    /// Creates a new set of semantics.
    pub const fn new(fanout: Fanout, bias: Bias, congestion: Congestion) -> Self {
        Self { fanout, bias, congestion }
    }
}

impl Default for Semantics {
    fn default() -> Self {
        Self::DEFAULT
    }
}
