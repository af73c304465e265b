//! Explicit enforcement state machine.

/// Lifecycle of a page session.
///
/// `Idle → Initializing → Active → Defending ⇄ Retrying → Idle`. The
/// variants make illegal combinations (defending while a resolution is
/// still in flight, retrying while idle) unrepresentable; transitions
/// happen only inside the session's event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Not enforcing; waiting for a reason to resolve.
    Idle,
    /// A resolution request is in flight.
    Initializing,
    /// A favicon is being applied to the page.
    Active,
    /// The applied favicon is being defended.
    Defending,
    /// A persistence violation was detected; a retry is scheduled.
    Retrying {
        /// Retry attempt about to run (1-based).
        attempt: u32,
    },
}

impl EngineState {
    /// Stable label for logging.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Initializing => "initializing",
            Self::Active => "active",
            Self::Defending => "defending",
            Self::Retrying { .. } => "retrying",
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
