/// Queue entry state definitions
use std::fmt;

/// Represents the state of a URL within one crawl run
///
/// ```text
/// queued ──dispatch──> in-flight ──terminal event──> visited
///   ^                                                   │
///   └──────────────── add_url(force = true) ────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryState {
    /// Accepted and waiting in the FIFO queue
    Queued,

    /// Handed to the transport, no terminal event yet
    InFlight,

    /// A response, redirect, or exception has been observed
    Visited,
}

impl EntryState {
    /// Returns true if no further processing will happen without a forced re-add
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Visited)
    }

    /// Returns true if the URL is still waiting for or undergoing its fetch
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::InFlight)
    }

    /// Returns the lowercase label used in log output
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::InFlight => "in_flight",
            Self::Visited => "visited",
        }
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
