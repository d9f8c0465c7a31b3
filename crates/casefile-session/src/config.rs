//! Enrollment settings.

use std::collections::BTreeSet;

use casefile_protocol::SuspectId;

/// The suspects a phone may claim when no roster is configured.
pub const DEFAULT_ROSTER: [&str; 6] =
    ["scarlet", "mustard", "white", "green", "peacock", "plum"];

/// Configuration for [`ReconnectionManager`](crate::ReconnectionManager).
#[derive(Debug, Clone)]
pub struct ReconnectionConfig {
    /// Claimable suspect slots.
    pub roster: BTreeSet<SuspectId>,

    /// Random bytes per reconnect token (hex encoded, so the token is
    /// twice as many characters).
    pub token_bytes: usize,
}

impl ReconnectionConfig {
    /// A config with the given roster and default token size.
    pub fn with_roster<I, S>(roster: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            roster: roster.into_iter().map(SuspectId::new).collect(),
            ..Self::default()
        }
    }
}

impl Default for ReconnectionConfig {
    fn default() -> Self {
        Self {
            roster: DEFAULT_ROSTER.iter().copied().map(SuspectId::new).collect(),
            token_bytes: 32,
        }
    }
}
