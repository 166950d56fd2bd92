use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Media player subsystem configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Bus name substrings of players that should never be registered
    pub ignored_players: Vec<String>,

    /// Settle time before talking to a freshly appeared player, in milliseconds
    pub add_settle_delay_ms: u64,

    /// Upper bound for each wait of the sender handshake, in milliseconds
    pub handshake_timeout_ms: u64,

    /// Upper bound for the subsystem shutdown, in milliseconds
    pub shutdown_timeout_ms: u64,

    /// Ask a player to quit when it is removed from the registry
    pub quit_on_remove: bool,

    /// Capacity of the bus signal queue
    pub signal_buffer: usize,
}

impl MediaConfig {
    /// Settle delay as a `Duration`.
    pub fn add_settle_delay(&self) -> Duration {
        Duration::from_millis(self.add_settle_delay_ms)
    }

    /// Handshake timeout as a `Duration`.
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    /// Shutdown timeout as a `Duration`.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Whether `bus_name` matches one of the ignore patterns.
    pub fn is_ignored(&self, bus_name: &str) -> bool {
        self.ignored_players
            .iter()
            .any(|pattern| !pattern.is_empty() && bus_name.contains(pattern.as_str()))
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ignored_players: Vec::new(),
            add_settle_delay_ms: 500,
            handshake_timeout_ms: 2000,
            shutdown_timeout_ms: 5000,
            quit_on_remove: true,
            signal_buffer: 256,
        }
    }
}
