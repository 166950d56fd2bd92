use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Port the bridge listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 3969;

/// Transport and lifecycle settings for the bridge server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// TCP port for the WebSocket endpoint.
    pub port: u16,

    /// Serve over TLS with a self-signed certificate.
    pub secure: bool,

    /// Upper bound for the whole shutdown sequence, in seconds.
    pub shutdown_timeout_secs: u64,

    /// Read/write timeout applied to the underlying transport, in seconds.
    pub io_timeout_secs: u64,

    /// Capacity of every in-process channel between transport and subsystems.
    pub channel_capacity: usize,
}

impl ServerConfig {
    /// Shutdown deadline as a `Duration`.
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Transport I/O timeout as a `Duration`.
    pub fn io_timeout(&self) -> Duration {
        Duration::from_secs(self.io_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            secure: true,
            shutdown_timeout_secs: 10,
            io_timeout_secs: 10,
            channel_capacity: 64,
        }
    }
}
