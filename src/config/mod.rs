//! Configuration schema and loading.
//!
//! All sections are optional in the TOML file; anything missing falls back
//! to its default. Command-line flags are applied on top by the binary.

mod discovery;
mod general;
mod loading;
mod media;
mod paths;
mod server;

#[cfg(test)]
mod tests;

pub use discovery::DiscoveryConfig;
pub use general::{GeneralConfig, LogLevel};
pub use media::MediaConfig;
pub use paths::ConfigPaths;
pub use server::{DEFAULT_PORT, ServerConfig};

use serde::{Deserialize, Serialize};

/// Main configuration structure for Cyprus.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// General application settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Transport and lifecycle settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Network advertisement settings.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Media player subsystem settings.
    #[serde(default)]
    pub media: MediaConfig,
}
