mod log_level;

pub use log_level::LogLevel;
use serde::{Deserialize, Serialize};

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneralConfig {
    /// Default log verbosity.
    #[serde(default)]
    pub log_level: LogLevel,
}
