use serde::{Deserialize, Serialize};
use std::fmt;

/// Logging level used when `RUST_LOG` is not set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only failures that stop the bridge from working.
    Error,

    /// Dropped frames, failed bus calls and other recoverable problems.
    Warn,

    /// Lifecycle transitions: connections, module init/close, players added or removed.
    #[default]
    Info,

    /// Per-frame routing and per-signal dispatch.
    Debug,

    /// Everything, including raw frame sizes.
    Trace,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}
