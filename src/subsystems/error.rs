use std::time::Duration;

use crate::{
    lifecycle::LifecycleError, platform::Platform, protocol::SubsystemKind,
    subsystems::media_player::MediaError,
};

/// Errors raised while constructing, starting or stopping a subsystem.
#[derive(thiserror::Error, Debug)]
pub enum SubsystemError {
    /// No binding exists for the running platform
    #[error("module '{subsystem}' is not supported on {platform}")]
    Unsupported {
        /// Requested module
        subsystem: SubsystemKind,
        /// Platform the binary was built for
        platform: Platform,
    },

    /// The constructor table has no entry for the module
    #[error("no constructor registered for module '{0}'")]
    NotRegistered(SubsystemKind),

    /// Shutdown did not finish within its bound
    #[error("module '{subsystem}' did not shut down within {timeout:?}")]
    ShutdownTimeout {
        /// Module being stopped
        subsystem: SubsystemKind,
        /// Bound that elapsed
        timeout: Duration,
    },

    /// Start or stop requested in the wrong phase
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Media player failure
    #[error(transparent)]
    Media(#[from] MediaError),
}
