//! Media player bridge.
//!
//! Keeps an ordered registry of the host's media players, relays their
//! state changes to the client and executes the client's playback
//! commands. Players are addressed by their registry index.

pub mod commands;
pub mod dispatch;
mod error;
pub mod events;
pub mod metadata;
pub mod playback;
pub mod registry;
pub mod request;
pub mod signals;

#[cfg(target_os = "linux")]
mod linux;

pub use commands::PlayerControl;
pub use dispatch::{AddMode, PlayerSource};
pub use error::MediaError;
pub use events::PlayerData;
pub use metadata::TrackMetadata;
pub use playback::{LoopStatus, PlaybackStatus};
pub use registry::PlayerRegistry;
pub use request::MpCommand;

#[cfg(target_os = "linux")]
pub use linux::LinuxMediaPlayer;

use crate::{
    comm::SubsystemEndpoint,
    config::MediaConfig,
    subsystems::{Subsystem, SubsystemError},
};

/// Builds the media player for the running platform.
///
/// # Errors
/// Returns [`SubsystemError::Unsupported`] where no backend exists.
#[cfg(target_os = "linux")]
pub fn new(
    endpoint: SubsystemEndpoint,
    config: MediaConfig,
) -> Result<Box<dyn Subsystem>, SubsystemError> {
    Ok(Box::new(LinuxMediaPlayer::new(endpoint, config)))
}

/// Builds the media player for the running platform.
///
/// # Errors
/// Returns [`SubsystemError::Unsupported`] where no backend exists.
#[cfg(not(target_os = "linux"))]
pub fn new(
    endpoint: SubsystemEndpoint,
    _config: MediaConfig,
) -> Result<Box<dyn Subsystem>, SubsystemError> {
    Err(SubsystemError::Unsupported {
        subsystem: endpoint.kind(),
        platform: crate::platform::Platform::current(),
    })
}
