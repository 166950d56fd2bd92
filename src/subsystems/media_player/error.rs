use std::time::Duration;

use crate::protocol::ProtocolError;

/// Errors that can occur during media player operations
#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    /// D-Bus communication error
    #[error("D-Bus operation failed: {0}")]
    DbusError(#[from] zbus::Error),

    /// Bus daemon request error
    #[error("D-Bus request failed: {0}")]
    FdoError(#[from] zbus::fdo::Error),

    /// A bus name could not be parsed
    #[error("invalid bus name: {0}")]
    InvalidName(#[from] zbus::names::Error),

    /// A property value had an unexpected type
    #[error("unexpected property value: {0}")]
    InvalidValue(#[from] zbus::zvariant::Error),

    /// The player reported a playback status outside the MPRIS set
    #[error("invalid playback status '{0}'")]
    InvalidPlaybackStatus(String),

    /// A signal lacked required header fields or had the wrong body
    #[error("malformed signal: {0}")]
    MalformedSignal(String),

    /// No playback status signal arrived in time during sender discovery
    #[error("no playback status signal within {0:?}")]
    HandshakeTimeout(Duration),

    /// Failed to initialize the media service
    #[error("Failed to initialize media service: {0}")]
    InitializationFailed(String),

    /// An outbound event could not be built
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The transport side of the event queue is gone
    #[error("event channel closed")]
    EventChannelClosed,
}
