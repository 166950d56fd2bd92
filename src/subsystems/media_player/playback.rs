//! Playback and repeat states.

use std::{fmt, str::FromStr};

use serde::{Serialize, Serializer};

use super::MediaError;

/// Current playback state of a media player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// Player is currently playing
    Playing,

    /// Player is paused
    Paused,

    /// Player is stopped
    Stopped,
}

impl PlaybackStatus {
    /// MPRIS spelling of the status.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Playing => "Playing",
            Self::Paused => "Paused",
            Self::Stopped => "Stopped",
        }
    }
}

impl FromStr for PlaybackStatus {
    type Err = MediaError;

    fn from_str(status: &str) -> Result<Self, Self::Err> {
        match status {
            "Playing" => Ok(Self::Playing),
            "Paused" => Ok(Self::Paused),
            "Stopped" => Ok(Self::Stopped),
            other => Err(MediaError::InvalidPlaybackStatus(other.to_string())),
        }
    }
}

impl Serialize for PlaybackStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loop mode for track or playlist repetition
///
/// Players that do not implement looping, or report something unexpected,
/// read as [`LoopStatus::None`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopStatus {
    /// No looping
    #[default]
    None,

    /// Loop current track
    Track,

    /// Loop entire playlist
    Playlist,
}

impl LoopStatus {
    /// MPRIS spelling of the mode.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Track => "Track",
            Self::Playlist => "Playlist",
        }
    }
}

impl Serialize for LoopStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl From<&str> for LoopStatus {
    fn from(status: &str) -> Self {
        match status {
            "Track" => Self::Track,
            "Playlist" => Self::Playlist,
            _ => Self::None,
        }
    }
}
