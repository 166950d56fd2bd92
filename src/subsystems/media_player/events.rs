//! Outbound notifications of the media player module.
//!
//! Portable replies use `mp:<event>`; notifications that only the bus
//! backend produces carry the platform tag, `mp:<platform>:<event>`.

use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

use super::{
    LoopStatus, MediaError, PlaybackStatus, PlayerControl, PlayerRegistry, TrackMetadata,
};
use crate::protocol::{
    Frame, ProtocolError, SubsystemKind,
    methods::{method, platform_method},
};

const KIND: SubsystemKind = SubsystemKind::MediaPlayer;

/// Reply to `mp:list`.
pub const LIST: &str = "rlist";
/// Per-player status sent once during setup.
pub const SETUP_METADATA: &str = "rsetup_metadata";
/// A player jumped to a new position.
pub const SEEKED: &str = "seeked";
/// Playback status update.
pub const PLAYBACK_STATUS: &str = "psu";
/// Metadata update.
pub const METADATA: &str = "mu";
/// A player appeared on the bus.
pub const PLAYER_CREATED: &str = "player_created";
/// A player left the bus.
pub const PLAYER_REMOVED: &str = "player_removed";
/// A player's bus owner changed.
pub const PLAYER_UPDATED: &str = "player_updated";

/// Payload of [`LIST`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerList {
    /// Well-known names in index order
    pub players: Vec<String>,
}

/// Payload of [`SETUP_METADATA`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetupStatus {
    /// Position in the registry
    pub index: usize,
    /// Well-known bus name
    pub name: String,
    /// Current playback status
    pub status: PlaybackStatus,
    /// Current track
    pub metadata: TrackMetadata,
}

/// Payload of [`PLAYBACK_STATUS`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackStatusUpdate {
    /// Position in the registry
    pub player_index: usize,
    /// Well-known bus name
    pub player_name: String,
    /// Current playback status
    pub playback_status: PlaybackStatus,
}

/// Payload of [`METADATA`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetadataUpdate {
    /// Position in the registry
    pub player_index: usize,
    /// Well-known bus name
    pub player_name: String,
    /// Current track
    pub metadata: TrackMetadata,
}

/// Payload of [`SEEKED`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct SeekedUpdate {
    /// Position in the registry
    pub player_index: usize,
    /// Well-known bus name
    pub player_name: String,
    /// New absolute position in microseconds
    pub seeked_in_us: i64,
}

/// Full state of one player, attached to creation and update notices.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerData {
    /// Current playback status
    pub playback_status: PlaybackStatus,
    /// Repeat mode
    pub loop_status: LoopStatus,
    /// Whether shuffle is on
    pub shuffle: bool,
    /// Current track
    pub metadata: TrackMetadata,
    /// Absent when the player does not expose it
    pub rate: Option<f64>,
    /// Absent when the player does not expose it
    pub volume: Option<f64>,
    /// Microseconds; absent when the player does not expose it
    pub position: Option<i64>,
}

/// Payload of [`PLAYER_CREATED`] and [`PLAYER_UPDATED`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerChanged {
    /// Position in the registry
    pub player_index: usize,
    /// Well-known bus name
    pub player_name: String,
    /// `None` when the snapshot could not be read
    pub player: Option<PlayerData>,
    /// Names after the change, in index order
    pub players: Vec<String>,
}

/// Payload of [`PLAYER_REMOVED`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerRemoved {
    /// Index the player had before removal
    pub player_index: usize,
    /// Well-known bus name
    pub player_name: String,
    /// Names after the removal, in index order
    pub players: Vec<String>,
}

/// `mp:rlist` with the current names.
pub fn list(players: Vec<String>) -> Result<Frame, ProtocolError> {
    Frame::event(method(KIND, LIST), &PlayerList { players })
}

/// `mp:rsetup_metadata` for one player.
pub fn setup_status(status: SetupStatus) -> Result<Frame, ProtocolError> {
    Frame::event(method(KIND, SETUP_METADATA), &status)
}

/// Platform-tagged playback status notice.
pub fn playback_status(update: PlaybackStatusUpdate) -> Result<Frame, ProtocolError> {
    Frame::event(platform_method(KIND, PLAYBACK_STATUS), &update)
}

/// Platform-tagged metadata notice.
pub fn metadata(update: MetadataUpdate) -> Result<Frame, ProtocolError> {
    Frame::event(platform_method(KIND, METADATA), &update)
}

/// Platform-tagged seek notice.
pub fn seeked(update: SeekedUpdate) -> Result<Frame, ProtocolError> {
    Frame::event(platform_method(KIND, SEEKED), &update)
}

/// Platform-tagged creation or update notice; `event` is
/// [`PLAYER_CREATED`] or [`PLAYER_UPDATED`].
pub fn player_changed(event: &str, change: PlayerChanged) -> Result<Frame, ProtocolError> {
    Frame::event(platform_method(KIND, event), &change)
}

/// Platform-tagged removal notice.
pub fn player_removed(removed: PlayerRemoved) -> Result<Frame, ProtocolError> {
    Frame::event(platform_method(KIND, PLAYER_REMOVED), &removed)
}

/// Queues `frame` for the client.
///
/// # Errors
/// Returns [`MediaError::EventChannelClosed`] if the transport side is gone.
pub async fn emit(events: &mpsc::Sender<Frame>, frame: Frame) -> Result<(), MediaError> {
    events
        .send(frame)
        .await
        .map_err(|_| MediaError::EventChannelClosed)
}

/// Sends one [`SETUP_METADATA`] event per registered player, in index
/// order. Players whose state cannot be read are skipped.
///
/// Returns how many events were sent.
///
/// # Errors
/// Returns an error only if the event queue is closed.
pub async fn emit_setup_statuses<H: PlayerControl>(
    registry: &RwLock<PlayerRegistry<H>>,
    events: &mpsc::Sender<Frame>,
) -> Result<usize, MediaError> {
    let players: Vec<(usize, String, H)> = {
        let registry = registry.read().await;
        (0..registry.len())
            .filter_map(|index| registry.at(index).map(|(name, h)| (index, name, h)))
            .collect()
    };

    let mut sent = 0;
    for (index, name, handle) in players {
        let status = match handle.playback_status().await {
            Ok(status) => status,
            Err(e) => {
                warn!(player = %name, error = %e, "Skipping player in setup report");
                continue;
            }
        };
        let metadata = handle.metadata().await.unwrap_or_else(|e| {
            debug!(player = %name, error = %e, "Metadata unavailable");
            TrackMetadata::default()
        });

        let frame = setup_status(SetupStatus {
            index,
            name,
            status,
            metadata,
        })?;
        emit(events, frame).await?;
        sent += 1;
    }

    Ok(sent)
}
