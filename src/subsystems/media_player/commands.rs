//! Platform-neutral execution of client requests.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{OwnedMutexGuard, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{
    MediaError, MpCommand, PlaybackStatus, PlayerData, PlayerRegistry, TrackMetadata, events,
};
use crate::{comm::ModuleCommand, protocol::Frame};

/// Controls and reads exposed by a registered player.
#[async_trait]
pub trait PlayerControl: Clone + Send + Sync + 'static {
    /// Start playback
    async fn play(&self) -> Result<(), MediaError>;

    /// Pause playback
    async fn pause(&self) -> Result<(), MediaError>;

    /// Toggle play/pause state
    async fn play_pause(&self) -> Result<(), MediaError>;

    /// Skip to next track
    async fn next(&self) -> Result<(), MediaError>;

    /// Skip to previous track
    async fn previous(&self) -> Result<(), MediaError>;

    /// Seek by a relative offset in microseconds
    async fn seek(&self, offset_us: i64) -> Result<(), MediaError>;

    /// Current playback status
    async fn playback_status(&self) -> Result<PlaybackStatus, MediaError>;

    /// Current track metadata
    async fn metadata(&self) -> Result<TrackMetadata, MediaError>;

    /// Everything a creation notice carries. Only the playback status is
    /// required; the rest may fall back to defaults.
    async fn snapshot(&self) -> Result<PlayerData, MediaError>;
}

/// Whether the routine keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Wait for the next request
    Continue,
    /// Stop the routine
    Exit,
}

/// Runs one request against the registry.
///
/// Indices that do not name a registered player are ignored.
///
/// # Errors
/// Returns the player's bus error, or an error if the reply cannot be sent.
pub async fn execute<H: PlayerControl>(
    command: MpCommand,
    registry: &RwLock<PlayerRegistry<H>>,
    events: &mpsc::Sender<Frame>,
) -> Result<Flow, MediaError> {
    match command {
        MpCommand::Close => return Ok(Flow::Exit),
        MpCommand::List => {
            let players = registry.read().await.names();
            events::emit(events, events::list(players)?).await?;
        }
        MpCommand::Play(index) => {
            if let Some(player) = target(registry, index).await {
                player.play().await?;
            }
        }
        MpCommand::Pause(index) => {
            if let Some(player) = target(registry, index).await {
                player.pause().await?;
            }
        }
        MpCommand::PlayPause(index) => {
            if let Some(player) = target(registry, index).await {
                player.play_pause().await?;
            }
        }
        MpCommand::Next(index) => {
            if let Some(player) = target(registry, index).await {
                player.next().await?;
            }
        }
        MpCommand::Previous(index) => {
            if let Some(player) = target(registry, index).await {
                player.previous().await?;
            }
        }
        MpCommand::Seek { index, offset_us } => {
            if let Some(player) = target(registry, index).await {
                player.seek(offset_us).await?;
            }
        }
    }

    Ok(Flow::Continue)
}

// The handle is cloned out so no bus call runs under the lock.
async fn target<H: PlayerControl>(
    registry: &RwLock<PlayerRegistry<H>>,
    index: i64,
) -> Option<H> {
    let player = match usize::try_from(index) {
        Ok(index) => registry.read().await.at(index),
        Err(_) => None,
    };

    match player {
        Some((name, handle)) => {
            debug!(index, player = %name, "Resolved player");
            Some(handle)
        }
        None => {
            debug!(index, "No player at index");
            None
        }
    }
}

/// Receivers a command routine owns for its lifetime.
pub struct RoutineInput {
    /// Raw frames forwarded by the transport
    pub frames: OwnedMutexGuard<mpsc::Receiver<Bytes>>,
    /// Control commands from the module itself
    pub commands: OwnedMutexGuard<mpsc::Receiver<ModuleCommand>>,
}

impl RoutineInput {
    /// Drops anything left over from a previous instance of the module.
    pub fn discard_stale(&mut self) {
        let mut stale = 0;
        while self.frames.try_recv().is_ok() {
            stale += 1;
        }
        while self.commands.try_recv().is_ok() {
            stale += 1;
        }
        if stale > 0 {
            debug!(stale, "Discarded queued input from a previous session");
        }
    }
}

/// Consumes inbound frames until cancelled, closed, or told to exit.
pub async fn command_routine<H: PlayerControl>(
    mut input: RoutineInput,
    registry: Arc<RwLock<PlayerRegistry<H>>>,
    events: mpsc::Sender<Frame>,
    cancel: CancellationToken,
) {
    loop {
        let bytes = tokio::select! {
            _ = cancel.cancelled() => break,
            command = input.commands.recv() => match command {
                Some(ModuleCommand::Close) | None => break,
            },
            frame = input.frames.recv() => match frame {
                Some(bytes) => bytes,
                None => break,
            },
        };

        let command = match MpCommand::decode(&bytes) {
            Ok(command) => command,
            Err(e) => {
                warn!(error = %e, "Ignoring request");
                continue;
            }
        };

        match execute(command, &registry, &events).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) => break,
            Err(MediaError::EventChannelClosed) => break,
            Err(e) => warn!(?command, error = %e, "Request failed"),
        }
    }

    info!("Command routine stopped");
}
