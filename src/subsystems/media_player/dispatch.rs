//! Reactions to decoded player signals.
//!
//! The bus backend decodes each signal and hands it here; these handlers
//! update the registry through a [`PlayerSource`] and emit the matching
//! notices.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tracing::{trace, warn};
use zbus::zvariant::OwnedValue;

use super::{
    MediaError, PlaybackStatus, PlayerControl, PlayerRegistry, events,
    signals::{OwnerChange, is_player_name},
};
use crate::protocol::Frame;

/// How a player is being added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddMode {
    /// Enumerated at setup; the player has been around for a while
    Setup,
    /// Just appeared on the bus; give it time to export its interfaces
    Live,
}

/// Backend that owns the registry and knows how to (un)register players.
#[async_trait]
pub trait PlayerSource: Send + Sync {
    /// Handle stored per player.
    type Handle: PlayerControl;

    /// Registry shared with the command routine.
    fn registry(&self) -> &RwLock<PlayerRegistry<Self::Handle>>;

    /// Outbound event queue.
    fn events(&self) -> &mpsc::Sender<Frame>;

    /// Registers `name`, replacing an existing entry of the same name.
    async fn add_player(&self, name: &str, mode: AddMode) -> Result<(), MediaError>;

    /// Unregisters `name`, returning the index it had.
    async fn remove_player(&self, name: &str) -> Option<usize>;
}

/// Handles `NameOwnerChanged` for a well-known name.
///
/// # Errors
/// Returns the registration error, or an error if the notice cannot be
/// queued.
pub async fn on_owner_changed<S: PlayerSource>(
    source: &S,
    name: &str,
    old_owner: &str,
    new_owner: &str,
) -> Result<(), MediaError> {
    if !is_player_name(name) {
        return Ok(());
    }

    match OwnerChange::from_owners(old_owner, new_owner) {
        OwnerChange::Created => {
            source.add_player(name, AddMode::Live).await?;
            announce(source, events::PLAYER_CREATED, name).await
        }
        OwnerChange::Removed => {
            let Some(index) = source.remove_player(name).await else {
                return Ok(());
            };
            let players = source.registry().read().await.names();
            let frame = events::player_removed(events::PlayerRemoved {
                player_index: index,
                player_name: name.to_string(),
                players,
            })?;
            events::emit(source.events(), frame).await
        }
        OwnerChange::Replaced => {
            source.remove_player(name).await;
            source.add_player(name, AddMode::Live).await?;
            announce(source, events::PLAYER_UPDATED, name).await
        }
        OwnerChange::Ignored => Ok(()),
    }
}

/// Handles `PropertiesChanged` on a player's interface.
///
/// # Errors
/// Returns [`MediaError::InvalidPlaybackStatus`] for a status outside
/// `Playing|Paused|Stopped`, a bus error if metadata cannot be refetched,
/// or an error if a notice cannot be queued.
pub async fn on_properties_changed<S: PlayerSource>(
    source: &S,
    sender: Option<&str>,
    changed: HashMap<String, OwnedValue>,
) -> Result<(), MediaError> {
    let Some((index, name, handle)) = resolve(source, sender).await else {
        return Ok(());
    };

    for (property, value) in changed {
        match property.as_str() {
            "PlaybackStatus" => {
                let playback_status: PlaybackStatus = String::try_from(value)?.parse()?;
                let frame = events::playback_status(events::PlaybackStatusUpdate {
                    player_index: index,
                    player_name: name.clone(),
                    playback_status,
                })?;
                events::emit(source.events(), frame).await?;
            }
            "Metadata" => {
                let metadata = handle.metadata().await?;
                let frame = events::metadata(events::MetadataUpdate {
                    player_index: index,
                    player_name: name.clone(),
                    metadata,
                })?;
                events::emit(source.events(), frame).await?;
            }
            other => trace!(property = other, "Ignoring property change"),
        }
    }

    Ok(())
}

/// Handles `Seeked`; `position` is in microseconds.
///
/// # Errors
/// Returns an error if the notice cannot be queued.
pub async fn on_seeked<S: PlayerSource>(
    source: &S,
    sender: Option<&str>,
    position: i64,
) -> Result<(), MediaError> {
    let Some((index, name, _)) = resolve(source, sender).await else {
        return Ok(());
    };

    let frame = events::seeked(events::SeekedUpdate {
        player_index: index,
        player_name: name,
        seeked_in_us: position,
    })?;
    events::emit(source.events(), frame).await
}

// Sends a creation or update notice if `name` made it into the registry.
async fn announce<S: PlayerSource>(source: &S, event: &str, name: &str) -> Result<(), MediaError> {
    let (entry, players) = {
        let registry = source.registry().read().await;
        (
            registry.index_of(name).zip(registry.handle(name)),
            registry.names(),
        )
    };
    let Some((index, handle)) = entry else {
        return Ok(());
    };

    let player = match handle.snapshot().await {
        Ok(data) => Some(data),
        Err(e) => {
            warn!(player = name, error = %e, "Player state unavailable");
            None
        }
    };

    let frame = events::player_changed(
        event,
        events::PlayerChanged {
            player_index: index,
            player_name: name.to_string(),
            player,
            players,
        },
    )?;
    events::emit(source.events(), frame).await
}

async fn resolve<S: PlayerSource>(
    source: &S,
    sender: Option<&str>,
) -> Option<(usize, String, S::Handle)> {
    let sender = sender?;
    let resolved = source.registry().read().await.by_sender(sender);
    if resolved.is_none() {
        trace!(sender, "Signal from an unregistered sender");
    }
    resolved
}
