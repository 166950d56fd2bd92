use async_trait::async_trait;
use zbus::{Connection, proxy::CacheProperties};

use super::proxy::{MediaPlayer2PlayerProxy, MediaPlayer2Proxy};
use crate::subsystems::media_player::{
    LoopStatus, MediaError, PlaybackStatus, PlayerControl, PlayerData, TrackMetadata,
};

/// Proxies for one player's well-known name.
///
/// Property caching is off so every read goes to the player.
#[derive(Clone)]
pub(crate) struct PlayerHandle {
    base: MediaPlayer2Proxy<'static>,
    player: MediaPlayer2PlayerProxy<'static>,
}

impl PlayerHandle {
    pub(crate) async fn connect(connection: &Connection, name: &str) -> Result<Self, MediaError> {
        let base = MediaPlayer2Proxy::builder(connection)
            .destination(name.to_owned())?
            .cache_properties(CacheProperties::No)
            .build()
            .await?;
        let player = MediaPlayer2PlayerProxy::builder(connection)
            .destination(name.to_owned())?
            .cache_properties(CacheProperties::No)
            .build()
            .await?;

        Ok(Self { base, player })
    }

    pub(crate) async fn quit(&self) -> Result<(), MediaError> {
        Ok(self.base.quit().await?)
    }

    pub(crate) async fn identity(&self) -> Option<String> {
        self.base.identity().await.ok()
    }
}

#[async_trait]
impl PlayerControl for PlayerHandle {
    async fn play(&self) -> Result<(), MediaError> {
        Ok(self.player.play().await?)
    }

    async fn pause(&self) -> Result<(), MediaError> {
        Ok(self.player.pause().await?)
    }

    async fn play_pause(&self) -> Result<(), MediaError> {
        Ok(self.player.play_pause().await?)
    }

    async fn next(&self) -> Result<(), MediaError> {
        Ok(self.player.next().await?)
    }

    async fn previous(&self) -> Result<(), MediaError> {
        Ok(self.player.previous().await?)
    }

    async fn seek(&self, offset_us: i64) -> Result<(), MediaError> {
        Ok(self.player.seek(offset_us).await?)
    }

    async fn playback_status(&self) -> Result<PlaybackStatus, MediaError> {
        self.player.playback_status().await?.parse()
    }

    async fn metadata(&self) -> Result<TrackMetadata, MediaError> {
        Ok(TrackMetadata::from(self.player.metadata().await?))
    }

    async fn snapshot(&self) -> Result<PlayerData, MediaError> {
        let playback_status = self.playback_status().await?;
        let metadata = self.metadata().await.unwrap_or_default();
        let loop_status = self
            .player
            .loop_status()
            .await
            .map(|status| LoopStatus::from(status.as_str()))
            .unwrap_or_default();
        let shuffle = self.player.shuffle().await.unwrap_or(false);

        Ok(PlayerData {
            playback_status,
            loop_status,
            shuffle,
            metadata,
            rate: self.player.rate().await.ok(),
            volume: self.player.volume().await.ok(),
            position: self.player.position().await.ok(),
        })
    }
}
