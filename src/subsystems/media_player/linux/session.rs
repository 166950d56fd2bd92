use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, trace, warn};
use zbus::{Connection, Message, fdo, names::BusName, zvariant::OwnedValue};

use super::{handle::PlayerHandle, handshake::SenderHandshake, router::SignalRouter, rules};
use crate::{
    config::MediaConfig,
    protocol::Frame,
    subsystems::media_player::{
        AddMode, MediaError, PlayerControl, PlayerRegistry, PlayerSource, dispatch, events,
        registry::RegisteredPlayer,
        signals::{SignalKind, is_player_name},
    },
};

/// One connection to the session bus and everything hanging off it.
pub(crate) struct BusSession {
    connection: Connection,
    dbus: fdo::DBusProxy<'static>,
    router: SignalRouter,
    pub(crate) registry: Arc<RwLock<PlayerRegistry<PlayerHandle>>>,
    pub(crate) events: mpsc::Sender<Frame>,
    config: MediaConfig,
}

impl BusSession {
    /// Connects and subscribes to player ownership changes. Signals are
    /// queued on the returned receiver until a dispatch loop drains it.
    pub(crate) async fn connect(
        config: MediaConfig,
        events: mpsc::Sender<Frame>,
        cancel: CancellationToken,
    ) -> Result<(Self, mpsc::Receiver<Message>), MediaError> {
        let connection = Connection::session()
            .await
            .map_err(|e| MediaError::InitializationFailed(format!("session bus: {e}")))?;
        let dbus = fdo::DBusProxy::new(&connection).await?;

        let (dispatch_tx, dispatch_rx) = mpsc::channel(config.signal_buffer);
        let router = SignalRouter::start(&connection, dispatch_tx, cancel);
        dbus.add_match_rule(rules::name_owner_changed()?).await?;

        let session = Self {
            connection,
            dbus,
            router,
            registry: Arc::new(RwLock::new(PlayerRegistry::new())),
            events,
            config,
        };

        Ok((session, dispatch_rx))
    }

    /// Registers every player already on the bus and reports their state.
    #[instrument(skip(self))]
    pub(crate) async fn register_existing(&self) -> Result<(), MediaError> {
        let names = self.dbus.list_names().await?;

        for name in names.iter().map(|n| n.as_str()).filter(|n| is_player_name(n)) {
            if let Err(e) = self.add_player(name, AddMode::Setup).await {
                warn!(player = name, error = %e, "Failed to register player");
            }
        }

        let sent = events::emit_setup_statuses(&self.registry, &self.events).await?;
        info!(players = sent, "Initial player state reported");
        Ok(())
    }

    /// Learns the unique name the player's signals come from.
    ///
    /// Toggles playback twice and watches for the resulting status change;
    /// if none shows up in time the bus daemon is asked for the owner.
    async fn discover_sender(
        &self,
        name: &str,
        handle: &PlayerHandle,
    ) -> Result<String, MediaError> {
        let mut handshake = SenderHandshake::begin(
            &self.router,
            self.config.handshake_timeout(),
            self.config.signal_buffer,
        );
        let observed = handshake_sender(&mut handshake, handle).await;
        handshake.finish();

        match observed {
            Ok(sender) => Ok(sender),
            Err(e) => {
                debug!(error = %e, "Handshake failed, asking the bus for the owner");
                let owner = self.dbus.get_name_owner(BusName::try_from(name)?).await?;
                Ok(owner.to_string())
            }
        }
    }

    /// Removes every player and the ownership subscription.
    pub(crate) async fn release(&self) {
        let players = self.registry.write().await.drain();
        for (name, player) in players {
            self.forget(&name, player).await;
        }
        self.remove_rule(rules::name_owner_changed()).await;
    }

    // Bus-side cleanup for an entry already taken out of the registry.
    async fn forget(&self, name: &str, player: RegisteredPlayer<PlayerHandle>) {
        self.remove_rule(rules::properties_changed(name)).await;
        self.remove_rule(rules::seeked(&player.sender)).await;

        if self.config.quit_on_remove {
            if let Err(e) = player.handle.quit().await {
                debug!(player = name, error = %e, "Quit request not honoured");
            }
        }
    }

    async fn remove_rule(&self, rule: zbus::Result<zbus::MatchRule<'static>>) {
        let result = match rule {
            Ok(rule) => self.dbus.remove_match_rule(rule).await.map_err(MediaError::from),
            Err(e) => Err(MediaError::from(e)),
        };
        if let Err(e) = result {
            debug!(error = %e, "Failed to remove match rule");
        }
    }

    /// Routes one signal to its handler.
    pub(crate) async fn dispatch(&self, message: &Message) -> Result<(), MediaError> {
        let header = message.header();
        let (Some(interface), Some(member)) = (header.interface(), header.member()) else {
            return Err(MediaError::MalformedSignal(
                "missing interface or member".to_string(),
            ));
        };
        let kind = SignalKind::classify(interface.as_str(), member.as_str());
        let sender = header.sender().map(|s| s.to_string());
        let body = message.body();

        match kind {
            SignalKind::PropertiesChanged => {
                let (_, changed, _): (String, HashMap<String, OwnedValue>, Vec<String>) =
                    body.deserialize()?;
                dispatch::on_properties_changed(self, sender.as_deref(), changed).await
            }
            SignalKind::NameOwnerChanged => {
                let (name, old_owner, new_owner): (String, String, String) =
                    body.deserialize()?;
                dispatch::on_owner_changed(self, &name, &old_owner, &new_owner).await
            }
            SignalKind::Seeked => {
                let position: i64 = body.deserialize()?;
                dispatch::on_seeked(self, sender.as_deref(), position).await
            }
            SignalKind::Other => {
                trace!(%interface, %member, "Ignoring signal");
                Ok(())
            }
        }
    }
}

#[async_trait]
impl PlayerSource for BusSession {
    type Handle = PlayerHandle;

    fn registry(&self) -> &RwLock<PlayerRegistry<PlayerHandle>> {
        &self.registry
    }

    fn events(&self) -> &mpsc::Sender<Frame> {
        &self.events
    }

    #[instrument(skip(self), fields(player = name))]
    async fn add_player(&self, name: &str, mode: AddMode) -> Result<(), MediaError> {
        if self.config.is_ignored(name) {
            info!("Ignoring player based on configuration");
            return Ok(());
        }

        if self.registry.read().await.contains(name) {
            debug!("Player already registered, replacing it");
            self.remove_player(name).await;
        }

        if mode == AddMode::Live {
            tokio::time::sleep(self.config.add_settle_delay()).await;
        }

        let handle = PlayerHandle::connect(&self.connection, name).await?;
        self.dbus
            .add_match_rule(rules::properties_changed(name)?)
            .await?;

        let sender = match self.discover_sender(name, &handle).await {
            Ok(sender) => sender,
            Err(e) => {
                self.remove_rule(rules::properties_changed(name)).await;
                return Err(e);
            }
        };
        self.dbus.add_match_rule(rules::seeked(&sender)?).await?;

        let identity = handle.identity().await;
        self.registry.write().await.insert(name, sender.as_str(), handle);
        info!(%sender, ?identity, "Player registered");

        Ok(())
    }

    #[instrument(skip(self), fields(player = name))]
    async fn remove_player(&self, name: &str) -> Option<usize> {
        let (index, player) = self.registry.write().await.remove(name)?;
        self.forget(name, player).await;

        info!(index, "Player removed");
        Some(index)
    }
}

async fn handshake_sender(
    handshake: &mut SenderHandshake<'_>,
    handle: &PlayerHandle,
) -> Result<String, MediaError> {
    handle.play_pause().await?;
    let observed = handshake.next_status_sender().await;
    // Put the player back the way it was whether or not the signal came.
    handle.play_pause().await?;
    let sender = observed?;

    if let Err(e) = handshake.next_status_sender().await {
        debug!(error = %e, "Second status change not observed");
    }

    Ok(sender)
}

/// Drains the dispatch queue until cancelled.
pub(crate) async fn signal_loop(
    session: Arc<BusSession>,
    mut signals: mpsc::Receiver<Message>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => break,
            message = signals.recv() => match message {
                Some(message) => message,
                None => break,
            },
        };

        match session.dispatch(&message).await {
            Ok(()) => {}
            Err(MediaError::EventChannelClosed) => break,
            Err(e) => warn!(error = %e, "Failed to handle signal"),
        }
    }

    debug!("Signal loop stopped");
}
