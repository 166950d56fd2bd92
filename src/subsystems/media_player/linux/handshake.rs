use std::time::Duration;

use tokio::{sync::mpsc, time::Instant};
use tracing::trace;
use zbus::{Message, zvariant::OwnedValue};

use super::router::SignalRouter;
use crate::subsystems::media_player::{MediaError, signals::PLAYER_INTERFACE};

type PropertiesBody = (String, std::collections::HashMap<String, OwnedValue>, Vec<String>);

/// Temporarily takes over the signal stream to learn a player's unique
/// bus name from the first playback status change it emits.
///
/// Signals that arrive meanwhile and are not the awaited one are held back
/// and handed to the dispatch queue when the handshake ends, in arrival
/// order. The router is restored on drop as well.
pub(crate) struct SenderHandshake<'r> {
    router: &'r SignalRouter,
    signals: mpsc::Receiver<Message>,
    deferred: Vec<Message>,
    timeout: Duration,
}

impl<'r> SenderHandshake<'r> {
    pub(crate) fn begin(router: &'r SignalRouter, timeout: Duration, capacity: usize) -> Self {
        let (tx, signals) = mpsc::channel(capacity);
        router.divert(tx);

        Self {
            router,
            signals,
            deferred: Vec::new(),
            timeout,
        }
    }

    /// Waits for the next playback status change and returns its sender.
    pub(crate) async fn next_status_sender(&mut self) -> Result<String, MediaError> {
        let deadline = Instant::now() + self.timeout;

        loop {
            let message = match tokio::time::timeout_at(deadline, self.signals.recv()).await {
                Ok(Some(message)) => message,
                Ok(None) | Err(_) => return Err(MediaError::HandshakeTimeout(self.timeout)),
            };

            if is_playback_status_change(&message) {
                if let Some(sender) = message.header().sender() {
                    return Ok(sender.to_string());
                }
            }

            trace!("Deferring signal received during handshake");
            self.deferred.push(message);
        }
    }

    /// Restores the router and requeues deferred signals.
    pub(crate) fn finish(mut self) {
        self.router.restore();
        while let Ok(message) = self.signals.try_recv() {
            self.deferred.push(message);
        }
        for message in std::mem::take(&mut self.deferred) {
            self.router.redeliver(message);
        }
    }
}

impl Drop for SenderHandshake<'_> {
    fn drop(&mut self) {
        self.router.restore();
    }
}

fn is_playback_status_change(message: &Message) -> bool {
    let header = message.header();
    let is_properties_changed = header.interface().map(|i| i.as_str())
        == Some("org.freedesktop.DBus.Properties")
        && header.member().map(|m| m.as_str()) == Some("PropertiesChanged");
    if !is_properties_changed {
        return false;
    }

    match message.body().deserialize::<PropertiesBody>() {
        Ok((interface, changed, _)) => {
            interface == PLAYER_INTERFACE && changed.contains_key("PlaybackStatus")
        }
        Err(_) => false,
    }
}
