//! MPRIS backend on the D-Bus session bus.

mod handle;
mod handshake;
mod proxy;
mod router;
mod rules;
mod session;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use zbus::Message;

use self::session::BusSession;
use super::commands::{RoutineInput, command_routine};
use crate::{
    comm::SubsystemEndpoint,
    config::MediaConfig,
    protocol::SubsystemKind,
    subsystems::{Subsystem, SubsystemError},
};

/// Media player module backed by MPRIS.
pub struct LinuxMediaPlayer {
    config: MediaConfig,
    endpoint: SubsystemEndpoint,
    session: Option<Arc<BusSession>>,
    signals: Option<mpsc::Receiver<Message>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl LinuxMediaPlayer {
    /// Creates an idle instance; the bus is not touched until setup.
    pub fn new(endpoint: SubsystemEndpoint, config: MediaConfig) -> Self {
        Self {
            config,
            endpoint,
            session: None,
            signals: None,
            cancel: CancellationToken::new(),
            tasks: Vec::new(),
        }
    }
}

#[async_trait]
impl Subsystem for LinuxMediaPlayer {
    fn kind(&self) -> SubsystemKind {
        SubsystemKind::MediaPlayer
    }

    #[instrument(skip(self))]
    async fn setup(&mut self) -> Result<(), SubsystemError> {
        let (session, signals) = BusSession::connect(
            self.config.clone(),
            self.endpoint.events(),
            self.cancel.child_token(),
        )
        .await?;
        let session = Arc::new(session);
        self.session = Some(Arc::clone(&session));
        self.signals = Some(signals);

        session.register_existing().await?;
        Ok(())
    }

    async fn start_routine(&mut self) -> Result<(), SubsystemError> {
        let (Some(session), Some(signals)) = (self.session.clone(), self.signals.take()) else {
            return Err(SubsystemError::Media(super::MediaError::InitializationFailed(
                "routine started before setup".to_string(),
            )));
        };

        let mut input = RoutineInput {
            frames: self.endpoint.claim_inbound().await,
            commands: self.endpoint.claim_commands().await,
        };
        input.discard_stale();

        self.tasks.push(tokio::spawn(session::signal_loop(
            Arc::clone(&session),
            signals,
            self.cancel.child_token(),
        )));
        self.tasks.push(tokio::spawn(command_routine(
            input,
            Arc::clone(&session.registry),
            session.events.clone(),
            self.cancel.child_token(),
        )));

        info!("Media player routines running");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn shutdown(&mut self) -> Result<(), SubsystemError> {
        self.endpoint.request_close();
        self.cancel.cancel();

        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "Media player task ended abnormally");
            }
        }

        if let Some(session) = self.session.take() {
            session.release().await;
        }
        self.signals = None;

        Ok(())
    }
}
