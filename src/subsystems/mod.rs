//! Independently startable functional modules.
//!
//! Each module implements [`Subsystem`]; the orchestrator builds instances
//! through a [`SubsystemTable`] keyed by [`SubsystemKind`] and drives them
//! through a [`ManagedSubsystem`], which enforces the lifecycle.

mod error;
pub mod media_player;

pub use error::SubsystemError;

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::{
    comm::SubsystemEndpoint,
    config::MediaConfig,
    lifecycle::{Lifecycle, Phase},
    protocol::SubsystemKind,
};

/// Common interface of every module.
#[async_trait]
pub trait Subsystem: Send {
    /// Which module this is.
    fn kind(&self) -> SubsystemKind;

    /// Acquires external resources and publishes initial state.
    async fn setup(&mut self) -> Result<(), SubsystemError>;

    /// Spawns the long-running tasks that consume inbound frames.
    async fn start_routine(&mut self) -> Result<(), SubsystemError>;

    /// Stops all tasks and releases resources.
    async fn shutdown(&mut self) -> Result<(), SubsystemError>;
}

/// Builds a module instance around its channel endpoint.
pub type Constructor =
    Box<dyn Fn(SubsystemEndpoint) -> Result<Box<dyn Subsystem>, SubsystemError> + Send + Sync>;

/// Name-to-constructor table used by the orchestrator.
#[derive(Default)]
pub struct SubsystemTable {
    constructors: HashMap<SubsystemKind, Constructor>,
}

impl SubsystemTable {
    /// Table with every module this build ships.
    pub fn with_defaults(media: &MediaConfig) -> Self {
        let mut table = Self::default();
        let media = media.clone();
        table.register(SubsystemKind::MediaPlayer, move |endpoint| {
            media_player::new(endpoint, media.clone())
        });
        table
    }

    /// Adds or replaces the constructor for `kind`.
    pub fn register<F>(&mut self, kind: SubsystemKind, constructor: F)
    where
        F: Fn(SubsystemEndpoint) -> Result<Box<dyn Subsystem>, SubsystemError>
            + Send
            + Sync
            + 'static,
    {
        self.constructors.insert(kind, Box::new(constructor));
    }

    /// Builds a fresh instance of `kind`.
    ///
    /// # Errors
    /// Returns [`SubsystemError::NotRegistered`] for unknown kinds, or
    /// whatever the constructor reports.
    pub fn construct(
        &self,
        kind: SubsystemKind,
        endpoint: SubsystemEndpoint,
    ) -> Result<Box<dyn Subsystem>, SubsystemError> {
        let constructor = self
            .constructors
            .get(&kind)
            .ok_or(SubsystemError::NotRegistered(kind))?;
        constructor(endpoint)
    }
}

/// A started module together with its lifecycle.
pub struct ManagedSubsystem {
    inner: Box<dyn Subsystem>,
    lifecycle: Lifecycle,
}

impl ManagedSubsystem {
    /// Runs setup and starts the routine.
    ///
    /// A failed setup is cleaned up with a best-effort shutdown before the
    /// error is returned.
    ///
    /// # Errors
    /// Returns the setup or routine error.
    #[instrument(skip(inner), fields(module = %inner.kind()))]
    pub async fn start(inner: Box<dyn Subsystem>) -> Result<Self, SubsystemError> {
        let mut managed = Self {
            lifecycle: Lifecycle::new(inner.kind().name()),
            inner,
        };

        managed.lifecycle.transition(Phase::Initializing)?;

        let started = match managed.inner.setup().await {
            Ok(()) => managed.inner.start_routine().await,
            Err(e) => Err(e),
        };

        if let Err(e) = started {
            managed.lifecycle.transition(Phase::Closing)?;
            if let Err(cleanup) = managed.inner.shutdown().await {
                warn!(error = %cleanup, "Cleanup after failed start also failed");
            }
            managed.lifecycle.transition(Phase::Idle)?;
            return Err(e);
        }

        managed.lifecycle.transition(Phase::Active)?;
        info!("Module started");
        Ok(managed)
    }

    /// Module kind.
    pub fn kind(&self) -> SubsystemKind {
        self.inner.kind()
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    /// Shuts the module down, giving up after `timeout`.
    ///
    /// # Errors
    /// Returns [`SubsystemError::ShutdownTimeout`] when the bound elapses,
    /// a lifecycle error if the module is not running, or the module's own
    /// shutdown error.
    #[instrument(skip(self), fields(module = %self.kind()))]
    pub async fn stop(&mut self, timeout: Duration) -> Result<(), SubsystemError> {
        self.lifecycle.transition(Phase::Closing)?;
        let outcome = tokio::time::timeout(timeout, self.inner.shutdown()).await;
        self.lifecycle.transition(Phase::Idle)?;

        match outcome {
            Ok(result) => {
                info!("Module stopped");
                result
            }
            Err(_) => Err(SubsystemError::ShutdownTimeout {
                subsystem: self.kind(),
                timeout,
            }),
        }
    }
}
