//! Top-level orchestrator.
//!
//! Owns the transmission server, network discovery and the running
//! subsystems, and reacts to the control plane:
//!
//! ```text
//! Idle ─► Advertising ─► AwaitingInit ◄──► Active
//!                              │             │
//!                              └─► ShuttingDown ─► Stopped
//! ```

use std::{collections::BTreeMap, fmt, sync::Arc, time::Duration};

use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    comm::{self, ActiveModules, ControlChannels, SubsystemEndpoint},
    config::Config,
    discovery::{Advertiser, AdvertiserFactory, DiscoveryError, NetworkDiscovery},
    protocol::{Capabilities, Frame, SubsystemKind, methods},
    subsystems::{ManagedSubsystem, Subsystem, SubsystemError, SubsystemTable},
    transmission::{NetworkTransmissionServer, TransportError},
};

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Constructed, nothing started
    Idle,
    /// Discovery being brought up
    Advertising,
    /// Listening, no modules running
    AwaitingInit,
    /// A client initialized at least one module request
    Active,
    /// Tearing everything down
    ShuttingDown,
    /// Done
    Stopped,
}

impl ServerState {
    /// Whether `self -> next` is a legal step.
    pub fn can_become(self, next: ServerState) -> bool {
        use ServerState::*;

        matches!(
            (self, next),
            (Idle, Advertising)
                | (Advertising, AwaitingInit)
                | (AwaitingInit | Active, AwaitingInit | Active)
                | (Idle | Advertising | AwaitingInit | Active, ShuttingDown)
                | (ShuttingDown, Stopped)
        )
    }
}

impl fmt::Display for ServerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Errors that end the orchestrator.
#[derive(Error, Debug)]
pub enum ServerError {
    /// The transport could not be stopped cleanly
    #[error("transport shutdown failed: {0}")]
    TransportShutdown(#[source] TransportError),

    /// The orchestrator was driven out of order
    #[error("illegal server transition {from} -> {to}")]
    IllegalTransition {
        /// State before
        from: ServerState,
        /// Requested state
        to: ServerState,
    },
}

/// Runs the bridge until interrupted or stopped.
pub struct ServerModule {
    config: Config,
    state: ServerState,
    control: ControlChannels,
    active: ActiveModules,
    endpoints: BTreeMap<SubsystemKind, SubsystemEndpoint>,
    transmission: Arc<NetworkTransmissionServer>,
    subsystems: SubsystemTable,
    running: BTreeMap<SubsystemKind, ManagedSubsystem>,
    advertise: AdvertiserFactory,
    advertiser: Option<Box<dyn Advertiser>>,
    pending_error: Option<TransportError>,
    serve_task: Option<JoinHandle<()>>,
    stop: CancellationToken,
}

impl ServerModule {
    /// Wires the server with the platform's subsystems and mDNS discovery.
    pub fn new(config: Config) -> Self {
        let subsystems = SubsystemTable::with_defaults(&config.media);
        let advertise = NetworkDiscovery::factory(
            config.discovery.clone(),
            config.server.port,
            config.server.secure,
        );
        Self::with_components(config, subsystems, advertise)
    }

    /// Wires the server with explicit subsystem constructors and discovery.
    pub fn with_components(
        config: Config,
        subsystems: SubsystemTable,
        advertise: AdvertiserFactory,
    ) -> Self {
        let wiring = comm::wire(config.server.channel_capacity);
        let active = wiring.transport.active().clone();
        let transmission = Arc::new(NetworkTransmissionServer::new(
            config.server.clone(),
            wiring.transport,
        ));

        Self {
            config,
            state: ServerState::Idle,
            control: wiring.control,
            active,
            endpoints: wiring.endpoints.into_iter().collect(),
            transmission,
            subsystems,
            running: BTreeMap::new(),
            advertise,
            advertiser: None,
            pending_error: None,
            serve_task: None,
            stop: CancellationToken::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Token that ends [`run`](Self::run) when cancelled.
    pub fn stop_handle(&self) -> CancellationToken {
        self.stop.clone()
    }

    /// The transport, e.g. to query its bound address.
    pub fn transmission(&self) -> Arc<NetworkTransmissionServer> {
        Arc::clone(&self.transmission)
    }

    /// Advertises, serves, and handles control events until Ctrl-C, a
    /// transport failure, or the stop handle fires; then shuts down.
    ///
    /// # Errors
    /// Returns [`ServerError::TransportShutdown`] if the transport does not
    /// stop within the shutdown deadline.
    #[instrument(skip(self))]
    pub async fn run(mut self) -> Result<(), ServerError> {
        self.enter(ServerState::Advertising)?;
        self.start_discovery();
        self.start_transport();
        self.enter(ServerState::AwaitingInit)?;

        self.event_loop().await;
        self.shutdown().await
    }

    async fn event_loop(&mut self) {
        let interrupt = tokio::signal::ctrl_c();
        tokio::pin!(interrupt);

        loop {
            tokio::select! {
                biased;

                // A close queued behind a slow init belongs to the previous
                // client and must run before the next client's init.
                Some(()) = self.control.module_close.recv() => {
                    if let Err(e) = self.handle_module_close().await {
                        error!(error = %e, "Module close failed");
                    }
                }
                Some(modules) = self.control.module_init.recv() => {
                    if let Err(e) = self.handle_module_init(modules).await {
                        error!(error = %e, "Module init failed");
                    }
                }
                Some(error) = self.control.transport_errors.recv() => {
                    error!(%error, "Transport failed");
                    self.pending_error = Some(error);
                    return;
                }
                result = &mut interrupt => {
                    match result {
                        Ok(()) => info!("Interrupt received"),
                        Err(e) => warn!(error = %e, "Interrupt listener failed"),
                    }
                    return;
                }
                _ = self.stop.cancelled() => {
                    info!("Stop requested");
                    return;
                }
            }
        }
    }

    fn enter(&mut self, next: ServerState) -> Result<(), ServerError> {
        if !self.state.can_become(next) {
            return Err(ServerError::IllegalTransition {
                from: self.state,
                to: next,
            });
        }
        if self.state != next {
            debug!(from = %self.state, to = %next, "Server state changed");
        }
        self.state = next;
        Ok(())
    }

    fn start_transport(&mut self) {
        let transmission = Arc::clone(&self.transmission);
        self.serve_task = Some(tokio::spawn(async move {
            if let Err(e) = transmission.serve().await {
                transmission.channels().report(e);
            }
        }));
    }

    fn start_discovery(&mut self) {
        if self.advertiser.is_some() {
            return;
        }

        match (self.advertise)() {
            Ok(advertiser) => self.advertiser = Some(advertiser),
            Err(DiscoveryError::Disabled) => debug!("Network discovery disabled"),
            Err(e) => warn!(error = %e, "Network discovery unavailable, continuing without it"),
        }
    }

    fn stop_discovery(&mut self) {
        if let Some(mut advertiser) = self.advertiser.take() {
            advertiser.shutdown();
        }
    }

    #[instrument(skip(self))]
    pub(crate) async fn handle_module_init(
        &mut self,
        requested: Vec<String>,
    ) -> Result<(), ServerError> {
        let mut enabled: Vec<String> = Vec::new();

        for name in requested {
            let Some(kind) = SubsystemKind::from_name(&name) else {
                warn!(module = %name, "Client requested an unknown module");
                continue;
            };
            if enabled.iter().any(|n| *n == name) {
                continue;
            }

            if let Some(previous) = self.running.remove(&kind) {
                info!(module = %kind, "Restarting module for the new session");
                stop_subsystem(&self.active, previous, self.config.media.shutdown_timeout())
                    .await;
            }

            let started = match self.construct_subsystem(kind) {
                Ok(subsystem) => ManagedSubsystem::start(subsystem).await,
                Err(e) => Err(e),
            };
            match started {
                Ok(subsystem) => {
                    self.running.insert(kind, subsystem);
                    self.active.enable(kind).await;
                    enabled.push(name);
                }
                Err(e) => warn!(module = %kind, error = %e, "Module failed to start"),
            }
        }

        info!(modules = ?enabled, "Modules enabled");
        reply_init(&self.control.write, enabled).await;
        self.stop_discovery();
        self.enter(ServerState::Active)
    }

    #[instrument(skip(self))]
    pub(crate) async fn handle_module_close(&mut self) -> Result<(), ServerError> {
        info!("Client session ended");
        self.stop_subsystems(self.config.media.shutdown_timeout()).await;
        self.start_discovery();
        self.enter(ServerState::AwaitingInit)
    }

    fn construct_subsystem(
        &self,
        kind: SubsystemKind,
    ) -> Result<Box<dyn Subsystem>, SubsystemError> {
        let endpoint = self
            .endpoints
            .get(&kind)
            .cloned()
            .ok_or(SubsystemError::NotRegistered(kind))?;
        self.subsystems.construct(kind, endpoint)
    }

    async fn stop_subsystems(&mut self, timeout: Duration) {
        let running = std::mem::take(&mut self.running);
        for (_, subsystem) in running {
            stop_subsystem(&self.active, subsystem, timeout).await;
        }
    }

    #[instrument(skip(self))]
    async fn shutdown(&mut self) -> Result<(), ServerError> {
        self.enter(ServerState::ShuttingDown)?;
        let deadline = Instant::now() + self.config.server.shutdown_timeout();

        if let Some(error) = self.pending_error.take() {
            warn!(%error, "Shutting down after transport failure");
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        self.stop_subsystems(remaining.min(self.config.media.shutdown_timeout()))
            .await;

        let remaining = deadline.saturating_duration_since(Instant::now());
        let transport = self.transmission.shutdown(remaining).await;
        if let Some(task) = self.serve_task.take() {
            if transport.is_err() {
                task.abort();
            }
        }

        self.stop_discovery();
        self.enter(ServerState::Stopped)?;

        match transport {
            Ok(()) => {
                info!("Server stopped");
                Ok(())
            }
            Err(e) => Err(ServerError::TransportShutdown(e)),
        }
    }
}

// `ServerModule` is `Send` but not `Sync`, so `run` must never hold
// `&self` across an await.
async fn reply_init(write: &mpsc::Sender<Frame>, enabled: Vec<String>) {
    let reply = Capabilities {
        capabilities: enabled,
    };
    match Frame::event(methods::INIT_REPLY, &reply) {
        Ok(frame) => {
            if write.send(frame).await.is_err() {
                warn!("Transport gone, init reply dropped");
            }
        }
        Err(e) => error!(error = %e, "Failed to encode init reply"),
    }
}

async fn stop_subsystem(
    active: &ActiveModules,
    mut subsystem: ManagedSubsystem,
    timeout: Duration,
) {
    let kind = subsystem.kind();
    active.disable(kind).await;
    if let Err(e) = subsystem.stop(timeout).await {
        warn!(module = %kind, error = %e, "Module did not stop cleanly");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use crate::{
        config::ServerConfig,
        platform::Platform,
        subsystems::{Subsystem, tests::ScriptedSubsystem},
    };

    #[derive(Default)]
    struct Counters {
        advertised: AtomicUsize,
        withdrawn: AtomicUsize,
    }

    struct CountingAdvertiser(Arc<Counters>);

    impl Advertiser for CountingAdvertiser {
        fn shutdown(&mut self) {
            self.0.withdrawn.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting_factory(counters: &Arc<Counters>) -> AdvertiserFactory {
        let counters = Arc::clone(counters);
        Box::new(move || {
            counters.advertised.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingAdvertiser(Arc::clone(&counters))) as Box<dyn Advertiser>)
        })
    }

    fn test_config() -> Config {
        Config {
            server: ServerConfig {
                port: 0,
                secure: false,
                shutdown_timeout_secs: 2,
                ..ServerConfig::default()
            },
            ..Config::default()
        }
    }

    fn scripted_table(calls: &Arc<Mutex<Vec<&'static str>>>) -> SubsystemTable {
        let mut table = SubsystemTable::default();
        let calls = Arc::clone(calls);
        table.register(SubsystemKind::MediaPlayer, move |_| {
            Ok(Box::new(ScriptedSubsystem {
                calls: Arc::clone(&calls),
                fail_setup: false,
                hang_on_shutdown: false,
            }) as Box<dyn Subsystem>)
        });
        table
    }

    async fn next_written(server: &ServerModule) -> Frame {
        let mut write = server.transmission.channels().write.lock().await;
        write.recv().await.unwrap()
    }

    fn ready(server: &mut ServerModule) {
        server.enter(ServerState::Advertising).unwrap();
        server.start_discovery();
        server.enter(ServerState::AwaitingInit).unwrap();
    }

    #[tokio::test]
    async fn init_starts_modules_and_replies() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let counters = Arc::new(Counters::default());
        let mut server = ServerModule::with_components(
            test_config(),
            scripted_table(&calls),
            counting_factory(&counters),
        );
        ready(&mut server);

        server
            .handle_module_init(vec!["mp".to_string(), "bogus".to_string()])
            .await
            .unwrap();

        let reply = next_written(&server).await;
        assert_eq!(reply.method(), "rinit");
        let capabilities: Capabilities = reply.arg(0).unwrap();
        assert_eq!(capabilities.capabilities, vec!["mp".to_string()]);

        assert_eq!(server.state(), ServerState::Active);
        assert!(server.active.contains(SubsystemKind::MediaPlayer).await);
        assert_eq!(*calls.lock().unwrap(), vec!["setup", "routine"]);
        assert_eq!(counters.advertised.load(Ordering::SeqCst), 1);
        assert_eq!(counters.withdrawn.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsupported_module_is_left_out_of_the_reply() {
        let mut table = SubsystemTable::default();
        table.register(SubsystemKind::MediaPlayer, |endpoint| {
            Err(SubsystemError::Unsupported {
                subsystem: endpoint.kind(),
                platform: Platform::Other,
            })
        });
        let counters = Arc::new(Counters::default());
        let mut server =
            ServerModule::with_components(test_config(), table, counting_factory(&counters));
        ready(&mut server);

        server
            .handle_module_init(vec!["mp".to_string()])
            .await
            .unwrap();

        let capabilities: Capabilities = next_written(&server).await.arg(0).unwrap();
        assert!(capabilities.capabilities.is_empty());
        assert!(!server.active.contains(SubsystemKind::MediaPlayer).await);
    }

    #[tokio::test]
    async fn close_stops_modules_and_readvertises() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let counters = Arc::new(Counters::default());
        let mut server = ServerModule::with_components(
            test_config(),
            scripted_table(&calls),
            counting_factory(&counters),
        );
        ready(&mut server);
        server
            .handle_module_init(vec!["mp".to_string()])
            .await
            .unwrap();

        server.handle_module_close().await.unwrap();

        assert_eq!(server.state(), ServerState::AwaitingInit);
        assert!(!server.active.contains(SubsystemKind::MediaPlayer).await);
        assert_eq!(*calls.lock().unwrap(), vec!["setup", "routine", "shutdown"]);
        assert_eq!(counters.advertised.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn repeated_init_restarts_the_module() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let counters = Arc::new(Counters::default());
        let mut server = ServerModule::with_components(
            test_config(),
            scripted_table(&calls),
            counting_factory(&counters),
        );
        ready(&mut server);

        server.handle_module_init(vec!["mp".to_string()]).await.unwrap();
        server.handle_module_init(vec!["mp".to_string()]).await.unwrap();

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["setup", "routine", "shutdown", "setup", "routine"]
        );
        assert_eq!(server.running.len(), 1);
    }

    #[tokio::test]
    async fn queued_close_runs_before_the_next_init() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let counters = Arc::new(Counters::default());
        let mut server = ServerModule::with_components(
            test_config(),
            scripted_table(&calls),
            counting_factory(&counters),
        );
        ready(&mut server);
        server.handle_module_init(vec!["mp".to_string()]).await.unwrap();

        let channels = server.transmission.channels().clone();
        channels.module_init.try_send(vec!["mp".to_string()]).unwrap();
        channels.module_close.try_send(()).unwrap();
        server.stop.cancel();
        server.event_loop().await;

        assert_eq!(
            *calls.lock().unwrap(),
            vec!["setup", "routine", "shutdown", "setup", "routine"]
        );
        assert_eq!(server.state(), ServerState::Active);
        assert!(server.active.contains(SubsystemKind::MediaPlayer).await);
    }

    #[test]
    fn stopped_is_terminal() {
        assert!(ServerState::ShuttingDown.can_become(ServerState::Stopped));
        assert!(!ServerState::Stopped.can_become(ServerState::AwaitingInit));
        assert!(!ServerState::Stopped.can_become(ServerState::ShuttingDown));
        assert!(!ServerState::Idle.can_become(ServerState::Active));
    }

    #[test]
    fn run_can_be_spawned() {
        fn assert_send<T: Send>(_: &T) {}

        let server = ServerModule::with_components(
            test_config(),
            SubsystemTable::default(),
            counting_factory(&Arc::new(Counters::default())),
        );
        let run = server.run();

        assert_send(&run);
    }

    #[tokio::test]
    async fn stop_handle_ends_run() {
        let counters = Arc::new(Counters::default());
        let calls = Arc::new(Mutex::new(Vec::new()));
        let server = ServerModule::with_components(
            test_config(),
            scripted_table(&calls),
            counting_factory(&counters),
        );
        let stop = server.stop_handle();
        let transmission = server.transmission();

        let run = tokio::spawn(server.run());
        assert!(transmission.local_addr().await.is_some());
        stop.cancel();

        let result = tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
        assert_eq!(counters.withdrawn.load(Ordering::SeqCst), 1);
    }
}
