//! In-process channels between the transport, the orchestrator and the
//! subsystems.
//!
//! Channels are created once per server and outlive individual connections
//! and subsystem instances. Receivers that several consumers take turns on
//! (one connection at a time, one subsystem instance at a time) sit behind
//! an `Arc<Mutex<_>>` and are locked for the consumer's lifetime.

mod active;

pub use active::ActiveModules;

use std::{collections::HashMap, sync::Arc};

use bytes::Bytes;
use tokio::sync::{Mutex, OwnedMutexGuard, mpsc};

use crate::{
    protocol::{Frame, SubsystemKind},
    transmission::TransportError,
};

/// Control commands sent to a running subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleCommand {
    /// Stop the command routine
    Close,
}

/// Transport half of a subsystem's channel pair.
#[derive(Debug, Clone)]
pub struct TransportPort {
    inbound: mpsc::Sender<Bytes>,
    outbound: Arc<Mutex<mpsc::Receiver<Frame>>>,
}

impl TransportPort {
    /// Queues a raw frame for the subsystem.
    ///
    /// # Errors
    /// Returns the frame back if the subsystem side is gone.
    pub async fn forward(&self, frame: Bytes) -> Result<(), mpsc::error::SendError<Bytes>> {
        self.inbound.send(frame).await
    }

    /// Locks the outbound receiver for the lifetime of one connection.
    pub async fn claim_outbound(&self) -> OwnedMutexGuard<mpsc::Receiver<Frame>> {
        Arc::clone(&self.outbound).lock_owned().await
    }
}

/// Subsystem half of a channel pair: inbound frames, control commands and
/// the outbound event queue.
#[derive(Debug, Clone)]
pub struct SubsystemEndpoint {
    kind: SubsystemKind,
    inbound: Arc<Mutex<mpsc::Receiver<Bytes>>>,
    commands_tx: mpsc::Sender<ModuleCommand>,
    commands: Arc<Mutex<mpsc::Receiver<ModuleCommand>>>,
    outbound: mpsc::Sender<Frame>,
}

impl SubsystemEndpoint {
    /// Module this endpoint belongs to.
    pub fn kind(&self) -> SubsystemKind {
        self.kind
    }

    /// Locks the inbound frame receiver.
    pub async fn claim_inbound(&self) -> OwnedMutexGuard<mpsc::Receiver<Bytes>> {
        Arc::clone(&self.inbound).lock_owned().await
    }

    /// Locks the control command receiver.
    pub async fn claim_commands(&self) -> OwnedMutexGuard<mpsc::Receiver<ModuleCommand>> {
        Arc::clone(&self.commands).lock_owned().await
    }

    /// Asks the command routine to stop without waiting for queue space.
    ///
    /// Returns `false` if the command could not be queued.
    pub fn request_close(&self) -> bool {
        self.commands_tx.try_send(ModuleCommand::Close).is_ok()
    }

    /// Sender for outbound events.
    pub fn events(&self) -> mpsc::Sender<Frame> {
        self.outbound.clone()
    }
}

/// Creates the channel pair linking the transport to one subsystem.
pub fn bidir(kind: SubsystemKind, capacity: usize) -> (TransportPort, SubsystemEndpoint) {
    let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
    let (commands_tx, commands_rx) = mpsc::channel(capacity);
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity);

    let port = TransportPort {
        inbound: inbound_tx,
        outbound: Arc::new(Mutex::new(outbound_rx)),
    };
    let endpoint = SubsystemEndpoint {
        kind,
        inbound: Arc::new(Mutex::new(inbound_rx)),
        commands_tx,
        commands: Arc::new(Mutex::new(commands_rx)),
        outbound: outbound_tx,
    };

    (port, endpoint)
}

/// Orchestrator side of the control plane.
#[derive(Debug)]
pub struct ControlChannels {
    /// Module names requested by the client's `init`
    pub module_init: mpsc::Receiver<Vec<String>>,
    /// Fired when a connection ends
    pub module_close: mpsc::Receiver<()>,
    /// Listener, TLS and write failures
    pub transport_errors: mpsc::Receiver<TransportError>,
    /// Frames the orchestrator wants written to the client
    pub write: mpsc::Sender<Frame>,
}

/// Transport side of the control plane plus every subsystem port.
#[derive(Debug, Clone)]
pub struct TransportChannels {
    pub(crate) module_init: mpsc::Sender<Vec<String>>,
    pub(crate) module_close: mpsc::Sender<()>,
    pub(crate) transport_errors: mpsc::Sender<TransportError>,
    pub(crate) write: Arc<Mutex<mpsc::Receiver<Frame>>>,
    pub(crate) ports: HashMap<SubsystemKind, TransportPort>,
    pub(crate) active: ActiveModules,
}

impl TransportChannels {
    /// Port of `kind`, if this build has such a module.
    pub fn port(&self, kind: SubsystemKind) -> Option<&TransportPort> {
        self.ports.get(&kind)
    }

    /// Modules currently enabled for the connection.
    pub fn active(&self) -> &ActiveModules {
        &self.active
    }

    /// Reports a transport failure to the orchestrator without blocking.
    pub fn report(&self, error: TransportError) {
        if let Err(e) = self.transport_errors.try_send(error) {
            tracing::debug!("Transport error not delivered: {e}");
        }
    }
}

/// Everything [`wire`] produces, handed out to the three parties.
#[derive(Debug)]
pub struct Wiring {
    /// For the orchestrator
    pub control: ControlChannels,
    /// For the transmission server
    pub transport: TransportChannels,
    /// For subsystem constructors, one per known module
    pub endpoints: HashMap<SubsystemKind, SubsystemEndpoint>,
}

/// Builds all channels for one server instance.
pub fn wire(capacity: usize) -> Wiring {
    let (init_tx, init_rx) = mpsc::channel(1);
    let (close_tx, close_rx) = mpsc::channel(1);
    let (error_tx, error_rx) = mpsc::channel(1);
    let (write_tx, write_rx) = mpsc::channel(capacity);

    let mut ports = HashMap::new();
    let mut endpoints = HashMap::new();
    for kind in SubsystemKind::ALL {
        let (port, endpoint) = bidir(kind, capacity);
        ports.insert(kind, port);
        endpoints.insert(kind, endpoint);
    }

    Wiring {
        control: ControlChannels {
            module_init: init_rx,
            module_close: close_rx,
            transport_errors: error_rx,
            write: write_tx,
        },
        transport: TransportChannels {
            module_init: init_tx,
            module_close: close_tx,
            transport_errors: error_tx,
            write: Arc::new(Mutex::new(write_rx)),
            ports,
            active: ActiveModules::default(),
        },
        endpoints,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn frames_cross_the_pair_in_both_directions() {
        let (port, endpoint) = bidir(SubsystemKind::MediaPlayer, 4);

        port.forward(Bytes::from_static(b"\x91\xa7mp:list")).await.unwrap();
        let mut inbound = endpoint.claim_inbound().await;
        assert_eq!(inbound.recv().await.unwrap(), Bytes::from_static(b"\x91\xa7mp:list"));

        endpoint
            .events()
            .send(Frame::new("mp:rlist", Vec::new()))
            .await
            .unwrap();
        let mut outbound = port.claim_outbound().await;
        assert_eq!(outbound.recv().await.unwrap().method(), "mp:rlist");
    }

    #[tokio::test]
    async fn close_request_reaches_command_receiver() {
        let (_port, endpoint) = bidir(SubsystemKind::MediaPlayer, 1);

        assert!(endpoint.request_close());
        assert!(!endpoint.request_close());

        let mut commands = endpoint.claim_commands().await;
        assert_eq!(commands.recv().await, Some(ModuleCommand::Close));
    }

    #[tokio::test]
    async fn receivers_are_released_with_their_guard() {
        let (_port, endpoint) = bidir(SubsystemKind::MediaPlayer, 1);

        let first = endpoint.claim_inbound().await;
        assert!(endpoint.inbound.try_lock().is_err());
        drop(first);

        assert!(endpoint.inbound.try_lock().is_ok());
    }

    #[test]
    fn wire_creates_a_port_and_endpoint_per_module() {
        let wiring = wire(8);

        for kind in SubsystemKind::ALL {
            assert!(wiring.transport.port(kind).is_some());
            assert_eq!(wiring.endpoints[&kind].kind(), kind);
        }
    }
}
