use std::{io, net::SocketAddr, time::Duration};

use crate::{
    lifecycle::LifecycleError,
    protocol::{ProtocolError, SubsystemKind},
};

/// Errors raised by the network transmission server.
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    /// Listener could not be bound or stopped with an I/O error
    #[error("failed to serve on {addr}: {source}")]
    Serve {
        /// Address the listener was bound to
        addr: SocketAddr,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Certificate generation or TLS configuration failed
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// Network interfaces could not be listed
    #[error("failed to enumerate network interfaces: {0}")]
    Interfaces(String),

    /// Reading from the WebSocket failed
    #[error("read failed: {0}")]
    Read(String),

    /// Writing to the WebSocket failed or timed out
    #[error("write failed: {0}")]
    Write(String),

    /// Graceful shutdown did not finish before the deadline
    #[error("shutdown did not complete within {0:?}")]
    ShutdownTimeout(Duration),

    /// Frame-level protocol error
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Request arrived in a phase that does not accept it
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The receiving side of an in-process channel is gone
    #[error("channel to '{0}' closed")]
    ChannelClosed(&'static str),
}

impl TransportError {
    /// Channel-closed error for a module port.
    pub fn module_closed(kind: SubsystemKind) -> Self {
        TransportError::ChannelClosed(kind.name())
    }
}
