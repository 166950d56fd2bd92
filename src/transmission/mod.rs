//! Network transmission server.
//!
//! Terminates exactly one WebSocket connection at `/`, decodes and routes
//! inbound frames, and writes frames produced by the orchestrator and the
//! subsystems. A second concurrent client is turned away with
//! `423 Locked`.

mod connection;
mod error;
pub mod interfaces;
pub mod tls;

pub use error::TransportError;

use std::{
    net::{Ipv4Addr, SocketAddr},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use axum_server::Handle;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, instrument, warn};

use crate::{comm::TransportChannels, config::ServerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServeState {
    Idle,
    Serving,
    Stopped,
}

/// Accepts a single client and shuttles frames between it and the
/// in-process channels.
pub struct NetworkTransmissionServer {
    config: ServerConfig,
    shared: Arc<Shared>,
    handle: Handle,
    state: watch::Sender<ServeState>,
}

pub(crate) struct Shared {
    pub(crate) channels: TransportChannels,
    pub(crate) tenancy: Arc<Tenancy>,
    pub(crate) cancel: CancellationToken,
    pub(crate) io_timeout: Duration,
}

impl NetworkTransmissionServer {
    /// Creates the server; nothing is bound until [`serve`](Self::serve).
    pub fn new(config: ServerConfig, channels: TransportChannels) -> Self {
        let shared = Arc::new(Shared {
            channels,
            tenancy: Arc::new(Tenancy::default()),
            cancel: CancellationToken::new(),
            io_timeout: config.io_timeout(),
        });
        let (state, _) = watch::channel(ServeState::Idle);

        Self {
            config,
            shared,
            handle: Handle::new(),
            state,
        }
    }

    /// Binds `0.0.0.0:<port>` and serves until shut down.
    ///
    /// When `secure` is set a self-signed certificate covering the host's
    /// IPv4 addresses is generated first.
    ///
    /// # Errors
    /// Returns an error if interfaces cannot be listed, TLS setup fails, or
    /// the listener cannot be bound.
    #[instrument(skip(self), fields(port = self.config.port, secure = self.config.secure))]
    pub async fn serve(&self) -> Result<(), TransportError> {
        if self.shared.cancel.is_cancelled() {
            return Ok(());
        }

        self.state.send_replace(ServeState::Serving);
        let result = self.serve_inner().await;
        self.state.send_replace(ServeState::Stopped);

        result
    }

    async fn serve_inner(&self) -> Result<(), TransportError> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.config.port));
        let app = self.router();

        let served = if self.config.secure {
            let addresses = interfaces::ipv4_addresses()?;
            let tls = tls::server_config(&addresses).await?;

            info!(%addr, "Listening for a client over TLS");
            axum_server::bind_rustls(addr, tls)
                .handle(self.handle.clone())
                .serve(app.into_make_service())
                .await
        } else {
            info!(%addr, "Listening for a client");
            axum_server::bind(addr)
                .handle(self.handle.clone())
                .serve(app.into_make_service())
                .await
        };

        served.map_err(|source| TransportError::Serve { addr, source })
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/", get(upgrade))
            .with_state(Arc::clone(&self.shared))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                self.shared.io_timeout,
            ))
            .layer(TraceLayer::new_for_http())
    }

    pub(crate) fn channels(&self) -> &TransportChannels {
        &self.shared.channels
    }

    /// Address the listener is bound to, once it is listening.
    ///
    /// Returns `None` if binding failed.
    pub async fn local_addr(&self) -> Option<SocketAddr> {
        self.handle.listening().await
    }

    /// Closes the live connection and stops the listener.
    ///
    /// # Errors
    /// Returns [`TransportError::ShutdownTimeout`] if the listener is still
    /// running after `deadline`.
    #[instrument(skip(self))]
    pub async fn shutdown(&self, deadline: Duration) -> Result<(), TransportError> {
        self.shared.cancel.cancel();

        if *self.state.borrow() == ServeState::Idle {
            return Ok(());
        }

        self.handle.graceful_shutdown(Some(deadline));

        let mut state = self.state.subscribe();
        let stopped = tokio::time::timeout(deadline, async {
            state
                .wait_for(|state| *state == ServeState::Stopped)
                .await
                .is_ok()
        })
        .await;

        match stopped {
            Ok(_) => {
                info!("Transmission server stopped");
                Ok(())
            }
            Err(_) => Err(TransportError::ShutdownTimeout(deadline)),
        }
    }
}

async fn upgrade(State(shared): State<Arc<Shared>>, ws: WebSocketUpgrade) -> Response {
    let Some(guard) = shared.tenancy.try_claim() else {
        warn!("Rejecting connection: a client is already connected");
        return (
            StatusCode::LOCKED,
            "Server already connected, cannot accept more connections.",
        )
            .into_response();
    };

    info!("Client connected");
    ws.on_upgrade(move |socket| connection::run(socket, shared, guard))
}

/// Single-connection admission flag.
#[derive(Debug, Default)]
pub(crate) struct Tenancy(AtomicBool);

impl Tenancy {
    pub(crate) fn try_claim(self: &Arc<Self>) -> Option<TenancyGuard> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| TenancyGuard(Arc::clone(self)))
    }
}

/// Releases the connection slot when dropped.
pub(crate) struct TenancyGuard(Arc<Tenancy>);

impl Drop for TenancyGuard {
    fn drop(&mut self) {
        self.0.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_one_tenant_at_a_time() {
        let tenancy = Arc::new(Tenancy::default());

        let first = tenancy.try_claim();
        assert!(first.is_some());
        assert!(tenancy.try_claim().is_none());

        drop(first);
        assert!(tenancy.try_claim().is_some());
    }
}
