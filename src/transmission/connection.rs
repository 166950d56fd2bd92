use std::{sync::Arc, time::Duration};

use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use bytes::Bytes;
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::sync::{OwnedMutexGuard, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use super::{Shared, TenancyGuard, TransportError};
use crate::{
    comm::TransportChannels,
    lifecycle::{Lifecycle, Phase},
    protocol::{Frame, InitRequest, ProtocolError, Route, SubsystemKind},
};

type Sink = SplitSink<WebSocket, Message>;
type Outbound = OwnedMutexGuard<mpsc::Receiver<Frame>>;

/// Drives one accepted connection until either side ends it.
pub(super) async fn run(socket: WebSocket, shared: Arc<Shared>, _tenancy: TenancyGuard) {
    let (sink, stream) = socket.split();
    let (close_tx, close_rx) = oneshot::channel();
    let cancel = shared.cancel.child_token();

    // Drained before the first inbound frame is read, so replies to this
    // client's `init` are never discarded.
    let (mut write, mut events) = claim_outbound(&shared.channels).await;
    let stale = discard_stale(&mut write, &mut events);
    if stale > 0 {
        debug!(frames = stale, "Discarded frames queued before the connection");
    }

    let writer = tokio::spawn(write_loop(
        sink,
        write,
        events,
        Arc::clone(&shared),
        close_rx,
        cancel.clone(),
    ));

    let outcome = read_loop(stream, &shared.channels, &cancel).await;

    if shared.channels.module_close.try_send(()).is_err() {
        debug!("Module close already pending");
    }

    let close = match outcome {
        Ok(()) if cancel.is_cancelled() => going_away(),
        Ok(()) => CloseFrame {
            code: close_code::NORMAL,
            reason: "THANK YOU".into(),
        },
        Err(e) => {
            warn!(error = %e, "Connection failed");
            CloseFrame {
                code: close_code::ERROR,
                reason: "SERVER ERROR".into(),
            }
        }
    };
    let _ = close_tx.send(close);

    if let Err(e) = writer.await {
        warn!(error = %e, "Write loop did not finish cleanly");
    }

    info!("Client disconnected");
}

async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    channels: &TransportChannels,
    cancel: &CancellationToken,
) -> Result<(), TransportError> {
    let mut session = Session::new();

    loop {
        let message = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            message = stream.next() => message,
        };

        match message {
            None => return Ok(()),
            Some(Err(e)) => return Err(TransportError::Read(e.to_string())),
            Some(Ok(Message::Binary(data))) => {
                if let Err(e) = session.handle_frame(data, channels).await {
                    warn!(error = %e, "Dropping frame");
                }
            }
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "Client sent close");
                return Ok(());
            }
            Some(Ok(_)) => {}
        }
    }
}

async fn claim_outbound(channels: &TransportChannels) -> (Outbound, Vec<Outbound>) {
    let write = Arc::clone(&channels.write).lock_owned().await;
    let mut events = Vec::with_capacity(channels.ports.len());
    for port in channels.ports.values() {
        events.push(port.claim_outbound().await);
    }
    (write, events)
}

async fn write_loop(
    mut sink: Sink,
    mut write: Outbound,
    mut events: Vec<Outbound>,
    shared: Arc<Shared>,
    mut close_rx: oneshot::Receiver<CloseFrame>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            close = &mut close_rx => {
                if let Err(e) = sink.send(Message::Close(close.ok())).await {
                    debug!(error = %e, "Close frame not delivered");
                }
                break;
            }
            _ = cancel.cancelled() => {
                if let Err(e) = sink.send(Message::Close(Some(going_away()))).await {
                    debug!(error = %e, "Close frame not delivered");
                }
                break;
            }
            Some(frame) = write.recv() => frame,
            Some(frame) = next_event(&mut events) => frame,
        };

        match send_frame(&mut sink, &frame, shared.io_timeout).await {
            Ok(()) => {}
            Err(TransportError::Protocol(e)) => {
                warn!(error = %e, "Skipping unencodable frame");
            }
            Err(e) => {
                warn!(error = %e, "Write failed");
                shared.channels.report(e);
                break;
            }
        }
    }
}

/// Drops frames left over from an earlier session; their player indices
/// refer to a registry the new client never saw.
fn discard_stale(write: &mut mpsc::Receiver<Frame>, events: &mut [Outbound]) -> usize {
    let mut discarded = 0;
    while write.try_recv().is_ok() {
        discarded += 1;
    }
    for rx in events.iter_mut() {
        while rx.try_recv().is_ok() {
            discarded += 1;
        }
    }
    discarded
}

fn going_away() -> CloseFrame {
    CloseFrame {
        code: close_code::AWAY,
        reason: "SERVER SHUTDOWN".into(),
    }
}

async fn next_event(events: &mut [Outbound]) -> Option<Frame> {
    if events.is_empty() {
        return std::future::pending().await;
    }

    let pending = events.iter_mut().map(|rx| Box::pin(rx.recv()));
    let (frame, _, _) = futures::future::select_all(pending).await;
    frame
}

async fn send_frame(
    sink: &mut Sink,
    frame: &Frame,
    io_timeout: Duration,
) -> Result<(), TransportError> {
    let bytes = frame.encode()?;
    trace!(method = frame.method(), bytes = bytes.len(), "Writing frame");

    match tokio::time::timeout(io_timeout, sink.send(Message::Binary(bytes.into()))).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(TransportError::Write(e.to_string())),
        Err(_) => Err(TransportError::Write(format!(
            "timed out after {io_timeout:?}"
        ))),
    }
}

/// Per-connection protocol state.
pub(crate) struct Session {
    lifecycle: Lifecycle,
}

impl Session {
    pub(crate) fn new() -> Self {
        Self {
            lifecycle: Lifecycle::new("connection"),
        }
    }

    #[cfg(test)]
    pub(crate) fn phase(&self) -> Phase {
        self.lifecycle.phase()
    }

    /// Decodes one frame and acts on its route.
    pub(crate) async fn handle_frame(
        &mut self,
        data: Bytes,
        channels: &TransportChannels,
    ) -> Result<(), TransportError> {
        let frame = Frame::decode(&data)?;
        if frame.args().is_empty() {
            warn!(method = frame.method(), "Frame carries no arguments");
        }

        match frame.route() {
            Route::Init => self.init(&frame, channels).await,
            Route::Close => self.close(),
            Route::Subsystem { kind, method } => {
                self.forward(kind, method.as_deref(), data, channels).await
            }
            Route::Unknown(prefix) => {
                if self.lifecycle.is_active() {
                    Err(ProtocolError::UnknownMethod(frame.method().to_string()).into())
                } else {
                    debug!(%prefix, "Ignoring unknown method before init");
                    Ok(())
                }
            }
        }
    }

    async fn init(
        &mut self,
        frame: &Frame,
        channels: &TransportChannels,
    ) -> Result<(), TransportError> {
        self.lifecycle.transition(Phase::Initializing)?;

        let modules = match frame.arg::<InitRequest>(0) {
            Ok(request) => request.into_modules(),
            Err(ProtocolError::MissingArgument { .. }) => Vec::new(),
            Err(e) => {
                self.lifecycle.reset();
                return Err(e.into());
            }
        };

        info!(?modules, "Client requested modules");
        if channels.module_init.send(modules).await.is_err() {
            self.lifecycle.reset();
            return Err(TransportError::ChannelClosed("orchestrator"));
        }

        self.lifecycle.transition(Phase::Active)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        self.lifecycle.transition(Phase::Closing)?;
        self.lifecycle.transition(Phase::Idle)?;
        info!("Client closed the session");
        Ok(())
    }

    async fn forward(
        &mut self,
        kind: SubsystemKind,
        method: Option<&str>,
        data: Bytes,
        channels: &TransportChannels,
    ) -> Result<(), TransportError> {
        if !self.lifecycle.is_active() {
            debug!(%kind, "Ignoring module frame before init");
            return Ok(());
        }

        if !channels.active().contains(kind).await {
            debug!(%kind, "Ignoring frame for a module that is not running");
            return Ok(());
        }

        let Some(port) = channels.port(kind) else {
            return Err(TransportError::module_closed(kind));
        };

        trace!(%kind, ?method, bytes = data.len(), "Forwarding frame");
        port.forward(data)
            .await
            .map_err(|_| TransportError::module_closed(kind))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rmpv::Value;

    use super::*;
    use crate::{comm, protocol::Capabilities};

    fn bytes(frame: &Frame) -> Bytes {
        Bytes::from(frame.encode().unwrap())
    }

    fn init_frame(modules: &[&str]) -> Bytes {
        let capabilities = Capabilities {
            capabilities: modules.iter().map(|m| m.to_string()).collect(),
        };
        bytes(&Frame::event("init", &capabilities).unwrap())
    }

    #[tokio::test]
    async fn init_forwards_requested_modules_once() {
        let mut wiring = comm::wire(4);
        let mut session = Session::new();

        session
            .handle_frame(init_frame(&["mp"]), &wiring.transport)
            .await
            .unwrap();
        assert_eq!(session.phase(), Phase::Active);
        assert_eq!(
            wiring.control.module_init.recv().await.unwrap(),
            vec!["mp".to_string()]
        );

        let second = session
            .handle_frame(init_frame(&["mp"]), &wiring.transport)
            .await;
        assert!(matches!(second, Err(TransportError::Lifecycle(_))));
        assert!(wiring.control.module_init.try_recv().is_err());
    }

    #[tokio::test]
    async fn init_accepts_bare_name_list() {
        let mut wiring = comm::wire(4);
        let mut session = Session::new();
        let frame = Frame::new("init", vec![Value::Array(vec![Value::from("mp")])]);

        session
            .handle_frame(bytes(&frame), &wiring.transport)
            .await
            .unwrap();

        assert_eq!(
            wiring.control.module_init.recv().await.unwrap(),
            vec!["mp".to_string()]
        );
    }

    #[tokio::test]
    async fn module_frames_need_init_and_a_running_module() {
        let wiring = comm::wire(4);
        let mut session = Session::new();
        let list = bytes(&Frame::new("mp:list", vec![Value::Nil]));
        let endpoint = &wiring.endpoints[&SubsystemKind::MediaPlayer];
        let mut inbound = endpoint.claim_inbound().await;

        session
            .handle_frame(list.clone(), &wiring.transport)
            .await
            .unwrap();
        assert!(inbound.try_recv().is_err());

        session
            .handle_frame(init_frame(&["mp"]), &wiring.transport)
            .await
            .unwrap();
        session
            .handle_frame(list.clone(), &wiring.transport)
            .await
            .unwrap();
        assert!(inbound.try_recv().is_err());

        wiring.transport.active().enable(SubsystemKind::MediaPlayer).await;
        session
            .handle_frame(list.clone(), &wiring.transport)
            .await
            .unwrap();
        assert_eq!(inbound.try_recv().unwrap(), list);
    }

    #[tokio::test]
    async fn frames_queued_between_connections_are_discarded() {
        let wiring = comm::wire(4);
        let endpoint = &wiring.endpoints[&SubsystemKind::MediaPlayer];
        endpoint
            .events()
            .send(Frame::new("mp:linux:psu", vec![Value::Nil]))
            .await
            .unwrap();
        wiring
            .control
            .write
            .send(Frame::new("rinit", Vec::new()))
            .await
            .unwrap();

        let (mut write, mut events) = claim_outbound(&wiring.transport).await;

        assert_eq!(discard_stale(&mut write, &mut events), 2);
        assert!(write.try_recv().is_err());
        assert!(events.iter_mut().all(|rx| rx.try_recv().is_err()));

        endpoint
            .events()
            .send(Frame::new("mp:linux:mu", vec![Value::Nil]))
            .await
            .unwrap();
        assert_eq!(discard_stale(&mut write, &mut events), 1);
    }

    #[tokio::test]
    async fn close_returns_connection_to_idle() {
        let wiring = comm::wire(4);
        let mut session = Session::new();

        session
            .handle_frame(init_frame(&[]), &wiring.transport)
            .await
            .unwrap();
        session
            .handle_frame(bytes(&Frame::new("close", Vec::new())), &wiring.transport)
            .await
            .unwrap();

        assert_eq!(session.phase(), Phase::Idle);
    }

    #[tokio::test]
    async fn unknown_method_is_distinct_from_malformed() {
        let wiring = comm::wire(4);
        let mut session = Session::new();
        let unknown = bytes(&Frame::new("fs:list", vec![Value::Nil]));

        assert!(
            session
                .handle_frame(unknown.clone(), &wiring.transport)
                .await
                .is_ok()
        );

        session
            .handle_frame(init_frame(&["mp"]), &wiring.transport)
            .await
            .unwrap();
        let after_init = session.handle_frame(unknown, &wiring.transport).await;
        assert!(matches!(
            after_init,
            Err(TransportError::Protocol(ProtocolError::UnknownMethod(ref m))) if m == "fs:list"
        ));

        let malformed = session
            .handle_frame(Bytes::from_static(&[0xa2, b'h', b'i']), &wiring.transport)
            .await;
        assert!(matches!(
            malformed,
            Err(TransportError::Protocol(ProtocolError::Malformed(_)))
        ));
    }
}
