use std::sync::{Arc, Mutex, PoisonError};

use futures::StreamExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};
use zbus::{Connection, Message, MessageStream, message::Type};

/// Fans every signal the connection receives into one replaceable sink.
///
/// The sink normally is the dispatch queue; a [`SenderHandshake`] diverts
/// it for the duration of a handshake. Signals are never awaited on, so a
/// slow consumer cannot stall the connection's reader; when the sink is
/// full the signal is dropped with a warning.
///
/// [`SenderHandshake`]: super::handshake::SenderHandshake
pub(crate) struct SignalRouter {
    sink: Arc<Mutex<mpsc::Sender<Message>>>,
    dispatch: mpsc::Sender<Message>,
}

impl SignalRouter {
    pub(crate) fn start(
        connection: &Connection,
        dispatch: mpsc::Sender<Message>,
        cancel: CancellationToken,
    ) -> Self {
        let sink = Arc::new(Mutex::new(dispatch.clone()));
        let stream = MessageStream::from(connection);
        tokio::spawn(route(stream, Arc::clone(&sink), cancel));

        Self { sink, dispatch }
    }

    pub(crate) fn divert(&self, to: mpsc::Sender<Message>) {
        *self.sink.lock().unwrap_or_else(PoisonError::into_inner) = to;
    }

    pub(crate) fn restore(&self) {
        self.divert(self.dispatch.clone());
    }

    /// Requeues a signal on the dispatch queue.
    pub(crate) fn redeliver(&self, message: Message) {
        if let Err(e) = self.dispatch.try_send(message) {
            warn!(error = %e, "Deferred signal dropped");
        }
    }
}

async fn route(
    mut stream: MessageStream,
    sink: Arc<Mutex<mpsc::Sender<Message>>>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = stream.next() => next,
        };

        let message = match next {
            Some(Ok(message)) => message,
            Some(Err(e)) => {
                warn!(error = %e, "Failed to read bus message");
                continue;
            }
            None => break,
        };

        if message.message_type() != Type::Signal {
            continue;
        }

        let target = sink.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match target.try_send(message) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("Signal queue full, dropping signal"),
            Err(TrySendError::Closed(_)) => trace!("Signal sink closed"),
        }
    }

    debug!("Signal router stopped");
}
