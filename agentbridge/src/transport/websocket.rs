//! WebSocket client transport.
//!
//! Owns a reader loop and a writer task per session. Disconnects trigger a
//! bounded reconnect with linear backoff; sends issued in between land in
//! the outbound queue and flush, in order, once the session is re-established.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use super::{
    ConnectPreamble, Inbound, Listeners, MessageHandler, MessageTransport, OutboundQueue,
    TransportStatus, DEFAULT_QUEUE_CAPACITY,
};
use crate::errors::TransportError;
use crate::protocol::{decode, encode, Envelope};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Socket-style transport configuration.
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    pub url: String,
    pub auto_reconnect: bool,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_attempts: u32,
    pub queue_capacity: usize,
}

impl WebSocketConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auto_reconnect: true,
            reconnect_delay_ms: 1_000,
            max_reconnect_attempts: 5,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

struct WsShared {
    config: WebSocketConfig,
    status_tx: watch::Sender<TransportStatus>,
    queue: OutboundQueue,
    listeners: Listeners,
    preamble: RwLock<Option<ConnectPreamble>>,
    /// Present while a session is up; cleared on teardown.
    writer: Mutex<Option<mpsc::UnboundedSender<WsMessage>>>,
    /// Serializes the route decision in `send` against session
    /// establish/teardown, so the backlog flushes before any newer send.
    route_lock: Mutex<()>,
    shutdown: AtomicBool,
}

impl WsShared {
    /// Split the stream, start the writer task, send preamble + backlog, and
    /// mark the transport connected. Returns the read half.
    fn install_session(self: &Arc<Self>, stream: WsStream) -> futures::stream::SplitStream<WsStream> {
        let (mut sink, read) = stream.split();
        let (writer_tx, mut writer_rx) = mpsc::unbounded_channel::<WsMessage>();
        tokio::spawn(async move {
            while let Some(message) = writer_rx.recv().await {
                if sink.send(message).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        let _guard = self.route_lock.lock().expect("route lock poisoned");
        let preamble = self
            .preamble
            .read()
            .expect("preamble lock poisoned")
            .clone();
        if let Some(preamble) = preamble {
            for message in preamble() {
                forward(&writer_tx, &message);
            }
        }
        for message in self.queue.drain() {
            forward(&writer_tx, &message);
        }
        *self.writer.lock().expect("writer lock poisoned") = Some(writer_tx);
        let _ = self.status_tx.send(TransportStatus::Connected);
        read
    }

    fn teardown_session(&self) {
        let _guard = self.route_lock.lock().expect("route lock poisoned");
        *self.writer.lock().expect("writer lock poisoned") = None;
        let _ = self.status_tx.send(TransportStatus::Disconnected);
    }

    fn dispatch(&self, text: &str) {
        match decode(text) {
            Ok(message) => self.listeners.notify(Inbound::Envelope(message)),
            Err(error) => self.listeners.notify(Inbound::Invalid(error)),
        }
    }
}

fn forward(writer: &mpsc::UnboundedSender<WsMessage>, message: &Envelope) {
    match encode(message) {
        Ok(text) => {
            let _ = writer.send(WsMessage::Text(text));
        }
        Err(error) => warn!(message_id = %message.id, %error, "failed to encode message"),
    }
}

/// Read frames until the session drops, then reconnect within the configured
/// budget. Exits on shutdown, on `auto_reconnect = false`, or once the
/// budget is exhausted (status parks at `Failed`).
async fn run(shared: Arc<WsShared>, initial: WsStream) {
    let mut stream = initial;
    loop {
        let mut read = shared.install_session(stream);
        info!(url = %shared.config.url, "websocket session established");

        while let Some(frame) = read.next().await {
            match frame {
                Ok(WsMessage::Text(text)) => shared.dispatch(&text),
                Ok(WsMessage::Ping(payload)) => {
                    let writer = shared.writer.lock().expect("writer lock poisoned").clone();
                    if let Some(writer) = writer {
                        let _ = writer.send(WsMessage::Pong(payload));
                    }
                }
                Ok(WsMessage::Close(_)) => break,
                Ok(_) => {}
                Err(error) => {
                    warn!(%error, "websocket read failed");
                    break;
                }
            }
        }

        shared.teardown_session();
        if shared.shutdown.load(Ordering::SeqCst) || !shared.config.auto_reconnect {
            return;
        }

        let mut reconnected = None;
        for attempt in 1..=shared.config.max_reconnect_attempts {
            let _ = shared.status_tx.send(TransportStatus::Connecting);
            sleep(Duration::from_millis(
                shared.config.reconnect_delay_ms * u64::from(attempt),
            ))
            .await;
            if shared.shutdown.load(Ordering::SeqCst) {
                let _ = shared.status_tx.send(TransportStatus::Disconnected);
                return;
            }
            match connect_async(shared.config.url.as_str()).await {
                Ok((stream, _)) => {
                    reconnected = Some(stream);
                    break;
                }
                Err(error) => {
                    debug!(attempt, %error, "reconnect attempt failed");
                }
            }
        }

        match reconnected {
            Some(next) => stream = next,
            None => {
                warn!(
                    attempts = shared.config.max_reconnect_attempts,
                    "reconnect budget exhausted"
                );
                let _ = shared.status_tx.send(TransportStatus::Failed);
                return;
            }
        }
    }
}

#[derive(Clone)]
pub struct WebSocketTransport {
    shared: Arc<WsShared>,
}

impl WebSocketTransport {
    pub fn new(config: WebSocketConfig) -> Self {
        let (status_tx, _) = watch::channel(TransportStatus::Disconnected);
        let queue_capacity = config.queue_capacity;
        Self {
            shared: Arc::new(WsShared {
                config,
                status_tx,
                queue: OutboundQueue::new(queue_capacity),
                listeners: Listeners::default(),
                preamble: RwLock::new(None),
                writer: Mutex::new(None),
                route_lock: Mutex::new(()),
                shutdown: AtomicBool::new(false),
            }),
        }
    }
}

#[async_trait]
impl MessageTransport for WebSocketTransport {
    /// Dial the endpoint. The initial dial error is returned to the caller;
    /// `auto_reconnect` governs recovery of an established session only.
    async fn connect(&self) -> Result<(), TransportError> {
        let url = url::Url::parse(&self.shared.config.url)
            .map_err(|e| TransportError::InvalidEndpoint(e.to_string()))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(TransportError::InvalidEndpoint(format!(
                "unsupported scheme `{}`, expected ws:// or wss://",
                url.scheme()
            )));
        }

        self.shared.shutdown.store(false, Ordering::SeqCst);
        let _ = self.shared.status_tx.send(TransportStatus::Connecting);
        let (stream, _) = connect_async(self.shared.config.url.as_str()).await.map_err(|e| {
            let _ = self.shared.status_tx.send(TransportStatus::Disconnected);
            TransportError::Connection(e.to_string())
        })?;
        tokio::spawn(run(self.shared.clone(), stream));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.shared.shutdown.store(true, Ordering::SeqCst);
        self.shared.teardown_session();
        Ok(())
    }

    fn send(&self, message: Envelope) {
        let _guard = self.shared.route_lock.lock().expect("route lock poisoned");
        let writer = self.shared.writer.lock().expect("writer lock poisoned").clone();
        match writer {
            Some(writer) => match encode(&message) {
                Ok(text) => {
                    if writer.send(WsMessage::Text(text)).is_err() {
                        self.shared.queue.push(message);
                    }
                }
                Err(error) => warn!(message_id = %message.id, %error, "failed to encode message"),
            },
            None => self.shared.queue.push(message),
        }
    }

    fn on_message(&self, handler: MessageHandler) {
        self.shared.listeners.push(handler);
    }

    fn set_connect_preamble(&self, preamble: ConnectPreamble) {
        *self
            .shared
            .preamble
            .write()
            .expect("preamble lock poisoned") = Some(preamble);
    }

    fn status(&self) -> TransportStatus {
        *self.shared.status_tx.borrow()
    }

    fn subscribe_status(&self) -> watch::Receiver<TransportStatus> {
        self.shared.status_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MessageBody;

    #[tokio::test]
    async fn rejects_non_websocket_schemes() {
        let transport = WebSocketTransport::new(WebSocketConfig::new("http://localhost:9000"));
        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, TransportError::InvalidEndpoint(_)));
    }

    #[tokio::test]
    async fn send_while_disconnected_queues() {
        let transport = WebSocketTransport::new(WebSocketConfig::new("ws://localhost:9000"));
        transport.send(Envelope::new(MessageBody::SessionHeartbeat));
        transport.send(Envelope::new(MessageBody::SessionHeartbeat));
        assert_eq!(transport.shared.queue.len(), 2);
        assert_eq!(transport.status(), TransportStatus::Disconnected);
    }
}
