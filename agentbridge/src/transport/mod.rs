//! Transport abstraction: the minimal contract any concrete channel
//! (socket-based or pub/sub-channel-based) must satisfy.
//!
//! `send` is fire-and-forget: while the transport is not connected it
//! appends to a bounded FIFO queue and returns immediately. On every
//! (re)connect the transport first sends the connect preamble (the
//! coordinator's capability announcement), then flushes the queued backlog
//! in enqueue order, then resumes normal sends.

pub mod pair;
pub mod queue;
#[cfg(feature = "websocket")]
pub mod websocket;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::errors::TransportError;
use crate::protocol::{DecodeError, Envelope};

pub use pair::{pair, PairPeer, PairTransport};
pub use queue::{OutboundQueue, DEFAULT_QUEUE_CAPACITY};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConfig, WebSocketTransport};

/// Observable connection state.
///
/// `Failed` means the reconnect budget is exhausted; the transport stays
/// there rather than erroring, and the embedder decides what that means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// What a transport hands to message listeners: a decoded envelope, or the
/// reason a payload could not become one.
#[derive(Debug, Clone)]
pub enum Inbound {
    Envelope(Envelope),
    Invalid(DecodeError),
}

pub type MessageHandler = Arc<dyn Fn(Inbound) + Send + Sync>;

/// Hook returning messages to send ahead of the queued backlog on every
/// (re)connect.
pub type ConnectPreamble = Arc<dyn Fn() -> Vec<Envelope> + Send + Sync>;

#[async_trait]
pub trait MessageTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Fire-and-forget send. Never blocks and never fails merely because the
    /// transport is disconnected; the message is queued instead.
    fn send(&self, message: Envelope);

    /// Register a message listener. Each listener sees every inbound payload
    /// exactly once, in arrival order.
    fn on_message(&self, handler: MessageHandler);

    fn set_connect_preamble(&self, preamble: ConnectPreamble);

    fn status(&self) -> TransportStatus;
    fn subscribe_status(&self) -> watch::Receiver<TransportStatus>;
}

/// Listener list shared by the concrete transports.
#[derive(Default)]
pub(crate) struct Listeners {
    inner: std::sync::RwLock<Vec<MessageHandler>>,
}

impl Listeners {
    pub(crate) fn push(&self, handler: MessageHandler) {
        self.inner
            .write()
            .expect("listener lock poisoned")
            .push(handler);
    }

    pub(crate) fn notify(&self, inbound: Inbound) {
        let handlers = self
            .inner
            .read()
            .expect("listener lock poisoned")
            .clone();
        for handler in handlers {
            handler(inbound.clone());
        }
    }
}
