//! In-process transport: two linked endpoints over channels.
//!
//! Used by tests and embedders that host both sides in one process. The peer
//! handle can sever and restore the link, which makes the disconnect-queue
//! and reconnect-ordering properties observable without a network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use super::{
    ConnectPreamble, Inbound, Listeners, MessageHandler, MessageTransport, OutboundQueue,
    TransportStatus, DEFAULT_QUEUE_CAPACITY,
};
use crate::errors::TransportError;
use crate::protocol::{decode, Envelope};

struct PairShared {
    status_tx: watch::Sender<TransportStatus>,
    queue: OutboundQueue,
    listeners: Listeners,
    preamble: RwLock<Option<ConnectPreamble>>,
    outbound_tx: mpsc::UnboundedSender<Envelope>,
    connected: AtomicBool,
    /// Serializes the route decision in `send` against (re)connect flushes,
    /// so queued messages flush strictly before any newer send.
    route_lock: Mutex<()>,
}

impl PairShared {
    fn deliver(&self, message: Envelope) {
        // The peer half may be dropped in tests; sending is best-effort.
        let _ = self.outbound_tx.send(message);
    }

    fn establish(&self) {
        let _guard = self.route_lock.lock().expect("route lock poisoned");
        let preamble = self
            .preamble
            .read()
            .expect("preamble lock poisoned")
            .clone();
        if let Some(preamble) = preamble {
            for message in preamble() {
                self.deliver(message);
            }
        }
        for message in self.queue.drain() {
            self.deliver(message);
        }
        self.connected.store(true, Ordering::SeqCst);
        let _ = self.status_tx.send(TransportStatus::Connected);
    }

    fn sever(&self) {
        let _guard = self.route_lock.lock().expect("route lock poisoned");
        self.connected.store(false, Ordering::SeqCst);
        let _ = self.status_tx.send(TransportStatus::Disconnected);
    }
}

/// The application-side endpoint, implementing [`MessageTransport`].
#[derive(Clone)]
pub struct PairTransport {
    shared: Arc<PairShared>,
}

/// The agent-side test/embedder handle.
pub struct PairPeer {
    outbound_rx: mpsc::UnboundedReceiver<Envelope>,
    shared: Arc<PairShared>,
}

/// Create a linked transport/peer pair. The transport starts disconnected;
/// `connect` (or [`PairPeer::restore`]) brings the link up.
pub fn pair() -> (PairTransport, PairPeer) {
    pair_with_capacity(DEFAULT_QUEUE_CAPACITY)
}

pub fn pair_with_capacity(queue_capacity: usize) -> (PairTransport, PairPeer) {
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    let (status_tx, _) = watch::channel(TransportStatus::Disconnected);
    let shared = Arc::new(PairShared {
        status_tx,
        queue: OutboundQueue::new(queue_capacity),
        listeners: Listeners::default(),
        preamble: RwLock::new(None),
        outbound_tx,
        connected: AtomicBool::new(false),
        route_lock: Mutex::new(()),
    });
    (
        PairTransport {
            shared: shared.clone(),
        },
        PairPeer {
            outbound_rx,
            shared,
        },
    )
}

impl PairTransport {
    /// Number of messages waiting for the link to come back.
    pub fn queued(&self) -> usize {
        self.shared.queue.len()
    }
}

#[async_trait]
impl MessageTransport for PairTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.shared.establish();
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.shared.sever();
        Ok(())
    }

    fn send(&self, message: Envelope) {
        let _guard = self.shared.route_lock.lock().expect("route lock poisoned");
        if self.shared.connected.load(Ordering::SeqCst) {
            self.shared.deliver(message);
        } else {
            self.shared.queue.push(message);
        }
    }

    fn on_message(&self, handler: MessageHandler) {
        self.shared.listeners.push(handler);
    }

    fn set_connect_preamble(&self, preamble: ConnectPreamble) {
        *self.shared.preamble.write().expect("preamble lock poisoned") = Some(preamble);
    }

    fn status(&self) -> TransportStatus {
        *self.shared.status_tx.borrow()
    }

    fn subscribe_status(&self) -> watch::Receiver<TransportStatus> {
        self.shared.status_tx.subscribe()
    }
}

impl PairPeer {
    /// Next message the transport delivered, if any is pending.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.outbound_rx.try_recv().ok()
    }

    /// Await the next delivered message.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.outbound_rx.recv().await
    }

    /// Deliver an already-decoded envelope to the transport's listeners.
    pub fn inject(&self, message: Envelope) {
        self.shared.listeners.notify(Inbound::Envelope(message));
    }

    /// Deliver a raw payload, exercising the wire decode path.
    pub fn inject_raw(&self, text: &str) {
        match decode(text) {
            Ok(message) => self.shared.listeners.notify(Inbound::Envelope(message)),
            Err(error) => self.shared.listeners.notify(Inbound::Invalid(error)),
        }
    }

    /// Simulate a connection loss: subsequent sends queue.
    pub fn sever(&self) {
        self.shared.sever();
    }

    /// Simulate a reconnect: preamble, then queued backlog in FIFO order.
    pub fn restore(&self) {
        self.shared.establish();
    }
}
