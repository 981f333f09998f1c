//! Bounded FIFO buffer for messages sent while disconnected.

use std::collections::VecDeque;
use std::sync::Mutex;

use tracing::warn;

use crate::protocol::Envelope;

/// Default bound on the disconnect queue. A prolonged outage must not grow
/// memory without bound; past the cap the oldest message is dropped so the
/// most recent traffic survives to reconnection.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug)]
pub struct OutboundQueue {
    capacity: usize,
    inner: Mutex<VecDeque<Envelope>>,
}

impl OutboundQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: Mutex::new(VecDeque::new()),
        }
    }

    pub fn push(&self, message: Envelope) {
        let mut queue = self.inner.lock().expect("queue lock poisoned");
        if queue.len() >= self.capacity {
            if let Some(dropped) = queue.pop_front() {
                warn!(
                    message_id = %dropped.id,
                    kind = dropped.body.kind(),
                    capacity = self.capacity,
                    "disconnect queue full, dropping oldest message"
                );
            }
        }
        queue.push_back(message);
    }

    /// Remove and return everything, in enqueue order.
    pub fn drain(&self) -> Vec<Envelope> {
        self.inner
            .lock()
            .expect("queue lock poisoned")
            .drain(..)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("queue lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::MessageBody;

    fn heartbeat() -> Envelope {
        Envelope::new(MessageBody::SessionHeartbeat)
    }

    #[test]
    fn drain_preserves_enqueue_order() {
        let queue = OutboundQueue::new(8);
        let messages: Vec<_> = (0..4).map(|_| heartbeat()).collect();
        for message in &messages {
            queue.push(message.clone());
        }
        let drained = queue.drain();
        let ids: Vec<_> = drained.iter().map(|m| m.id.as_str()).collect();
        let expected: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, expected);
        assert!(queue.is_empty());
    }

    #[test]
    fn overflow_drops_oldest_and_keeps_newest() {
        let queue = OutboundQueue::new(2);
        let first = heartbeat();
        let second = heartbeat();
        let third = heartbeat();
        queue.push(first.clone());
        queue.push(second.clone());
        queue.push(third.clone());

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].id, second.id);
        assert_eq!(drained[1].id, third.id);
    }
}
