//! Matching of command ids to their eventual results.
//!
//! The agent-facing side of a conversation registers each outgoing command id
//! here; when a result arrives its `correlationId` either completes exactly
//! one pending entry or the result is dropped. Abandoning an id (caller-side
//! timeout) makes a late result land silently, which the protocol must
//! tolerate.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::debug;

use super::messages::Envelope;

#[derive(Debug, Default)]
pub struct CorrelationTracker {
    pending: Mutex<HashMap<String, oneshot::Sender<Envelope>>>,
}

impl CorrelationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an outstanding command id and get the receiver its result
    /// will be delivered on.
    pub fn track(&self, command_id: impl Into<String>) -> oneshot::Receiver<Envelope> {
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .expect("correlation lock poisoned")
            .insert(command_id.into(), tx);
        rx
    }

    /// Route a response to its waiting command. Returns `false` when the
    /// response carries no correlation id or no matching command is
    /// outstanding; other in-flight entries are unaffected either way.
    pub fn complete(&self, response: Envelope) -> bool {
        let correlation_id = match response.correlation_id.clone() {
            Some(id) => id,
            None => {
                debug!(message_id = %response.id, "response without correlation id dropped");
                return false;
            }
        };
        let sender = self
            .pending
            .lock()
            .expect("correlation lock poisoned")
            .remove(&correlation_id);
        match sender {
            Some(sender) => sender.send(response).is_ok(),
            None => {
                debug!(%correlation_id, "no outstanding command for response, dropped");
                false
            }
        }
    }

    /// Give up on a command; a result arriving later is silently dropped.
    pub fn abandon(&self, command_id: &str) {
        self.pending
            .lock()
            .expect("correlation lock poisoned")
            .remove(command_id);
    }

    pub fn outstanding(&self) -> usize {
        self.pending.lock().expect("correlation lock poisoned").len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{MessageBody, ResultPayload};

    fn result_for(command: &Envelope) -> Envelope {
        Envelope::replying_to(
            command,
            MessageBody::FunctionResult(ResultPayload {
                success: true,
                data: None,
                error: None,
                meta: None,
            }),
        )
    }

    #[tokio::test]
    async fn result_reaches_its_waiting_command() {
        let tracker = CorrelationTracker::new();
        let command = Envelope::new(MessageBody::SessionHeartbeat);
        let rx = tracker.track(command.id.clone());

        assert!(tracker.complete(result_for(&command)));
        let delivered = rx.await.unwrap();
        assert_eq!(delivered.correlation_id.as_deref(), Some(command.id.as_str()));
        assert_eq!(tracker.outstanding(), 0);
    }

    #[tokio::test]
    async fn unknown_correlation_leaves_other_entries_intact() {
        let tracker = CorrelationTracker::new();
        let command = Envelope::new(MessageBody::SessionHeartbeat);
        let rx = tracker.track(command.id.clone());

        let stray = Envelope::new(MessageBody::SessionHeartbeat);
        assert!(!tracker.complete(result_for(&stray)));
        assert_eq!(tracker.outstanding(), 1);

        assert!(tracker.complete(result_for(&command)));
        assert!(rx.await.is_ok());
    }

    #[test]
    fn late_result_after_abandon_is_silently_dropped() {
        let tracker = CorrelationTracker::new();
        let command = Envelope::new(MessageBody::SessionHeartbeat);
        let _rx = tracker.track(command.id.clone());
        tracker.abandon(&command.id);

        assert!(!tracker.complete(result_for(&command)));
        assert_eq!(tracker.outstanding(), 0);
    }
}
