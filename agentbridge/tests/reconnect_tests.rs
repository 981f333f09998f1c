//! Disconnect queueing, FIFO flush on reconnect, and the re-announcement
//! that precedes queued traffic on a fresh session.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

use agentbridge::schema::{Property, Shape};
use agentbridge::transport::{pair, PairPeer};
use agentbridge::{
    handler, AgentBridge, BridgeConfig, BridgeState, Envelope, FunctionDefinition, MessageBody,
};

async fn recv(peer: &mut PairPeer) -> Envelope {
    timeout(Duration::from_secs(2), peer.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("transport closed")
}

async fn wait_until(description: &str, condition: impl Fn() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time: {}", description);
}

#[tokio::test]
async fn queued_results_flush_in_order_behind_a_full_reannouncement() {
    let bridge = AgentBridge::new(BridgeConfig::default());
    let (transport, mut peer) = pair();
    let transport_handle = transport.clone();
    bridge.attach_transport(Arc::new(transport)).await.unwrap();

    bridge
        .register_function(
            FunctionDefinition::new(
                "sum",
                "Add two numbers",
                Shape::object([
                    ("a", Property::new(Shape::Number).required()),
                    ("b", Property::new(Shape::Number).required()),
                ]),
            ),
            handler(|params, _| async move {
                let a = params["a"].as_f64().unwrap_or(0.0);
                let b = params["b"].as_f64().unwrap_or(0.0);
                Ok(json!(a + b))
            }),
        )
        .await
        .unwrap();
    let announce = recv(&mut peer).await;
    assert_eq!(announce.body.kind(), "capability_register");

    // Outbound link goes down; the inbound path keeps delivering commands.
    peer.sever();
    {
        let bridge = bridge.clone();
        wait_until("bridge observed the disconnect", move || {
            bridge.state() == BridgeState::Disconnected
        })
        .await;
    }

    let first = Envelope::new(MessageBody::CallFunction {
        name: "sum".into(),
        parameters: json!({"a": 1, "b": 1}),
    });
    let second = Envelope::new(MessageBody::CallFunction {
        name: "sum".into(),
        parameters: json!({"a": 2, "b": 2}),
    });
    peer.inject(first.clone());
    peer.inject(second.clone());

    // Both results are computed and parked in the disconnect queue.
    {
        let transport_handle = transport_handle.clone();
        wait_until("both results queued", move || transport_handle.queued() == 2).await;
    }
    assert!(peer.try_recv().is_none());

    peer.restore();
    {
        let bridge = bridge.clone();
        wait_until("bridge observed the reconnect", move || {
            bridge.state() == BridgeState::Connected
        })
        .await;
    }

    // A fresh session starts with the full catalogue, ahead of the backlog.
    let reannounce = recv(&mut peer).await;
    assert_eq!(reannounce.body.kind(), "capability_register");

    // Queued results arrive exactly once, in enqueue order.
    let reply_one = recv(&mut peer).await;
    assert_eq!(reply_one.correlation_id.as_deref(), Some(first.id.as_str()));
    match &reply_one.body {
        MessageBody::FunctionResult(payload) => assert_eq!(payload.data, Some(json!(2.0))),
        other => panic!("expected function_result, got {}", other.kind()),
    }

    let reply_two = recv(&mut peer).await;
    assert_eq!(reply_two.correlation_id.as_deref(), Some(second.id.as_str()));
    match &reply_two.body {
        MessageBody::FunctionResult(payload) => assert_eq!(payload.data, Some(json!(4.0))),
        other => panic!("expected function_result, got {}", other.kind()),
    }

    assert!(peer.try_recv().is_none());
    assert_eq!(transport_handle.queued(), 0);
}

#[tokio::test]
async fn sends_while_disconnected_never_error_and_never_block() {
    let bridge = AgentBridge::new(BridgeConfig::default());
    let (transport, peer) = pair();
    let transport_handle = transport.clone();
    bridge.attach_transport(Arc::new(transport)).await.unwrap();
    peer.sever();

    // Events fired into a severed link queue instead of failing.
    for i in 0..3 {
        bridge.emit_event("tick", json!({ "n": i })).unwrap();
    }
    assert_eq!(transport_handle.queued(), 3);
}

#[tokio::test]
async fn reconnect_reannouncement_waits_for_a_nonempty_catalogue() {
    let bridge = AgentBridge::new(BridgeConfig::default());
    let (transport, mut peer) = pair();
    bridge.attach_transport(Arc::new(transport)).await.unwrap();

    // Nothing registered: neither the first connect nor a reconnect
    // produces an announcement.
    peer.sever();
    peer.restore();
    peer.inject(Envelope::new(MessageBody::SessionHeartbeat));
    let echo = recv(&mut peer).await;
    assert_eq!(echo.body.kind(), "session_heartbeat");
}
