//! Coordinator behavior over an in-process transport: announcements,
//! command dispatch, correlation, and the log-and-drop paths.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::time::timeout;

use agentbridge::codes;
use agentbridge::protocol::ResultPayload;
use agentbridge::schema::{Property, Shape};
use agentbridge::transport::{pair, PairPeer};
use agentbridge::{
    handler, ActionDefinition, AgentBridge, BridgeConfig, BridgeState, CapabilityFilter,
    ComponentDefinition, ComponentHandlers, Envelope, FunctionDefinition, MessageBody,
};

async fn recv(peer: &mut PairPeer) -> Envelope {
    timeout(Duration::from_secs(2), peer.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("transport closed")
}

async fn connected_bridge() -> (Arc<AgentBridge>, PairPeer) {
    let bridge = AgentBridge::new(BridgeConfig::default());
    let (transport, peer) = pair();
    bridge.attach_transport(Arc::new(transport)).await.unwrap();
    (bridge, peer)
}

fn sum_function() -> (FunctionDefinition, agentbridge::registry::CapabilityHandler) {
    (
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
}

fn expect_result(body: &MessageBody) -> &ResultPayload {
    match body {
        MessageBody::FunctionResult(payload)
        | MessageBody::ComponentUpdateResult(payload)
        | MessageBody::ComponentActionResult(payload) => payload,
        other => panic!("expected a result message, got {}", other.kind()),
    }
}

#[tokio::test]
async fn empty_announcement_is_suppressed_until_first_nonempty() {
    let (bridge, mut peer) = connected_bridge().await;

    // Connecting with an empty catalogue announced nothing: the first
    // message the peer sees is the heartbeat echo it asked for.
    peer.inject(Envelope::new(MessageBody::SessionHeartbeat));
    let echo = recv(&mut peer).await;
    assert_eq!(echo.body.kind(), "session_heartbeat");
    assert_eq!(echo.session_id.as_deref(), Some(bridge.session_id()));

    let (definition, sum) = sum_function();
    bridge.register_function(definition, sum).await.unwrap();
    let announce = recv(&mut peer).await;
    match &announce.body {
        MessageBody::CapabilityRegister(snapshot) => {
            assert_eq!(snapshot.functions.len(), 1);
            assert_eq!(snapshot.functions[0].name, "sum");
        }
        other => panic!("expected capability_register, got {}", other.kind()),
    }

    // Tearing the capability down is a legitimate "now empty" announcement.
    bridge.unregister_function("sum").await;
    let empty = recv(&mut peer).await;
    match &empty.body {
        MessageBody::CapabilityUpdate(snapshot) => assert!(snapshot.is_empty()),
        other => panic!("expected capability_update, got {}", other.kind()),
    }

    // Unregistering again is a no-op and announces nothing.
    bridge.unregister_function("sum").await;
    peer.inject(Envelope::new(MessageBody::SessionHeartbeat));
    let next = recv(&mut peer).await;
    assert_eq!(next.body.kind(), "session_heartbeat");
}

#[tokio::test]
async fn call_function_results_are_correlated() {
    let (bridge, mut peer) = connected_bridge().await;
    let (definition, sum) = sum_function();
    bridge.register_function(definition, sum).await.unwrap();
    recv(&mut peer).await; // announcement

    let command = Envelope::new(MessageBody::CallFunction {
        name: "sum".into(),
        parameters: json!({"a": 2, "b": 3}),
    })
    .with_session("agent-session");
    peer.inject(command.clone());

    let reply = recv(&mut peer).await;
    assert_eq!(reply.correlation_id.as_deref(), Some(command.id.as_str()));
    assert_eq!(reply.session_id.as_deref(), Some(bridge.session_id()));
    let payload = expect_result(&reply.body);
    assert!(payload.success);
    assert_eq!(payload.data, Some(json!(5.0)));
    assert!(payload.meta.is_some());
}

#[tokio::test]
async fn unknown_action_yields_action_not_supported() {
    let (bridge, mut peer) = connected_bridge().await;
    bridge
        .register_component(
            ComponentDefinition::new("btn-1", "button", "a button", Shape::empty_object())
                .with_action(ActionDefinition::new("click", "press", Shape::empty_object())),
            ComponentHandlers::new().with_action(
                "click",
                handler(|_, _| async { Ok(json!({"clicked": true})) }),
            ),
        )
        .await
        .unwrap();
    recv(&mut peer).await; // announcement

    let command = Envelope::new(MessageBody::CallComponentAction {
        component_id: "btn-1".into(),
        action: "fly".into(),
        parameters: json!({}),
    });
    peer.inject(command.clone());

    let reply = recv(&mut peer).await;
    assert_eq!(reply.correlation_id.as_deref(), Some(command.id.as_str()));
    let payload = expect_result(&reply.body);
    assert!(!payload.success);
    assert_eq!(
        payload.error.as_ref().unwrap().code,
        codes::ACTION_NOT_SUPPORTED
    );
}

#[tokio::test]
async fn component_updates_validate_declared_properties() {
    let (bridge, mut peer) = connected_bridge().await;
    bridge
        .register_component(
            ComponentDefinition::new(
                "banner",
                "banner",
                "status banner",
                Shape::object([("text", Property::new(Shape::String).required())]),
            ),
            ComponentHandlers::new()
                .with_update(handler(|properties, _| async move { Ok(properties) })),
        )
        .await
        .unwrap();
    recv(&mut peer).await; // announcement

    let good = Envelope::new(MessageBody::UpdateComponent {
        component_id: "banner".into(),
        properties: json!({"text": "ready"}),
    });
    peer.inject(good.clone());
    let reply = recv(&mut peer).await;
    let payload = expect_result(&reply.body);
    assert!(payload.success);
    assert_eq!(payload.data, Some(json!({"text": "ready"})));

    let bad = Envelope::new(MessageBody::UpdateComponent {
        component_id: "banner".into(),
        properties: json!({"text": 9}),
    });
    peer.inject(bad.clone());
    let reply = recv(&mut peer).await;
    let payload = expect_result(&reply.body);
    assert_eq!(
        payload.error.as_ref().unwrap().code,
        codes::INVALID_PARAMETERS
    );
}

#[tokio::test]
async fn capability_queries_reply_without_side_effects() {
    let (bridge, mut peer) = connected_bridge().await;
    let (definition, sum) = sum_function();
    bridge
        .register_function(definition.with_tag("math"), sum)
        .await
        .unwrap();
    bridge
        .register_function(
            FunctionDefinition::new("noop", "does nothing", Shape::empty_object())
                .with_tag("misc"),
            handler(|_, _| async { Ok(json!(null)) }),
        )
        .await
        .unwrap();
    recv(&mut peer).await;
    recv(&mut peer).await; // two announcements

    let query = Envelope::new(MessageBody::QueryCapabilities {
        filter: CapabilityFilter {
            tags: vec!["math".into()],
            ..Default::default()
        },
    });
    peer.inject(query.clone());

    let reply = recv(&mut peer).await;
    assert_eq!(reply.correlation_id.as_deref(), Some(query.id.as_str()));
    match &reply.body {
        MessageBody::CapabilitiesResult(snapshot) => {
            assert_eq!(snapshot.functions.len(), 1);
            assert_eq!(snapshot.functions[0].name, "sum");
        }
        other => panic!("expected capabilities_result, got {}", other.kind()),
    }

    // No announcement followed: the query had no side effects.
    assert!(peer.try_recv().is_none());
}

#[tokio::test]
async fn session_connect_triggers_full_reannouncement() {
    let (bridge, mut peer) = connected_bridge().await;
    let (definition, sum) = sum_function();
    bridge.register_function(definition, sum).await.unwrap();
    recv(&mut peer).await; // initial announcement

    peer.inject(Envelope::new(MessageBody::SessionConnect).with_session("agent-2"));
    let announce = recv(&mut peer).await;
    assert!(matches!(&announce.body, MessageBody::CapabilityRegister(s) if s.functions.len() == 1));
}

#[tokio::test]
async fn unrecognized_and_malformed_inbound_are_never_fatal() {
    let (bridge, mut peer) = connected_bridge().await;

    // Unknown kind: logged and ignored.
    peer.inject_raw(r#"{"type":"teleport","id":"x-1","timestamp":"2026-01-01T00:00:00Z"}"#);

    // Outbound-only kind arriving inbound: ignored.
    peer.inject(Envelope::new(MessageBody::FunctionResult(ResultPayload {
        success: true,
        data: None,
        error: None,
        meta: None,
    })));

    // Malformed payload with a recoverable id: answered with a correlated
    // protocol error.
    peer.inject_raw(r#"{"type":"call_function","id":"m-1"}"#);

    let reply = recv(&mut peer).await;
    assert_eq!(reply.correlation_id.as_deref(), Some("m-1"));
    match &reply.body {
        MessageBody::Error { error } => {
            assert_eq!(error.code, codes::PROCESSING_ERROR);
            // Details stay local unless detailed errors are enabled.
            assert!(error.details.is_none());
        }
        other => panic!("expected error message, got {}", other.kind()),
    }

    // The message loop survived all of it.
    peer.inject(Envelope::new(MessageBody::SessionHeartbeat));
    let echo = recv(&mut peer).await;
    assert_eq!(echo.body.kind(), "session_heartbeat");
    assert_eq!(bridge.state(), BridgeState::Connected);
}

#[tokio::test]
async fn events_are_unsolicited_and_uncorrelated() {
    let (bridge, mut peer) = connected_bridge().await;
    bridge
        .emit_event("cart.changed", json!({"items": 2}))
        .unwrap();

    let event = recv(&mut peer).await;
    assert!(event.correlation_id.is_none());
    match &event.body {
        MessageBody::Event { name, data } => {
            assert_eq!(name, "cart.changed");
            assert_eq!(data["items"], 2);
        }
        other => panic!("expected event, got {}", other.kind()),
    }
}

#[tokio::test]
async fn disposal_stops_registration_but_not_the_registry_owner() {
    let registry = Arc::new(tokio::sync::RwLock::new(
        agentbridge::CapabilityRegistry::new(),
    ));
    let bridge = AgentBridge::with_registry(BridgeConfig::default(), registry.clone());
    let (transport, mut peer) = pair();
    bridge.attach_transport(Arc::new(transport)).await.unwrap();

    let (definition, sum) = sum_function();
    bridge.register_function(definition, sum).await.unwrap();
    recv(&mut peer).await;

    bridge.dispose().await;
    assert_eq!(bridge.state(), BridgeState::Disposed);

    let (definition, sum) = sum_function();
    let err = bridge
        .register_function(definition.with_tag("late"), sum)
        .await
        .unwrap_err();
    assert!(matches!(err, agentbridge::BridgeError::Disposed));

    // Disposal tears down the coordinator, not the registry contents.
    assert_eq!(registry.read().await.snapshot().functions.len(), 1);
}
