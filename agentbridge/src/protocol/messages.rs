//! Wire envelope and the enumerated message kinds.
//!
//! Every message shares the `id`/`timestamp`/`sessionId`/`correlationId`
//! envelope; the kind-specific fields are flattened next to them under a
//! `type` tag, so the wire shape stays a single flat JSON object.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::execution::envelope::{EnvelopeError, ExecutionMeta, ResultEnvelope};
use crate::registry::{CapabilityFilter, CatalogSnapshot};

/// Kind-agnostic message envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    /// Unique per message.
    pub id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// When present, equals the `id` of the message being answered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(flatten)]
    pub body: MessageBody,
}

impl Envelope {
    pub fn new(body: MessageBody) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            session_id: None,
            correlation_id: None,
            body,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// A response correlated to `request`.
    pub fn replying_to(request: &Envelope, body: MessageBody) -> Self {
        let mut envelope = Self::new(body);
        envelope.correlation_id = Some(request.id.clone());
        envelope
    }
}

/// Result fields shared by the three command-result kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ExecutionMeta>,
}

impl From<ResultEnvelope> for ResultPayload {
    fn from(envelope: ResultEnvelope) -> Self {
        Self {
            success: envelope.success,
            data: envelope.data,
            error: envelope.error,
            meta: Some(envelope.meta),
        }
    }
}

/// The enumerated message kinds.
///
/// Announcements and results flow app → agent, commands agent → app, session
/// messages either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    /// First full catalogue announcement of a session.
    CapabilityRegister(CatalogSnapshot),
    /// Catalogue snapshot sent after a registration change.
    CapabilityUpdate(CatalogSnapshot),
    #[serde(rename_all = "camelCase")]
    CallFunction {
        name: String,
        #[serde(default)]
        parameters: Value,
    },
    #[serde(rename_all = "camelCase")]
    UpdateComponent {
        component_id: String,
        #[serde(default)]
        properties: Value,
    },
    #[serde(rename_all = "camelCase")]
    CallComponentAction {
        component_id: String,
        action: String,
        #[serde(default)]
        parameters: Value,
    },
    #[serde(rename_all = "camelCase")]
    QueryCapabilities {
        #[serde(default)]
        filter: CapabilityFilter,
    },
    FunctionResult(ResultPayload),
    ComponentUpdateResult(ResultPayload),
    ComponentActionResult(ResultPayload),
    CapabilitiesResult(CatalogSnapshot),
    /// Unsolicited state-change notification.
    Event {
        name: String,
        #[serde(default)]
        data: Value,
    },
    SessionConnect,
    #[serde(rename_all = "camelCase")]
    SessionDisconnect {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    SessionHeartbeat,
    Error {
        error: EnvelopeError,
    },
}

/// Every `type` tag this protocol version understands, in declaration order.
pub const KNOWN_KINDS: &[&str] = &[
    "capability_register",
    "capability_update",
    "call_function",
    "update_component",
    "call_component_action",
    "query_capabilities",
    "function_result",
    "component_update_result",
    "component_action_result",
    "capabilities_result",
    "event",
    "session_connect",
    "session_disconnect",
    "session_heartbeat",
    "error",
];

impl MessageBody {
    /// The wire `type` tag for this kind.
    pub fn kind(&self) -> &'static str {
        match self {
            MessageBody::CapabilityRegister(_) => "capability_register",
            MessageBody::CapabilityUpdate(_) => "capability_update",
            MessageBody::CallFunction { .. } => "call_function",
            MessageBody::UpdateComponent { .. } => "update_component",
            MessageBody::CallComponentAction { .. } => "call_component_action",
            MessageBody::QueryCapabilities { .. } => "query_capabilities",
            MessageBody::FunctionResult(_) => "function_result",
            MessageBody::ComponentUpdateResult(_) => "component_update_result",
            MessageBody::ComponentActionResult(_) => "component_action_result",
            MessageBody::CapabilitiesResult(_) => "capabilities_result",
            MessageBody::Event { .. } => "event",
            MessageBody::SessionConnect => "session_connect",
            MessageBody::SessionDisconnect { .. } => "session_disconnect",
            MessageBody::SessionHeartbeat => "session_heartbeat",
            MessageBody::Error { .. } => "error",
        }
    }
}

/// Why an inbound payload could not be turned into an [`Envelope`].
///
/// The original message id is preserved whenever it is recoverable so the
/// coordinator can send a best-effort correlated `error` reply.
#[derive(Debug, Clone, Error)]
pub enum DecodeError {
    #[error("unrecognized message kind `{kind}`")]
    UnknownKind { kind: String, id: Option<String> },
    #[error("malformed message: {reason}")]
    Malformed { id: Option<String>, reason: String },
}

impl DecodeError {
    pub fn message_id(&self) -> Option<&str> {
        match self {
            DecodeError::UnknownKind { id, .. } | DecodeError::Malformed { id, .. } => id.as_deref(),
        }
    }
}

pub fn encode(envelope: &Envelope) -> Result<String, serde_json::Error> {
    serde_json::to_string(envelope)
}

/// Decode a wire payload, distinguishing "kind this protocol version does not
/// know" (ignorable) from "malformed" (answerable with `PROCESSING_ERROR`).
pub fn decode(text: &str) -> Result<Envelope, DecodeError> {
    let value: Value = serde_json::from_str(text).map_err(|e| DecodeError::Malformed {
        id: None,
        reason: e.to_string(),
    })?;
    let id = value.get("id").and_then(|v| v.as_str()).map(String::from);
    if let Some(kind) = value.get("type").and_then(|v| v.as_str()) {
        if !KNOWN_KINDS.contains(&kind) {
            return Err(DecodeError::UnknownKind {
                kind: kind.to_string(),
                id,
            });
        }
    }
    serde_json::from_value(value).map_err(|e| DecodeError::Malformed {
        id,
        reason: e.to_string(),
    })
}
