//! The uniform result envelope every execution path returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Timing metadata, populated on every envelope regardless of outcome.
///
/// `duration_ms` covers handler invocation only; validation and
/// authorization time is excluded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMeta {
    pub duration_ms: u64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl ExecutionMeta {
    /// Meta for an outcome decided before the handler ran.
    pub fn unstarted() -> Self {
        let now = Utc::now();
        Self {
            duration_ms: 0,
            started_at: now,
            completed_at: now,
        }
    }
}

/// Structured error carried in envelopes and protocol `error` messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl EnvelopeError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Option<Value>) -> Self {
        self.details = details;
        self
    }
}

/// `{success, data | error, meta}`, always fully populated, so callers
/// never have to distinguish "no result" from "empty result".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,
    pub meta: ExecutionMeta,
}

impl ResultEnvelope {
    pub fn ok(data: Value, meta: ExecutionMeta) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            meta,
        }
    }

    pub fn err(error: EnvelopeError, meta: ExecutionMeta) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            meta,
        }
    }

    /// Error envelope for an outcome decided before the handler ran.
    pub fn rejected(error: EnvelopeError) -> Self {
        Self::err(error, ExecutionMeta::unstarted())
    }
}
