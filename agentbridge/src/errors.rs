//! Error types for the bridge.
//!
//! Two error surfaces exist and must not be conflated: `BridgeError` is the
//! synchronous, programmer-facing surface (duplicate registration, invalid
//! definitions, transport configuration), while the string codes in [`codes`]
//! travel inside result envelopes and protocol `error` messages. Runtime
//! faults triggered by an agent never surface as `BridgeError`.

use serde_json::Value;
use thiserror::Error;

/// Wire-level error codes carried in result envelopes and `error` messages.
///
/// The taxonomy is extensible by string code; these constants cover every
/// code the bridge itself produces.
pub mod codes {
    pub const CAPABILITY_NOT_FOUND: &str = "CAPABILITY_NOT_FOUND";
    pub const INVALID_PARAMETERS: &str = "INVALID_PARAMETERS";
    pub const UNAUTHORIZED: &str = "UNAUTHORIZED";
    pub const FORBIDDEN: &str = "FORBIDDEN";
    pub const EXECUTION_ERROR: &str = "EXECUTION_ERROR";
    pub const COMPONENT_NOT_FOUND: &str = "COMPONENT_NOT_FOUND";
    pub const UPDATE_NOT_SUPPORTED: &str = "UPDATE_NOT_SUPPORTED";
    pub const ACTION_NOT_SUPPORTED: &str = "ACTION_NOT_SUPPORTED";
    pub const PROCESSING_ERROR: &str = "PROCESSING_ERROR";
}

/// Errors raised synchronously by registration and wiring calls.
///
/// These represent a misconfigured application rather than a runtime
/// condition, so they are allowed to propagate to the embedder.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("capability already registered: {0}")]
    DuplicateCapability(String),
    #[error("invalid capability definition: {0}")]
    InvalidDefinition(String),
    #[error("bridge has been disposed")]
    Disposed,
    #[error("no transport attached")]
    NoTransport,
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Errors from concrete transport implementations.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("transport is closed")]
    Closed,
}

/// Failure returned by a capability handler.
///
/// Handlers report faults as values; the execution engine converts them into
/// `EXECUTION_ERROR` envelopes and never lets them propagate further.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HandlerError {
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(message: impl Into<String>, details: Value) -> Self {
        Self {
            message: message.into(),
            details: Some(details),
        }
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}
