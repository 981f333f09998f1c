//! Execution engine and the types that travel through it.

pub mod context;
pub mod engine;
pub mod envelope;

pub use context::{AgentInfo, ApplicationInfo, ContextSeed, ExecutionContext, RequestInfo, UserInfo};
pub use engine::ExecutionEngine;
pub use envelope::{EnvelopeError, ExecutionMeta, ResultEnvelope};
