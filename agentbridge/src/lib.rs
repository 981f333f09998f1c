// AgentBridge Library
// Capability registry, execution engine, and message transport bridge that
// lets an external AI agent discover and invoke functions and UI components
// exposed by a running application.

pub mod adapter;
pub mod bridge;
pub mod config;
pub mod errors;
pub mod execution;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod transport;

pub use adapter::FrameworkAdapter;
pub use bridge::{default_bridge, init_default, AgentBridge, BridgeState, ComponentHandlers};
pub use config::{BridgeConfig, HeartbeatConfig};
pub use errors::{codes, BridgeError, HandlerError, TransportError};
pub use execution::{
    AgentInfo, ApplicationInfo, ContextSeed, EnvelopeError, ExecutionContext, ExecutionEngine,
    ExecutionMeta, ResultEnvelope, UserInfo,
};
pub use protocol::{ChannelKind, ChannelSet, CorrelationTracker, Envelope, MessageBody};
pub use registry::{
    handler, ActionDefinition, AuthLevel, CapabilityFilter, CapabilityRegistry, CatalogSnapshot,
    ComponentDefinition, FunctionDefinition,
};
pub use transport::{MessageTransport, TransportStatus};
#[cfg(feature = "websocket")]
pub use transport::{WebSocketConfig, WebSocketTransport};
