//! Contract for UI-framework adapters.
//!
//! Adapters own the rendering side: they call
//! [`AgentBridge::register_component`](crate::bridge::AgentBridge::register_component) /
//! [`unregister_component`](crate::bridge::AgentBridge::unregister_component)
//! as components mount and unmount, and the coordinator calls back through
//! this trait for agent-driven updates. No concrete adapter ships here; this
//! is the seam the framework glue plugs into.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::bridge::AgentBridge;
use crate::errors::{BridgeError, HandlerError};
use crate::execution::context::ExecutionContext;
use crate::registry::ComponentDefinition;

#[async_trait]
pub trait FrameworkAdapter: Send + Sync {
    /// Wire the adapter to a coordinator. Called once, before any component
    /// traffic.
    async fn initialize(&self, bridge: Arc<AgentBridge>) -> Result<(), BridgeError>;

    /// Apply agent-driven property changes to a live component.
    async fn update_component(
        &self,
        id: &str,
        properties: Value,
        context: &ExecutionContext,
    ) -> Result<Value, HandlerError>;

    /// Run a named action on a live component.
    async fn execute_component_action(
        &self,
        id: &str,
        action: &str,
        parameters: Value,
        context: &ExecutionContext,
    ) -> Result<Value, HandlerError>;

    /// Definitions of every component the adapter currently manages.
    fn component_definitions(&self) -> Vec<ComponentDefinition>;

    /// Release adapter-held resources. Does not unregister components; the
    /// embedder decides whether the registry outlives the adapter.
    async fn dispose(&self);
}
