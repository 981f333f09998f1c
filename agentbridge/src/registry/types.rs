//! Capability definitions, handler types, and stored implementations.

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::HandlerError;
use crate::execution::context::ExecutionContext;
use crate::schema::Shape;

/// Authorization level a capability demands from its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthLevel {
    #[default]
    Public,
    User,
    Admin,
}

/// Async handler invoked with validated parameters and the execution context.
///
/// The registry stores handlers opaquely; nothing in the bridge inspects
/// their internals.
pub type CapabilityHandler =
    Arc<dyn Fn(Value, ExecutionContext) -> BoxFuture<'static, Result<Value, HandlerError>> + Send + Sync>;

/// Wrap an async closure into a [`CapabilityHandler`].
pub fn handler<F, Fut>(f: F) -> CapabilityHandler
where
    F: Fn(Value, ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    Arc::new(move |params, context| Box::pin(f(params, context)))
}

/// Declared surface of a callable function.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Shape,
    #[serde(default)]
    pub auth_level: AuthLevel,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl FunctionDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Shape) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            auth_level: AuthLevel::Public,
            tags: Vec::new(),
        }
    }

    pub fn with_auth_level(mut self, auth_level: AuthLevel) -> Self {
        self.auth_level = auth_level;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

/// A named action a component exposes, with its own parameter shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Shape,
}

impl ActionDefinition {
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Shape) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// Declared surface of a UI component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentDefinition {
    pub id: String,
    pub component_type: String,
    pub description: String,
    pub properties: Shape,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub actions: IndexMap<String, ActionDefinition>,
    /// Hierarchical locator, `/`-separated (e.g. `dashboard/header/title`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub auth_level: AuthLevel,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ComponentDefinition {
    pub fn new(
        id: impl Into<String>,
        component_type: impl Into<String>,
        description: impl Into<String>,
        properties: Shape,
    ) -> Self {
        Self {
            id: id.into(),
            component_type: component_type.into(),
            description: description.into(),
            properties,
            actions: IndexMap::new(),
            path: None,
            auth_level: AuthLevel::Public,
            tags: Vec::new(),
        }
    }

    pub fn with_action(mut self, action: ActionDefinition) -> Self {
        self.actions.insert(action.name.clone(), action);
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_auth_level(mut self, auth_level: AuthLevel) -> Self {
        self.auth_level = auth_level;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Segment-aware path prefix match: `dashboard/header` matches itself and
    /// anything below it, but not `dashboard/headerline`.
    pub fn matches_path_prefix(&self, prefix: &str) -> bool {
        match &self.path {
            Some(path) => path == prefix || path.starts_with(&format!("{}/", prefix)),
            None => false,
        }
    }
}

/// A registered function: definition plus its handler.
#[derive(Clone)]
pub struct FunctionImplementation {
    pub definition: FunctionDefinition,
    pub handler: CapabilityHandler,
}

impl std::fmt::Debug for FunctionImplementation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionImplementation")
            .field("definition", &self.definition)
            .finish()
    }
}

/// A registered component: definition, optional update handler, and one
/// handler per declared action.
#[derive(Clone)]
pub struct ComponentImplementation {
    pub definition: ComponentDefinition,
    pub update_handler: Option<CapabilityHandler>,
    pub action_handlers: IndexMap<String, CapabilityHandler>,
}

impl std::fmt::Debug for ComponentImplementation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentImplementation")
            .field("definition", &self.definition)
            .field("has_update_handler", &self.update_handler.is_some())
            .field(
                "action_handlers",
                &self.action_handlers.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}
