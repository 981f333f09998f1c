//! Capability registry: two symmetric stores behind one facade.
//!
//! Functions are keyed by name, components by id; the two namespaces are
//! independent. `list`/`snapshot` iterate in registration order so repeated
//! capability announcements stay byte-stable for an unchanged catalogue.

pub mod components;
pub mod functions;
pub mod types;

use serde::{Deserialize, Serialize};

pub use components::ComponentRegistry;
pub use functions::FunctionRegistry;
pub use types::{
    handler, ActionDefinition, AuthLevel, CapabilityHandler, ComponentDefinition,
    ComponentImplementation, FunctionDefinition, FunctionImplementation,
};

use crate::errors::BridgeError;

/// Which kind of capability a query targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    Function,
    Component,
}

/// Query filter. All populated criteria are ANDed; the tag criterion matches
/// when the capability carries *any* of the listed tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CapabilityFilter {
    pub kind: Option<CapabilityKind>,
    /// Exact component type (components only).
    pub component_type: Option<String>,
    pub auth_level: Option<AuthLevel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Segment-aware path prefix (components only).
    pub path_prefix: Option<String>,
}

impl CapabilityFilter {
    fn tags_match(&self, tags: &[String]) -> bool {
        self.tags.is_empty() || self.tags.iter().any(|t| tags.contains(t))
    }

    fn matches_function(&self, definition: &FunctionDefinition) -> bool {
        if matches!(self.kind, Some(CapabilityKind::Component)) {
            return false;
        }
        // Component-only criteria exclude functions entirely.
        if self.component_type.is_some() || self.path_prefix.is_some() {
            return false;
        }
        if let Some(level) = self.auth_level {
            if definition.auth_level != level {
                return false;
            }
        }
        self.tags_match(&definition.tags)
    }

    fn matches_component(&self, definition: &ComponentDefinition) -> bool {
        if matches!(self.kind, Some(CapabilityKind::Function)) {
            return false;
        }
        if let Some(component_type) = &self.component_type {
            if &definition.component_type != component_type {
                return false;
            }
        }
        if let Some(level) = self.auth_level {
            if definition.auth_level != level {
                return false;
            }
        }
        if let Some(prefix) = &self.path_prefix {
            if !definition.matches_path_prefix(prefix) {
                return false;
            }
        }
        self.tags_match(&definition.tags)
    }
}

/// Serializable snapshot of the catalogue, in registration order. This is
/// exactly what capability announcements and query results carry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    pub functions: Vec<FunctionDefinition>,
    pub components: Vec<ComponentDefinition>,
}

impl CatalogSnapshot {
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.components.is_empty()
    }
}

/// The registry facade the coordinator owns.
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    pub functions: FunctionRegistry,
    pub components: ComponentRegistry,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_function(
        &mut self,
        implementation: FunctionImplementation,
    ) -> Result<(), BridgeError> {
        self.functions.register(implementation)
    }

    pub fn register_component(
        &mut self,
        implementation: ComponentImplementation,
    ) -> Result<(), BridgeError> {
        self.components.register(implementation)
    }

    /// Idempotent; returns whether anything was removed.
    pub fn unregister_function(&mut self, name: &str) -> bool {
        self.functions.unregister(name)
    }

    /// Idempotent; returns whether anything was removed.
    pub fn unregister_component(&mut self, id: &str) -> bool {
        self.components.unregister(id)
    }

    pub fn snapshot(&self) -> CatalogSnapshot {
        CatalogSnapshot {
            functions: self.functions.definitions(),
            components: self.components.definitions(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty() && self.components.is_empty()
    }

    /// Filtered view of the catalogue; no side effects.
    pub fn query(&self, filter: &CapabilityFilter) -> CatalogSnapshot {
        CatalogSnapshot {
            functions: self
                .functions
                .list()
                .into_iter()
                .map(|i| &i.definition)
                .filter(|d| filter.matches_function(d))
                .cloned()
                .collect(),
            components: self
                .components
                .list()
                .into_iter()
                .map(|i| &i.definition)
                .filter(|d| filter.matches_component(d))
                .cloned()
                .collect(),
        }
    }
}
