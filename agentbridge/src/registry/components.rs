//! Id-keyed store of registered UI components.

use indexmap::IndexMap;

use super::types::{ComponentDefinition, ComponentImplementation};
use crate::errors::BridgeError;

/// Insertion-ordered component store. Same single-writer contract as
/// [`super::functions::FunctionRegistry`].
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    entries: IndexMap<String, ComponentImplementation>,
}

impl ComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an implementation; fails if the id is already taken or if the
    /// handlers do not line up with the declared actions.
    pub fn register(&mut self, implementation: ComponentImplementation) -> Result<(), BridgeError> {
        let id = implementation.definition.id.clone();
        if id.is_empty() {
            return Err(BridgeError::InvalidDefinition(
                "component id must not be empty".to_string(),
            ));
        }
        for action in implementation.action_handlers.keys() {
            if !implementation.definition.actions.contains_key(action) {
                return Err(BridgeError::InvalidDefinition(format!(
                    "handler provided for undeclared action `{}` on component `{}`",
                    action, id
                )));
            }
        }
        if self.entries.contains_key(&id) {
            return Err(BridgeError::DuplicateCapability(id));
        }
        self.entries.insert(id, implementation);
        Ok(())
    }

    /// Remove by id. Idempotent: absent ids are a no-op.
    pub fn unregister(&mut self, id: &str) -> bool {
        self.entries.shift_remove(id).is_some()
    }

    pub fn get(&self, id: &str) -> Option<&ComponentImplementation> {
        self.entries.get(id)
    }

    pub fn list(&self) -> Vec<&ComponentImplementation> {
        self.entries.values().collect()
    }

    pub fn definitions(&self) -> Vec<ComponentDefinition> {
        self.entries.values().map(|i| i.definition.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
