//! Name-keyed store of callable functions.

use indexmap::IndexMap;

use super::types::{FunctionDefinition, FunctionImplementation};
use crate::errors::BridgeError;

/// Insertion-ordered function store.
///
/// Single-writer: mutation is expected to happen from one logical owner (the
/// coordinator). The bridge wraps the whole registry in a `RwLock` so queries
/// from other tasks stay safe; the store itself performs no locking.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    entries: IndexMap<String, FunctionImplementation>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an implementation; fails if the name is already taken.
    pub fn register(&mut self, implementation: FunctionImplementation) -> Result<(), BridgeError> {
        let name = implementation.definition.name.clone();
        if name.is_empty() {
            return Err(BridgeError::InvalidDefinition(
                "function name must not be empty".to_string(),
            ));
        }
        if self.entries.contains_key(&name) {
            return Err(BridgeError::DuplicateCapability(name));
        }
        self.entries.insert(name, implementation);
        Ok(())
    }

    /// Remove by name. Idempotent: absent names are a no-op.
    ///
    /// Uses `shift_remove` so the insertion order of the remaining entries is
    /// preserved for announcement stability.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.entries.shift_remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&FunctionImplementation> {
        self.entries.get(name)
    }

    /// All implementations in registration order.
    pub fn list(&self) -> Vec<&FunctionImplementation> {
        self.entries.values().collect()
    }

    pub fn definitions(&self) -> Vec<FunctionDefinition> {
        self.entries.values().map(|i| i.definition.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
