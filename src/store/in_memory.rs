use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use super::PropertyStore;
use crate::context::RequestContext;
use crate::error::MemoryError;
use crate::value::Value;

/// HashMap-backed field store for tests and development.
///
/// Fields are kept as serde_json bytes. Clone-friendly via Arc: clones share
/// the same storage.
#[derive(Clone, Default)]
pub struct InMemoryPropertyStore {
    storage: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl InMemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.storage.read().map(|storage| storage.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of every stored field, sorted.
    pub fn keys(&self) -> Result<Vec<String>, MemoryError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| MemoryError::LockPoisoned("property store keys"))?;
        let mut keys: Vec<String> = storage.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}

impl PropertyStore for InMemoryPropertyStore {
    fn get_field(&self, _ctx: &RequestContext, id: &str) -> Result<Option<Value>, MemoryError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| MemoryError::LockPoisoned("property store read"))?;
        match storage.get(id) {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    fn set_field(&self, _ctx: &RequestContext, id: &str, value: &Value) -> Result<(), MemoryError> {
        let bytes = serde_json::to_vec(value)?;
        self.storage
            .write()
            .map_err(|_| MemoryError::LockPoisoned("property store write"))?
            .insert(id.to_string(), bytes);
        Ok(())
    }

    fn delete_field(&self, _ctx: &RequestContext, id: &str) -> Result<(), MemoryError> {
        self.storage
            .write()
            .map_err(|_| MemoryError::LockPoisoned("property store delete"))?
            .remove(id);
        Ok(())
    }
}
