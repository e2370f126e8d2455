use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use log::debug;

use super::{record_id, DocumentContainer};
use crate::error::MemoryError;
use crate::value::{Record, Value};

/// HashMap-backed document container for tests and development.
///
/// Records are stored as serde_json bytes keyed by id. Records written
/// without an id get the next value of a shared counter. Clone-friendly via
/// Arc.
#[derive(Clone)]
pub struct InMemoryDocumentContainer {
    storage: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    next_id: Arc<AtomicU64>,
}

impl Default for InMemoryDocumentContainer {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentContainer {
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn len(&self) -> usize {
        self.storage.read().map(|storage| storage.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Make sure `record` has a string id, assigning one when it is missing,
    /// null or empty.
    fn ensure_id(&self, mut record: Record) -> Result<(String, Record), MemoryError> {
        match record.get("id") {
            None | Some(Value::Null) => {}
            Some(Value::String(id)) if id.is_empty() => {}
            Some(Value::String(id)) => return Ok((id.clone(), record)),
            Some(other) => {
                return Err(MemoryError::InvalidRecord(format!(
                    "record id must be a string, found {}",
                    other.kind()
                )))
            }
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        debug!("assigned id '{}' to new record", id);
        record.insert("id".to_string(), Value::from(id.as_str()));
        Ok((id, record))
    }

    fn encode(record: &Record) -> Result<Vec<u8>, MemoryError> {
        Ok(serde_json::to_vec(record)?)
    }
}

impl DocumentContainer for InMemoryDocumentContainer {
    fn container_type(&self) -> &str {
        "memory"
    }

    fn create(&self, record: Record) -> Result<Record, MemoryError> {
        let (id, record) = self.ensure_id(record)?;
        let bytes = Self::encode(&record)?;
        let mut storage = self
            .storage
            .write()
            .map_err(|_| MemoryError::LockPoisoned("container create"))?;
        if storage.contains_key(&id) {
            return Err(MemoryError::DuplicateId(id));
        }
        storage.insert(id, bytes);
        Ok(record)
    }

    fn read(&self, id: &str) -> Result<Option<Record>, MemoryError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| MemoryError::LockPoisoned("container read"))?;
        match storage.get(id) {
            Some(bytes) => Ok(Some(serde_json::from_slice(bytes)?)),
            None => Ok(None),
        }
    }

    fn replace(&self, record: Record) -> Result<Record, MemoryError> {
        let id = record_id(&record)
            .map(str::to_string)
            .ok_or_else(|| MemoryError::InvalidRecord("replace requires a string id".into()))?;
        let bytes = Self::encode(&record)?;
        let mut storage = self
            .storage
            .write()
            .map_err(|_| MemoryError::LockPoisoned("container replace"))?;
        match storage.get_mut(&id) {
            Some(stored) => {
                *stored = bytes;
                Ok(record)
            }
            None => Err(MemoryError::NotFound(id)),
        }
    }

    fn upsert(&self, record: Record) -> Result<Record, MemoryError> {
        let (id, record) = self.ensure_id(record)?;
        let bytes = Self::encode(&record)?;
        self.storage
            .write()
            .map_err(|_| MemoryError::LockPoisoned("container upsert"))?
            .insert(id, bytes);
        Ok(record)
    }

    fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        Ok(self
            .storage
            .write()
            .map_err(|_| MemoryError::LockPoisoned("container delete"))?
            .remove(id)
            .is_some())
    }
}
