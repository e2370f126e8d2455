//! Backing storage contracts.
//!
//! Two shapes of persistence sit behind the cache: a [`PropertyStore`] that
//! reads and writes individual fields, and a [`DocumentContainer`] that
//! stores whole records keyed by their `id` field.

mod container;
mod in_memory;

pub use container::InMemoryDocumentContainer;
pub use in_memory::InMemoryPropertyStore;

use crate::context::RequestContext;
use crate::error::MemoryError;
use crate::value::{Record, Value};

/// Field-by-field storage.
pub trait PropertyStore: Send + Sync {
    /// Get a field. Returns None if it was never written.
    fn get_field(&self, ctx: &RequestContext, id: &str) -> Result<Option<Value>, MemoryError>;

    fn set_field(&self, ctx: &RequestContext, id: &str, value: &Value) -> Result<(), MemoryError>;

    /// Delete a field. Deleting a missing field is not an error.
    fn delete_field(&self, ctx: &RequestContext, id: &str) -> Result<(), MemoryError>;
}

/// Whole-record storage. Records carry their key in a string `id` field;
/// writes without one get an id assigned.
pub trait DocumentContainer: Send + Sync {
    /// Short name of the backend, for diagnostics.
    fn container_type(&self) -> &str;

    /// Insert a new record. Fails with `DuplicateId` if the id is taken.
    fn create(&self, record: Record) -> Result<Record, MemoryError>;

    fn read(&self, id: &str) -> Result<Option<Record>, MemoryError>;

    /// Overwrite an existing record. Fails with `NotFound` if it is absent.
    fn replace(&self, record: Record) -> Result<Record, MemoryError>;

    /// Insert or overwrite.
    fn upsert(&self, record: Record) -> Result<Record, MemoryError>;

    /// Delete a record. Returns true if it existed.
    fn delete(&self, id: &str) -> Result<bool, MemoryError>;
}

/// The record's non-empty string id, if it has one.
pub fn record_id(record: &Record) -> Option<&str> {
    record
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
}
