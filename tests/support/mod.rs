//! Shared fixtures: request builders and store wrappers that count writes
//! and fail on demand.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use docstate::{
    DocumentContainer, InMemoryDocumentContainer, InMemoryPropertyStore, MemoryError,
    PropertyStore, Record, RequestContext, Value,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A request for `conversation`, on the "test" channel, from "user-1".
pub fn request_in(conversation: &str) -> RequestContext {
    init_logging();
    RequestContext::new()
        .with_channel("test")
        .with_conversation(conversation)
        .with_user("user-1")
}

pub fn request() -> RequestContext {
    request_in("conv-1")
}

pub fn record(value: serde_json::Value) -> Record {
    Value::from(value).into_map().unwrap_or_default()
}

#[derive(Clone, Default)]
struct Failures(Arc<Mutex<HashSet<String>>>);

impl Failures {
    fn add(&self, id: &str) {
        self.0.lock().unwrap().insert(id.to_string());
    }

    fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    fn check(&self, id: &str) -> Result<(), MemoryError> {
        if self.0.lock().unwrap().contains(id) {
            return Err(MemoryError::Storage(format!("write to '{}' refused", id)));
        }
        Ok(())
    }
}

/// Field store that counts backing writes. Clones share counters.
#[derive(Clone, Default)]
pub struct CountingStore {
    inner: InMemoryPropertyStore,
    writes: Arc<AtomicUsize>,
    deletes: Arc<AtomicUsize>,
    failures: Failures,
}

impl CountingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryPropertyStore {
        &self.inner
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    /// Make every write to `id` fail until `heal` is called.
    pub fn fail_on(&self, id: &str) {
        self.failures.add(id);
    }

    pub fn heal(&self) {
        self.failures.clear();
    }
}

impl PropertyStore for CountingStore {
    fn get_field(&self, ctx: &RequestContext, id: &str) -> Result<Option<Value>, MemoryError> {
        self.inner.get_field(ctx, id)
    }

    fn set_field(&self, ctx: &RequestContext, id: &str, value: &Value) -> Result<(), MemoryError> {
        self.failures.check(id)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set_field(ctx, id, value)
    }

    fn delete_field(&self, ctx: &RequestContext, id: &str) -> Result<(), MemoryError> {
        self.failures.check(id)?;
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete_field(ctx, id)
    }
}

/// Document container that counts upserts. Clones share counters.
#[derive(Clone, Default)]
pub struct CountingContainer {
    inner: InMemoryDocumentContainer,
    upserts: Arc<AtomicUsize>,
    failures: Failures,
}

impl CountingContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inner(&self) -> &InMemoryDocumentContainer {
        &self.inner
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn fail_on(&self, id: &str) {
        self.failures.add(id);
    }
}

impl DocumentContainer for CountingContainer {
    fn container_type(&self) -> &str {
        "counting"
    }

    fn create(&self, record: Record) -> Result<Record, MemoryError> {
        self.inner.create(record)
    }

    fn read(&self, id: &str) -> Result<Option<Record>, MemoryError> {
        self.inner.read(id)
    }

    fn replace(&self, record: Record) -> Result<Record, MemoryError> {
        self.inner.replace(record)
    }

    fn upsert(&self, record: Record) -> Result<Record, MemoryError> {
        if let Some(id) = docstate::record_id(&record) {
            self.failures.check(id)?;
        }
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.inner.upsert(record)
    }

    fn delete(&self, id: &str) -> Result<bool, MemoryError> {
        self.inner.delete(id)
    }
}
