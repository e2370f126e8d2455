//! Write-back caching: dirty tracking, flush policies and failure handling.

#[path = "../support/mod.rs"]
mod support;

use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use docstate::{
    CachedDocumentContainer, CachedPropertyStore, Document, DocumentContainer, FlushOptions,
    FlushReport, InMemoryPropertyStore, MemoryConfig, MemoryError, NumberProperty, Property,
    PropertyStore, RequestContext, StringProperty, Value,
};
use serde_json::json;
use support::{record, request, CountingContainer, CountingStore};

#[test]
fn only_changed_fields_are_written() {
    let ctx = request();
    let store = CountingStore::new();
    for (id, value) in [("a", 1), ("b", 2), ("c", 3)] {
        store.inner().set_field(&ctx, id, &Value::from(value)).unwrap();
    }
    let root = CachedPropertyStore::new(store.clone());
    let fields: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|id| root.add_document(&NumberProperty::new(*id)))
        .collect();
    for field in &fields {
        field.get(&ctx).unwrap();
    }

    fields[1].set(&ctx, Value::from(20)).unwrap();
    let report = root.save_changes(&ctx).unwrap();

    assert_eq!(
        report,
        FlushReport {
            written: 1,
            deleted: 0,
            unchanged: 2,
        }
    );
    assert_eq!(store.writes(), 1);
}

#[test]
fn setting_a_value_back_is_not_a_change() {
    let ctx = request();
    let store = CountingStore::new();
    store.inner().set_field(&ctx, "count", &Value::from(1)).unwrap();
    let root = CachedPropertyStore::new(store.clone());
    let count = root.add_document(&NumberProperty::new("count"));

    count.set(&ctx, Value::from(2)).unwrap();
    count.set(&ctx, Value::from(1)).unwrap();
    assert_eq!(root.pending_changes(&ctx).unwrap(), 0);
    root.save_changes(&ctx).unwrap();
    assert_eq!(store.writes(), 0);
}

#[test]
fn requests_keep_separate_caches() {
    let root = CachedPropertyStore::new(CountingStore::new());
    let topic = root.add_document(&StringProperty::new("topic"));
    let first = request();
    let second = request();

    topic.set(&first, Value::from("weather")).unwrap();
    assert_eq!(topic.get(&second).unwrap(), None);
    assert_eq!(root.pending_changes(&second).unwrap(), 0);

    root.save_changes(&first).unwrap();
    let third = request();
    assert_eq!(topic.get(&third).unwrap(), Some(Value::from("weather")));
}

#[test]
fn entries_survive_a_field_store_flush() {
    let ctx = request();
    let store = CountingStore::new();
    let root = CachedPropertyStore::new(store.clone());
    let topic = root.add_document(&StringProperty::new("topic"));
    topic.set(&ctx, Value::from("weather")).unwrap();
    root.save_changes(&ctx).unwrap();

    store
        .inner()
        .set_field(&ctx, "topic", &Value::from("sports"))
        .unwrap();
    assert_eq!(topic.get(&ctx).unwrap(), Some(Value::from("weather")));
}

#[test]
fn container_flush_clears_the_cache() {
    let ctx = request();
    let container = CountingContainer::new();
    let root = CachedDocumentContainer::new(container.clone());
    let profile = root.add_document(&Document::new("profile").with_property(StringProperty::new("name")));

    profile.set(&ctx, Value::from(json!({ "name": "Ada" }))).unwrap();
    root.save_changes(&ctx).unwrap();
    assert_eq!(container.upserts(), 1);

    container
        .inner()
        .upsert(record(json!({ "id": "profile", "name": "Grace" })))
        .unwrap();
    assert_eq!(
        profile.get(&ctx).unwrap(),
        Some(Value::from(json!({ "name": "Grace" })))
    );
}

#[test]
fn failed_writes_are_reported_and_stay_dirty() {
    let ctx = request();
    let store = CountingStore::new();
    store.fail_on("b");
    let root = CachedPropertyStore::new(store.clone());
    for id in ["a", "b", "c"] {
        root.add_document(&NumberProperty::new(id))
            .set(&ctx, Value::from(1))
            .unwrap();
    }

    match root.save_changes(&ctx) {
        Err(MemoryError::Flush(failures)) => {
            assert_eq!(failures.len(), 1);
            assert_eq!(failures[0].id, "b");
        }
        other => panic!("expected a flush failure, got {:?}", other),
    }
    assert_eq!(store.writes(), 2);
    assert_eq!(store.inner().get_field(&ctx, "a").unwrap(), Some(Value::from(1)));
    assert_eq!(root.pending_changes(&ctx).unwrap(), 1);

    store.heal();
    assert_eq!(root.save_changes(&ctx).unwrap().written, 1);
    assert_eq!(store.writes(), 3);
}

#[test]
fn failed_container_flush_keeps_the_cache() {
    let ctx = request();
    let container = CountingContainer::new();
    container.fail_on("b");
    let root = CachedDocumentContainer::new(container.clone());
    for id in ["a", "b"] {
        root.add_document(&Document::new(id).with_property(StringProperty::new("name")))
            .set(&ctx, Value::from(json!({ "name": id })))
            .unwrap();
    }

    assert!(matches!(
        root.save_changes(&ctx),
        Err(MemoryError::Flush(_))
    ));
    assert_eq!(root.pending_changes(&ctx).unwrap(), 1);
    assert!(container.inner().read("a").unwrap().is_some());
}

#[test]
fn narrow_flushes_still_write_everything() {
    let ctx = request();
    let store = CountingStore::new();
    let config = MemoryConfig::from_json(r#"{ "flush": { "max_concurrent_writes": 1 } }"#).unwrap();
    let root = CachedPropertyStore::with_options(store.clone(), config.flush);
    for index in 0..10 {
        root.add_document(&NumberProperty::new(format!("n{}", index)))
            .set(&ctx, Value::from(index))
            .unwrap();
    }

    assert_eq!(root.save_changes(&ctx).unwrap().written, 10);
    assert_eq!(store.writes(), 10);
    assert_eq!(store.inner().len(), 10);
}

/// Field store whose writes hold until `width` of them are in flight at once,
/// or a timeout passes.
#[derive(Clone)]
struct GatedStore {
    inner: InMemoryPropertyStore,
    width: usize,
    gate: Arc<(Mutex<Gate>, Condvar)>,
}

#[derive(Default)]
struct Gate {
    in_flight: usize,
    peak: usize,
}

impl GatedStore {
    fn new(width: usize) -> Self {
        Self {
            inner: InMemoryPropertyStore::new(),
            width,
            gate: Arc::new((Mutex::new(Gate::default()), Condvar::new())),
        }
    }

    fn peak(&self) -> usize {
        self.gate.0.lock().unwrap().peak
    }
}

impl PropertyStore for GatedStore {
    fn get_field(&self, ctx: &RequestContext, id: &str) -> Result<Option<Value>, MemoryError> {
        self.inner.get_field(ctx, id)
    }

    fn set_field(&self, ctx: &RequestContext, id: &str, value: &Value) -> Result<(), MemoryError> {
        let (lock, arrived) = &*self.gate;
        let mut gate = lock.lock().unwrap();
        gate.in_flight += 1;
        gate.peak = gate.peak.max(gate.in_flight);
        arrived.notify_all();
        let (mut gate, _) = arrived
            .wait_timeout_while(gate, Duration::from_secs(2), |gate| gate.peak < self.width)
            .unwrap();
        gate.in_flight -= 1;
        drop(gate);
        self.inner.set_field(ctx, id, value)
    }

    fn delete_field(&self, ctx: &RequestContext, id: &str) -> Result<(), MemoryError> {
        self.inner.delete_field(ctx, id)
    }
}

#[test]
fn wide_flushes_write_concurrently() {
    let ctx = request();
    let store = GatedStore::new(4);
    let root = CachedPropertyStore::with_options(
        store.clone(),
        FlushOptions {
            max_concurrent_writes: 4,
        },
    );
    for index in 0..8 {
        root.add_document(&NumberProperty::new(format!("n{}", index)))
            .set(&ctx, Value::from(index))
            .unwrap();
    }

    assert_eq!(root.save_changes(&ctx).unwrap().written, 8);
    assert_eq!(store.peak(), 4);
    assert_eq!(store.inner.keys().unwrap().len(), 8);
}
