//! Accessor behavior over a cache-fronted property store.

#[path = "../support/mod.rs"]
mod support;


use std::sync::{Arc, Mutex};

use chrono::{TimeZone, Utc};
use docstate::{
    observer, AnyProperty, ArrayProperty, BooleanProperty, CachedPropertyStore, DateProperty,
    MemoryError, NumberProperty, Property, PropertyParent, PropertyStore, StringProperty, Value,
};
use serde_json::json;
use support::{request, CountingStore};

#[test]
fn setting_the_same_value_twice_writes_once() {
    let ctx = request();
    let store = CountingStore::new();
    let root = CachedPropertyStore::new(store.clone());
    let name = root.add_document(&StringProperty::new("name"));

    let events = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&events);
    root.on_event(observer(move |ctx, event, next| {
        *counter.lock().unwrap() += 1;
        next.run(ctx, event)
    }))
    .unwrap();

    name.set(&ctx, Value::from("Ada")).unwrap();
    name.set(&ctx, Value::from("Ada")).unwrap();
    assert_eq!(*events.lock().unwrap(), 1);

    root.save_changes(&ctx).unwrap();
    assert_eq!(store.writes(), 1);
}

#[test]
fn non_finite_numbers_never_reach_storage() {
    let ctx = request();
    let store = CountingStore::new();
    let root = CachedPropertyStore::new(store.clone());
    let score = root.add_document(&NumberProperty::new("score"));
    let events = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&events);
    score
        .observe(move |ctx, event, next| {
            *counter.lock().unwrap() += 1;
            next.run(ctx, event)
        })
        .unwrap();

    assert!(score.set(&ctx, Value::Number(f64::NAN)).is_err());
    assert!(score.set(&ctx, Value::Number(f64::NAN)).is_err());
    assert_eq!(*events.lock().unwrap(), 0);
    assert_eq!(score.get(&ctx).unwrap(), None);

    root.save_changes(&ctx).unwrap();
    assert_eq!(store.writes(), 0);
}

#[test]
fn forced_writes_skip_change_detection() {
    let ctx = request();
    let root = CachedPropertyStore::new(CountingStore::new());
    let name = root.add_document(&StringProperty::new("name"));
    let events = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&events);
    name.observe(move |ctx, event, next| {
        *counter.lock().unwrap() += 1;
        next.run(ctx, event)
    })
    .unwrap();

    name.set(&ctx, Value::from("Ada")).unwrap();
    name.set_with(&ctx, Some(Value::from("Ada")), true).unwrap();
    assert_eq!(*events.lock().unwrap(), 2);
}

#[test]
fn materialized_defaults_are_independent_copies() {
    let ctx = request();
    let root = CachedPropertyStore::new(CountingStore::new());
    let settings = root.add_document(&AnyProperty::new("settings"));

    let mut first = settings.get_or(&ctx, Value::from(json!({ "a": 1 }))).unwrap();
    if let Value::Map(record) = &mut first {
        record.insert("b".into(), Value::from(2));
    }
    let second = settings.get_or(&ctx, Value::from(json!({ "a": 1 }))).unwrap();
    assert_eq!(second, Value::from(json!({ "a": 1 })));

    let other = root.add_document(&AnyProperty::new("other"));
    let third = other.get_or(&ctx, Value::from(json!({ "a": 1 }))).unwrap();
    assert_eq!(third, Value::from(json!({ "a": 1 })));
}

#[test]
fn materialized_defaults_are_persisted() {
    let ctx = request();
    let store = CountingStore::new();
    let root = CachedPropertyStore::new(store.clone());
    let visits = root.add_document(&AnyProperty::new("visits"));

    assert_eq!(visits.get_or(&ctx, Value::from(0)).unwrap(), Value::from(0));
    root.save_changes(&ctx).unwrap();
    assert_eq!(
        store.inner().get_field(&ctx, "visits").unwrap(),
        Some(Value::from(0))
    );
}

#[test]
fn rejected_assignments_leave_the_value_alone() {
    let ctx = request();
    let root = CachedPropertyStore::new(CountingStore::new());
    let active = root.add_document(&BooleanProperty::new("isActive"));
    active.set(&ctx, Value::from(true)).unwrap();

    let err = active.set(&ctx, Value::from("yes")).unwrap_err();
    assert_eq!(
        err,
        MemoryError::InvalidAssignment {
            property: "isActive".into(),
            expected: "boolean",
        }
    );
    assert_eq!(active.get(&ctx).unwrap(), Some(Value::from(true)));
}

#[test]
fn dates_round_trip_through_storage() {
    let store = CountingStore::new();
    let root = CachedPropertyStore::new(store.clone());
    let seen = root.add_document(&DateProperty::new("lastSeen"));
    let when = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();

    let ctx = request();
    seen.set(&ctx, Value::Date(when)).unwrap();
    root.save_changes(&ctx).unwrap();

    let next_request = request();
    assert_eq!(seen.get(&next_request).unwrap(), Some(Value::Date(when)));
}

#[test]
fn array_insert_and_delete_positions() {
    let ctx = request();
    let root = CachedPropertyStore::new(CountingStore::new());
    let list = root.add_document(&ArrayProperty::new("list"));

    list.set(&ctx, Value::from(json!([1, 2]))).unwrap();
    list.insert_item(&ctx, Value::from("v"), None).unwrap();
    assert_eq!(list.get(&ctx).unwrap(), Some(Value::from(json!([1, 2, "v"]))));

    list.set(&ctx, Value::from(json!([1, 2]))).unwrap();
    list.insert_item(&ctx, Value::from("v"), Some(0)).unwrap();
    assert_eq!(list.get(&ctx).unwrap(), Some(Value::from(json!(["v", 1, 2]))));

    list.set(&ctx, Value::from(json!([1, 2, 3]))).unwrap();
    list.delete_item(&ctx, None).unwrap();
    assert_eq!(list.get(&ctx).unwrap(), Some(Value::from(json!([1, 2]))));
}

#[test]
fn observers_can_rewrite_values() {
    let ctx = request();
    let root = CachedPropertyStore::new(CountingStore::new());
    let name = root.add_document(&StringProperty::new("name"));
    name.observe(|ctx, event, next| {
        if let Some(Value::String(text)) = event.value_mut() {
            *text = text.trim().to_string();
        }
        next.run(ctx, event)
    })
    .unwrap();

    name.set(&ctx, Value::from("  Ada  ")).unwrap();
    assert_eq!(name.get(&ctx).unwrap(), Some(Value::from("Ada")));
}

#[test]
fn vetoed_collection_inserts_change_nothing() {
    let ctx = request();
    let root = CachedPropertyStore::new(CountingStore::new());
    let list = root.add_document(&ArrayProperty::new("list"));
    list.set(&ctx, Value::from(json!([1]))).unwrap();
    list.observe(|ctx, event, next| match event.key() {
        Some(_) => Ok(()),
        None => next.run(ctx, event),
    })
    .unwrap();

    list.insert_item(&ctx, Value::from(2), None).unwrap();
    assert_eq!(list.get(&ctx).unwrap(), Some(Value::from(json!([1]))));
}

#[test]
fn accessors_share_the_request_cache() {
    let ctx = request();
    let root = CachedPropertyStore::new(CountingStore::new());
    let writer = root.add_document(&StringProperty::new("topic"));
    let reader = root.add_document(&StringProperty::new("topic"));

    writer.set(&ctx, Value::from("weather")).unwrap();
    assert_eq!(reader.get(&ctx).unwrap(), Some(Value::from("weather")));
    assert_eq!(reader.path(&ctx).unwrap(), "topic");
}
