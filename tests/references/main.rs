//! Reference properties and the document container contract.

#[path = "../support/mod.rs"]
mod support;

use std::sync::{Arc, Mutex};

use docstate::{
    observer, CachedDocumentContainer, Document, DocumentContainer,
    DocumentReferenceArrayProperty, DocumentReferenceProperty, InMemoryDocumentContainer,
    MemoryError, Property, StringProperty, Value,
};
use serde_json::json;
use support::{record, request};

fn person() -> Document {
    Document::unnamed().with_property(StringProperty::new("name"))
}

/// A session document under a container root, holding `reference`.
fn session<P: docstate::Bindable>(
    container: &InMemoryDocumentContainer,
    reference: P,
) -> (Arc<Document>, Arc<P>) {
    let root = CachedDocumentContainer::new(container.clone());
    let session = root.add_document(&Document::new("session"));
    let reference = session.add_property(&reference);
    (session, reference)
}

#[test]
fn create_rejects_a_taken_id_but_upsert_does_not() {
    let container = InMemoryDocumentContainer::new();
    container.create(record(json!({ "id": "x" }))).unwrap();
    assert_eq!(
        container.create(record(json!({ "id": "x" }))),
        Err(MemoryError::DuplicateId("x".into()))
    );

    container.upsert(record(json!({ "id": "y" }))).unwrap();
    container.upsert(record(json!({ "id": "y" }))).unwrap();
    assert_eq!(container.len(), 2);
}

#[test]
fn upsert_then_read_through_a_reference() {
    let ctx = request();
    let container = InMemoryDocumentContainer::new();
    let (_session, owner) = session(&container, DocumentReferenceProperty::new("owner"));

    let stored = owner
        .upsert_document(&ctx, record(json!({ "name": "Ada" })))
        .unwrap();
    assert_eq!(docstate::record_id(&stored), Some("1"));
    assert_eq!(owner.get(&ctx).unwrap(), Some(Value::from("1")));

    let projected = owner
        .read_document(&ctx, &person())
        .unwrap()
        .expect("the referenced document exists");
    assert_eq!(
        projected.get(&ctx).unwrap(),
        Some(Value::from(json!({ "name": "Ada" })))
    );
}

#[test]
fn replace_requires_an_existing_document() {
    let ctx = request();
    let container = InMemoryDocumentContainer::new();
    let (_session, owner) = session(&container, DocumentReferenceProperty::new("owner"));

    let err = owner
        .replace_document(&ctx, record(json!({ "id": "7", "name": "Ada" })))
        .unwrap_err();
    assert_eq!(err, MemoryError::NotFound("7".into()));
    assert_eq!(owner.get(&ctx).unwrap(), None);

    container.create(record(json!({ "id": "7", "name": "Ada" }))).unwrap();
    owner
        .replace_document(&ctx, record(json!({ "id": "7", "name": "Grace" })))
        .unwrap();
    assert_eq!(owner.get(&ctx).unwrap(), Some(Value::from("7")));
    assert_eq!(
        container.read("7").unwrap(),
        Some(record(json!({ "id": "7", "name": "Grace" })))
    );
}

#[test]
fn delete_leaves_the_reference_in_place() {
    let ctx = request();
    let container = InMemoryDocumentContainer::new();
    let (_session, owner) = session(&container, DocumentReferenceProperty::new("owner"));
    owner
        .upsert_document(&ctx, record(json!({ "name": "Ada" })))
        .unwrap();

    assert!(owner.delete_document(&ctx).unwrap());
    assert!(!owner.delete_document(&ctx).unwrap());
    assert_eq!(owner.get(&ctx).unwrap(), Some(Value::from("1")));
    assert!(owner.read_document(&ctx, &person()).unwrap().is_none());
}

#[test]
fn upserting_an_accessor_links_its_id() {
    let ctx = request();
    let container = InMemoryDocumentContainer::new();
    let (session, owner) = session(&container, DocumentReferenceProperty::new("owner"));
    let draft = session.add_property(
        &Document::new("draft")
            .with_property(StringProperty::new("id"))
            .with_property(StringProperty::new("name")),
    );
    draft.set(&ctx, Value::from(json!({ "name": "Ada" }))).unwrap();

    owner.upsert_document(&ctx, &*draft as &dyn Property).unwrap();
    assert_eq!(
        draft.get(&ctx).unwrap(),
        Some(Value::from(json!({ "id": "1", "name": "Ada" })))
    );
    assert_eq!(
        container.read("1").unwrap(),
        Some(record(json!({ "id": "1", "name": "Ada" })))
    );
}

#[test]
fn accessors_without_a_record_are_rejected() {
    let ctx = request();
    let container = InMemoryDocumentContainer::new();
    let (session, owner) = session(&container, DocumentReferenceProperty::new("owner"));
    let title = session.add_property(&StringProperty::new("title"));

    let err = owner.upsert_document(&ctx, &*title as &dyn Property).unwrap_err();
    assert!(matches!(err, MemoryError::InvalidRecord(_)));
    assert!(container.is_empty());
}

#[test]
fn references_need_a_reachable_container() {
    let ctx = request();
    let standalone = Document::new("session");
    let owner = standalone.add_property(&DocumentReferenceProperty::new("owner"));
    assert_eq!(
        owner.upsert_document(&ctx, record(json!({ "name": "Ada" }))),
        Err(MemoryError::StoreUnavailable)
    );
}

#[test]
fn projected_documents_bubble_to_the_referencing_document() {
    let ctx = request();
    let container = InMemoryDocumentContainer::new();
    let (session, owner) = session(&container, DocumentReferenceProperty::new("owner"));
    owner
        .upsert_document(&ctx, record(json!({ "name": "Ada" })))
        .unwrap();
    let paths = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&paths);
    session
        .on_event(observer(move |ctx, event, next| {
            log.lock().unwrap().push(event.path.clone());
            next.run(ctx, event)
        }))
        .unwrap();

    let projected = owner
        .read_document(&ctx, &person())
        .unwrap()
        .expect("the referenced document exists");
    projected
        .set(&ctx, Value::from(json!({ "name": "Grace" })))
        .unwrap();

    assert_eq!(*paths.lock().unwrap(), vec!["1", "1.name"]);
    assert_eq!(
        projected.get(&ctx).unwrap(),
        Some(Value::from(json!({ "name": "Grace" })))
    );
}

#[test]
fn reference_arrays_track_ids_in_order() {
    let ctx = request();
    let container = InMemoryDocumentContainer::new();
    let (_session, members) =
        session(&container, DocumentReferenceArrayProperty::new("members"));

    members
        .upsert_document(&ctx, record(json!({ "name": "Ada" })), None)
        .unwrap();
    members
        .upsert_document(&ctx, record(json!({ "name": "Grace" })), None)
        .unwrap();
    members
        .upsert_document(&ctx, record(json!({ "name": "Edsger" })), Some(0))
        .unwrap();
    assert_eq!(
        members.get(&ctx).unwrap(),
        Some(Value::from(json!(["3", "1", "2"])))
    );

    let second = members
        .read_document(&ctx, 1, &person())
        .unwrap()
        .expect("member 1 exists");
    assert_eq!(
        second.get(&ctx).unwrap(),
        Some(Value::from(json!({ "name": "Ada" })))
    );

    assert!(members.delete_document(&ctx, Some(0)).unwrap());
    assert!(members.delete_document(&ctx, None).unwrap());
    assert_eq!(members.get(&ctx).unwrap(), Some(Value::from(json!(["1"]))));
    assert_eq!(container.len(), 1);
}

#[test]
fn reference_arrays_check_positions() {
    let ctx = request();
    let container = InMemoryDocumentContainer::new();
    let (_session, members) =
        session(&container, DocumentReferenceArrayProperty::new("members"));
    members
        .upsert_document(&ctx, record(json!({ "name": "Ada" })), None)
        .unwrap();

    assert_eq!(
        members.read_document(&ctx, 4, &person()).unwrap_err(),
        MemoryError::IndexOutOfRange {
            property: "members".into(),
            index: 4,
            len: 1,
        }
    );
    assert!(matches!(
        members.upsert_document(&ctx, record(json!({ "name": "Grace" })), Some(3)),
        Err(MemoryError::IndexOutOfRange { index: 3, .. })
    ));
    members
        .upsert_document(&ctx, record(json!({ "name": "Grace" })), Some(1))
        .unwrap();
    assert_eq!(members.ids().length(&ctx).unwrap(), 2);
    assert!(members.set(&ctx, Value::from(json!([1, 2]))).is_err());
}
