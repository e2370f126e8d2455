//! Typed, lazily-materialized document properties over pluggable storage.
//!
//! Accessors ([`Property`]) read and write named slots of a parent node.
//! Parents are documents, collection item views, or cache-fronted roots
//! ([`CachedPropertyStore`], [`CachedDocumentContainer`]) that keep a
//! request-scoped write-back cache and persist only what changed.

pub mod accessor;
pub mod cache;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod events;
pub mod identity;
pub mod properties;
pub mod roots;
pub mod store;
pub mod value;

pub use accessor::{Bindable, ParentRef, Property, PropertyCore, PropertyParent};
pub use cache::{CacheBacking, FlushOptions, FlushPolicy, FlushReport, WriteBackCache};
pub use config::MemoryConfig;
pub use context::{RequestContext, SlotKey, CHANNEL_ID, CONVERSATION_ID, USER_ID};
pub use document::{Document, DocumentSlot, TemporaryDocument};
pub use error::{FlushFailure, MemoryError};
pub use events::{
    dispatch, observer, CollectionKey, EventKind, EventSource, Next, Observer, PropertyEvent,
};
pub use identity::{
    ConversationId, ConversationIdOptions, IdRef, IdResolver, IntoIdResolver, StaticId, UserId,
    UserIdOptions,
};
pub use properties::{
    AnyProperty, ArrayItemView, ArrayProperty, BooleanProperty, DateProperty,
    DocumentReferenceArrayProperty, DocumentReferenceProperty, DocumentSource, MapItemView,
    MapProperty, NumberProperty, StringProperty,
};
pub use roots::{CachedDocumentContainer, CachedPropertyStore};
pub use store::{
    record_id, DocumentContainer, InMemoryDocumentContainer, InMemoryPropertyStore,
    PropertyStore,
};
pub use value::{Record, Value, ValueKind};
