use std::sync::Arc;

use crate::accessor::{Bindable, ParentRef, Property, PropertyParent};
use crate::cache::{CacheBacking, FlushOptions, FlushPolicy, FlushReport, WriteBackCache};
use crate::context::RequestContext;
use crate::error::MemoryError;
use crate::events::{EventSource, Observer};
use crate::store::PropertyStore;
use crate::value::Value;

use super::DocumentList;

/// Adapts a field store to the cache.
struct Fields<'a, S: ?Sized>(&'a S);

impl<S: PropertyStore + ?Sized> CacheBacking for Fields<'_, S> {
    fn load(&self, ctx: &RequestContext, id: &str) -> Result<Option<Value>, MemoryError> {
        self.0.get_field(ctx, id)
    }

    fn write(&self, ctx: &RequestContext, id: &str, value: &Value) -> Result<(), MemoryError> {
        self.0.set_field(ctx, id, value)
    }

    fn remove(&self, ctx: &RequestContext, id: &str) -> Result<(), MemoryError> {
        self.0.delete_field(ctx, id)
    }
}

/// Root over a [`PropertyStore`]: each top-level slot is one field.
///
/// Cache entries are kept after a flush, so later reads in the same request
/// keep hitting the cache.
pub struct CachedPropertyStore<S> {
    store: S,
    cache: WriteBackCache,
    events: EventSource,
    documents: DocumentList,
}

impl<S: PropertyStore + 'static> CachedPropertyStore<S> {
    pub fn new(store: S) -> Arc<Self> {
        Self::with_options(store, FlushOptions::default())
    }

    pub fn with_options(store: S, options: FlushOptions) -> Arc<Self> {
        Arc::new(Self {
            store,
            cache: WriteBackCache::new(FlushPolicy::Retain, options),
            events: EventSource::new(),
            documents: DocumentList::default(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Bind a copy of `prototype` to this root, keeping its id, and register
    /// it for [`for_each_document`](Self::for_each_document).
    pub fn add_document<P: Bindable>(self: &Arc<Self>, prototype: &P) -> Arc<P> {
        let document = Arc::new(prototype.attach(Arc::clone(self) as ParentRef));
        self.documents
            .register(Arc::clone(&document) as Arc<dyn Property>);
        document
    }

    /// Visit every registered document that is still alive.
    pub fn for_each_document(
        &self,
        f: impl FnMut(usize, &Arc<dyn Property>),
    ) -> Result<(), MemoryError> {
        self.documents.for_each(f)
    }

    /// Persist every field changed in this request.
    pub fn save_changes(&self, ctx: &RequestContext) -> Result<FlushReport, MemoryError> {
        self.cache.flush(ctx, &Fields(&self.store))
    }

    pub fn pending_changes(&self, ctx: &RequestContext) -> Result<usize, MemoryError> {
        self.cache.pending_changes(ctx)
    }

    /// Drop this request's cached fields without saving them.
    pub fn discard_changes(&self, ctx: &RequestContext) -> Result<(), MemoryError> {
        self.cache.discard(ctx)
    }
}

impl<S: PropertyStore + 'static> PropertyParent for CachedPropertyStore<S> {
    fn path(&self, _ctx: &RequestContext) -> Result<String, MemoryError> {
        Ok(String::new())
    }

    fn get_property_value(
        &self,
        ctx: &RequestContext,
        id: &str,
        default: Option<Value>,
    ) -> Result<Option<Value>, MemoryError> {
        self.cache.read(ctx, &Fields(&self.store), id, default)
    }

    fn set_property_value(
        &self,
        ctx: &RequestContext,
        id: &str,
        value: Option<Value>,
    ) -> Result<(), MemoryError> {
        match value {
            Some(value) => self.cache.write(ctx, id, value),
            None => self.cache.remove(ctx, &Fields(&self.store), id),
        }
    }

    fn delete_property_value(&self, ctx: &RequestContext, id: &str) -> Result<(), MemoryError> {
        self.cache.remove(ctx, &Fields(&self.store), id)
    }

    fn collect_observers(&self, out: &mut Vec<Observer>) -> Result<(), MemoryError> {
        self.events.extend_into(out)
    }

    fn on_event(&self, observer: Observer) -> Result<(), MemoryError> {
        self.events.push(observer)
    }
}
