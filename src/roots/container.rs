use std::sync::Arc;

use crate::accessor::{Bindable, ParentRef, Property, PropertyParent};
use crate::cache::{CacheBacking, FlushOptions, FlushPolicy, FlushReport, WriteBackCache};
use crate::context::RequestContext;
use crate::error::MemoryError;
use crate::events::{EventSource, Observer};
use crate::store::DocumentContainer;
use crate::value::Value;

use super::DocumentList;

fn require_record(id: &str, value: &Value) -> Result<(), MemoryError> {
    match value {
        Value::Map(_) => Ok(()),
        other => Err(MemoryError::InvalidRecord(format!(
            "'{}' must be a record, found {}",
            id,
            other.kind()
        ))),
    }
}

/// Adapts a document container to the cache. Slot ids are record ids.
struct Records<'a, C: ?Sized>(&'a C);

impl<C: DocumentContainer + ?Sized> CacheBacking for Records<'_, C> {
    fn load(&self, _ctx: &RequestContext, id: &str) -> Result<Option<Value>, MemoryError> {
        Ok(self.0.read(id)?.map(Value::Map))
    }

    fn write(&self, _ctx: &RequestContext, id: &str, value: &Value) -> Result<(), MemoryError> {
        require_record(id, value)?;
        let mut record = value.as_map().cloned().unwrap_or_default();
        record.insert("id".to_string(), Value::from(id));
        self.0.upsert(record)?;
        Ok(())
    }

    fn remove(&self, _ctx: &RequestContext, id: &str) -> Result<(), MemoryError> {
        self.0.delete(id)?;
        Ok(())
    }
}

/// Root over a [`DocumentContainer`]: each top-level slot is one record.
///
/// A fully successful save clears the request's cache, so later reads see
/// the container again. Reference properties below this root use its
/// container.
pub struct CachedDocumentContainer<C> {
    container: Arc<C>,
    cache: WriteBackCache,
    events: EventSource,
    documents: DocumentList,
}

impl<C: DocumentContainer + 'static> CachedDocumentContainer<C> {
    pub fn new(container: C) -> Arc<Self> {
        Self::with_options(container, FlushOptions::default())
    }

    pub fn with_options(container: C, options: FlushOptions) -> Arc<Self> {
        Arc::new(Self {
            container: Arc::new(container),
            cache: WriteBackCache::new(FlushPolicy::Clear, options),
            events: EventSource::new(),
            documents: DocumentList::default(),
        })
    }

    pub fn store(&self) -> &C {
        &self.container
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

    /// Persist every record changed in this request.
    pub fn save_changes(&self, ctx: &RequestContext) -> Result<FlushReport, MemoryError> {
        self.cache.flush(ctx, &Records(self.container.as_ref()))
    }

    pub fn pending_changes(&self, ctx: &RequestContext) -> Result<usize, MemoryError> {
        self.cache.pending_changes(ctx)
    }

    /// Drop this request's cached records without saving them.
    pub fn discard_changes(&self, ctx: &RequestContext) -> Result<(), MemoryError> {
        self.cache.discard(ctx)
    }
}

impl<C: DocumentContainer + 'static> PropertyParent for CachedDocumentContainer<C> {
    fn path(&self, _ctx: &RequestContext) -> Result<String, MemoryError> {
        Ok(String::new())
    }

    fn get_property_value(
        &self,
        ctx: &RequestContext,
        id: &str,
        default: Option<Value>,
    ) -> Result<Option<Value>, MemoryError> {
        self.cache
            .read(ctx, &Records(self.container.as_ref()), id, default)
    }

    fn set_property_value(
        &self,
        ctx: &RequestContext,
        id: &str,
        value: Option<Value>,
    ) -> Result<(), MemoryError> {
        match value {
            Some(value) => {
                require_record(id, &value)?;
                self.cache.write(ctx, id, value)
            }
            None => self
                .cache
                .remove(ctx, &Records(self.container.as_ref()), id),
        }
    }

    fn delete_property_value(&self, ctx: &RequestContext, id: &str) -> Result<(), MemoryError> {
        self.cache
            .remove(ctx, &Records(self.container.as_ref()), id)
    }

    fn collect_observers(&self, out: &mut Vec<Observer>) -> Result<(), MemoryError> {
        self.events.extend_into(out)
    }

    fn on_event(&self, observer: Observer) -> Result<(), MemoryError> {
        self.events.push(observer)
    }

    fn container(&self) -> Option<Arc<dyn DocumentContainer>> {
        Some(Arc::clone(&self.container) as Arc<dyn DocumentContainer>)
    }
}
