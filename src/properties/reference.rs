use std::sync::Arc;

use crate::accessor::{Bindable, ParentRef, Property, PropertyCore};
use crate::context::RequestContext;
use crate::document::TemporaryDocument;
use crate::error::MemoryError;
use crate::identity::{IdRef, IntoIdResolver};
use crate::store::{record_id, DocumentContainer};
use crate::value::{Record, Value};

use super::scalar::StringProperty;

/// What to write to a container: a raw record or the current value of
/// another accessor.
pub enum DocumentSource<'a> {
    Record(Record),
    Accessor(&'a dyn Property),
}

impl<'a> DocumentSource<'a> {
    pub(crate) fn materialize(&self, ctx: &RequestContext) -> Result<Record, MemoryError> {
        match self {
            DocumentSource::Record(record) => Ok(record.clone()),
            DocumentSource::Accessor(accessor) => match accessor.get(ctx)? {
                Some(Value::Map(record)) => Ok(record),
                Some(other) => Err(MemoryError::InvalidRecord(format!(
                    "expected a record, found {}",
                    other.kind()
                ))),
                None => Err(MemoryError::InvalidRecord("source accessor has no value".into())),
            },
        }
    }

    /// Push the assigned id back into a source accessor so its observers see
    /// the link.
    pub(crate) fn link(&self, ctx: &RequestContext, id: &str) -> Result<(), MemoryError> {
        if let DocumentSource::Accessor(accessor) = self {
            let mut record = Record::new();
            record.insert("id".to_string(), Value::from(id));
            accessor.set(ctx, Value::Map(record))?;
        }
        Ok(())
    }
}

impl From<Record> for DocumentSource<'_> {
    fn from(record: Record) -> Self {
        DocumentSource::Record(record)
    }
}

impl<'a> From<&'a dyn Property> for DocumentSource<'a> {
    fn from(accessor: &'a dyn Property) -> Self {
        DocumentSource::Accessor(accessor)
    }
}

/// The container reachable from `core`'s parent chain.
pub(crate) fn reachable_container(
    core: &PropertyCore,
) -> Result<Arc<dyn DocumentContainer>, MemoryError> {
    core.parent_ref()
        .and_then(|parent| parent.container())
        .ok_or(MemoryError::StoreUnavailable)
}

pub(crate) fn assigned_id(record: &Record) -> Result<String, MemoryError> {
    record_id(record)
        .map(str::to_string)
        .ok_or_else(|| MemoryError::InvalidRecord("container returned a record without an id".into()))
}

/// Wrap a fetched record so `prototype` can be projected onto it. Events
/// raised through the projection bubble to `parent`.
pub(crate) fn project<P: Bindable>(
    id: &str,
    record: Record,
    parent: Option<ParentRef>,
    prototype: &P,
) -> P {
    let body = TemporaryDocument::with_body(Value::Map(record), parent);
    prototype.bind(id.to_string(), Arc::new(body))
}

/// A string property holding the id of a document in the reachable
/// container, with helpers to fetch, write and delete that document.
#[derive(Debug, Clone)]
pub struct DocumentReferenceProperty {
    string: StringProperty,
}

impl DocumentReferenceProperty {
    pub fn new(id: impl IntoIdResolver) -> Self {
        Self {
            string: StringProperty::new(id),
        }
    }

    fn referenced_id(&self, ctx: &RequestContext) -> Result<Option<String>, MemoryError> {
        Ok(self
            .get(ctx)?
            .and_then(|value| value.as_str().map(str::to_string))
            .filter(|id| !id.is_empty()))
    }

    /// Fetch the referenced document and project `prototype` onto it.
    pub fn read_document<P: Bindable>(
        &self,
        ctx: &RequestContext,
        prototype: &P,
    ) -> Result<Option<P>, MemoryError> {
        let container = reachable_container(self.core())?;
        let id = match self.referenced_id(ctx)? {
            Some(id) => id,
            None => return Ok(None),
        };
        Ok(container
            .read(&id)?
            .map(|record| project(&id, record, self.core().parent_ref().cloned(), prototype)))
    }

    /// Replace an existing document, then point this reference at it.
    pub fn replace_document<'a>(
        &self,
        ctx: &RequestContext,
        source: impl Into<DocumentSource<'a>>,
    ) -> Result<Record, MemoryError> {
        let container = reachable_container(self.core())?;
        let source = source.into();
        let stored = container.replace(source.materialize(ctx)?)?;
        let id = assigned_id(&stored)?;
        self.set(ctx, Value::from(id.as_str()))?;
        source.link(ctx, &id)?;
        Ok(stored)
    }

    /// Create or replace a document, then point this reference at it.
    pub fn upsert_document<'a>(
        &self,
        ctx: &RequestContext,
        source: impl Into<DocumentSource<'a>>,
    ) -> Result<Record, MemoryError> {
        let container = reachable_container(self.core())?;
        let source = source.into();
        let stored = container.upsert(source.materialize(ctx)?)?;
        let id = assigned_id(&stored)?;
        self.set(ctx, Value::from(id.as_str()))?;
        source.link(ctx, &id)?;
        Ok(stored)
    }

    /// Delete the referenced document. The reference itself is left as is.
    pub fn delete_document(&self, ctx: &RequestContext) -> Result<bool, MemoryError> {
        let container = reachable_container(self.core())?;
        match self.referenced_id(ctx)? {
            Some(id) => container.delete(&id),
            None => Ok(false),
        }
    }
}

impl Property for DocumentReferenceProperty {
    fn core(&self) -> &PropertyCore {
        self.string.core()
    }

    fn validate(&self, ctx: &RequestContext, value: Option<&Value>) -> Result<(), MemoryError> {
        self.string.validate(ctx, value)
    }

    fn on_has_changed(
        &self,
        ctx: &RequestContext,
        value: Option<&Value>,
    ) -> Result<bool, MemoryError> {
        self.string.on_has_changed(ctx, value)
    }

    fn create_accessor(&self, id: Option<IdRef>, parent: Option<ParentRef>) -> Arc<dyn Property> {
        Arc::new(self.rebind(id, parent))
    }
}

impl Bindable for DocumentReferenceProperty {
    fn with_core(&self, core: PropertyCore) -> Self {
        Self {
            string: self.string.with_core(core),
        }
    }
}
