use std::sync::Arc;

use crate::accessor::{guard, Bindable, ParentRef, Property, PropertyCore};
use crate::context::RequestContext;
use crate::error::MemoryError;
use crate::identity::{IdRef, IntoIdResolver};
use crate::value::{Record, Value};

use super::array::ArrayProperty;
use super::reference::{assigned_id, project, reachable_container, DocumentSource};

/// An array of document ids with helpers to fetch, write and delete the
/// referenced documents.
#[derive(Debug, Clone)]
pub struct DocumentReferenceArrayProperty {
    array: Arc<ArrayProperty>,
}

impl DocumentReferenceArrayProperty {
    pub fn new(id: impl IntoIdResolver) -> Self {
        Self {
            array: Arc::new(ArrayProperty::new(id)),
        }
    }

    /// The underlying id list, for positional access and item views.
    pub fn ids(&self) -> &Arc<ArrayProperty> {
        &self.array
    }

    fn load_ids(&self, ctx: &RequestContext) -> Result<Vec<String>, MemoryError> {
        Ok(self
            .get(ctx)?
            .and_then(Value::into_array)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|value| match value {
                Value::String(id) => Some(id),
                _ => None,
            })
            .collect())
    }

    fn out_of_range(&self, ctx: &RequestContext, index: usize, len: usize) -> MemoryError {
        MemoryError::IndexOutOfRange {
            property: self.core().resolve_id(ctx).unwrap_or_default(),
            index,
            len,
        }
    }

    pub fn read_document<P: Bindable>(
        &self,
        ctx: &RequestContext,
        index: usize,
        prototype: &P,
    ) -> Result<Option<P>, MemoryError> {
        let container = reachable_container(self.core())?;
        let ids = self.load_ids(ctx)?;
        let id = ids
            .get(index)
            .ok_or_else(|| self.out_of_range(ctx, index, ids.len()))?;
        if id.is_empty() {
            return Ok(None);
        }
        Ok(container
            .read(id)?
            .map(|record| project(id, record, self.core().parent_ref().cloned(), prototype)))
    }

    /// Create or replace a document and insert its id at `position`
    /// (appended when `None`).
    pub fn upsert_document<'a>(
        &self,
        ctx: &RequestContext,
        source: impl Into<DocumentSource<'a>>,
        position: Option<usize>,
    ) -> Result<Record, MemoryError> {
        let container = reachable_container(self.core())?;
        let len = self.load_ids(ctx)?.len();
        if let Some(index) = position.filter(|index| *index > len) {
            return Err(self.out_of_range(ctx, index, len));
        }
        let source = source.into();
        let stored = container.upsert(source.materialize(ctx)?)?;
        let id = assigned_id(&stored)?;
        self.array.insert_item(ctx, Value::from(id.as_str()), position)?;
        source.link(ctx, &id)?;
        Ok(stored)
    }

    /// Replace an existing document. Its id is appended if not yet listed.
    pub fn replace_document<'a>(
        &self,
        ctx: &RequestContext,
        source: impl Into<DocumentSource<'a>>,
    ) -> Result<Record, MemoryError> {
        let container = reachable_container(self.core())?;
        let source = source.into();
        let stored = container.replace(source.materialize(ctx)?)?;
        let id = assigned_id(&stored)?;
        if !self.load_ids(ctx)?.contains(&id) {
            self.array.insert_item(ctx, Value::from(id.as_str()), None)?;
        }
        source.link(ctx, &id)?;
        Ok(stored)
    }

    /// Delete the document at `position` (the last one when `None`) and
    /// remove its id from the list.
    pub fn delete_document(
        &self,
        ctx: &RequestContext,
        position: Option<usize>,
    ) -> Result<bool, MemoryError> {
        let container = reachable_container(self.core())?;
        let ids = self.load_ids(ctx)?;
        let id = match position {
            Some(index) => ids
                .get(index)
                .ok_or_else(|| self.out_of_range(ctx, index, ids.len()))?,
            None => match ids.last() {
                Some(id) => id,
                None => return Ok(false),
            },
        };
        let deleted = container.delete(id)?;
        self.array.delete_item(ctx, position)?;
        Ok(deleted)
    }
}

impl Property for DocumentReferenceArrayProperty {
    fn core(&self) -> &PropertyCore {
        self.array.core()
    }

    fn validate(&self, ctx: &RequestContext, value: Option<&Value>) -> Result<(), MemoryError> {
        guard(self.core(), ctx, value, "array of document ids", |value| {
            value
                .as_array()
                .map(|items| items.iter().all(|item| item.as_str().is_some()))
                .unwrap_or(false)
        })
    }

    fn on_has_changed(
        &self,
        ctx: &RequestContext,
        value: Option<&Value>,
    ) -> Result<bool, MemoryError> {
        self.array.on_has_changed(ctx, value)
    }

    fn create_accessor(&self, id: Option<IdRef>, parent: Option<ParentRef>) -> Arc<dyn Property> {
        Arc::new(self.rebind(id, parent))
    }
}

impl Bindable for DocumentReferenceArrayProperty {
    fn with_core(&self, core: PropertyCore) -> Self {
        Self {
            array: Arc::new(self.array.with_core(core)),
        }
    }
}
