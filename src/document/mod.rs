//! Composite documents.
//!
//! A [`Document`] is an accessor assembled from named child accessors. Its
//! value is a record: reads flatten the children's values, writes decompose a
//! record into per-child partial updates. The node children point to is a
//! separate [`DocumentSlot`], so a child never keeps its document alive and
//! ownership stays acyclic.

mod temporary;

use std::fmt;
use std::sync::{Arc, RwLock, RwLockWriteGuard};

use log::warn;

pub use temporary::TemporaryDocument;

use crate::accessor::{guard, Bindable, ParentRef, Property, PropertyCore, PropertyParent};
use crate::context::RequestContext;
use crate::error::MemoryError;
use crate::events::Observer;
use crate::identity::{IdRef, IntoIdResolver, StaticId};
use crate::store::DocumentContainer;
use crate::value::{Record, Value};

/// The parent node a document's children are bound to.
pub struct DocumentSlot {
    core: PropertyCore,
}

impl DocumentSlot {
    fn new(core: PropertyCore) -> Self {
        Self { core }
    }

    /// This document's record, materialized as `{}` in the parent when absent.
    fn load(&self, ctx: &RequestContext) -> Result<(String, Record), MemoryError> {
        let doc_id = self.core.resolve_id(ctx)?;
        let stored = self
            .core
            .parent()?
            .get_property_value(ctx, &doc_id, Some(Value::empty_map()))?;
        let record = match stored {
            Some(Value::Map(record)) => record,
            Some(Value::Null) | None => Record::new(),
            Some(other) => {
                return Err(MemoryError::InvalidRecord(format!(
                    "'{}' holds a {} instead of a record",
                    doc_id,
                    other.kind()
                )))
            }
        };
        Ok((doc_id, record))
    }

    fn save(&self, ctx: &RequestContext, doc_id: &str, record: Record) -> Result<(), MemoryError> {
        self.core
            .parent()?
            .set_property_value(ctx, doc_id, Some(Value::Map(record)))
    }
}

impl PropertyParent for DocumentSlot {
    fn path(&self, ctx: &RequestContext) -> Result<String, MemoryError> {
        let id = self.core.resolve_id(ctx)?;
        let parent_path = self.core.parent()?.path(ctx)?;
        if parent_path.is_empty() {
            Ok(id)
        } else {
            Ok(format!("{}.{}", parent_path, id))
        }
    }

    fn get_property_value(
        &self,
        ctx: &RequestContext,
        id: &str,
        default: Option<Value>,
    ) -> Result<Option<Value>, MemoryError> {
        let (doc_id, mut record) = self.load(ctx)?;
        if let Some(value) = record.get(id) {
            return Ok(Some(value.clone()));
        }
        match default {
            Some(default) => {
                record.insert(id.to_string(), default.clone());
                self.save(ctx, &doc_id, record)?;
                Ok(Some(default))
            }
            None => Ok(None),
        }
    }

    fn set_property_value(
        &self,
        ctx: &RequestContext,
        id: &str,
        value: Option<Value>,
    ) -> Result<(), MemoryError> {
        let (doc_id, mut record) = self.load(ctx)?;
        match value {
            Some(value) => {
                record.insert(id.to_string(), value);
            }
            None => {
                record.remove(id);
            }
        }
        self.save(ctx, &doc_id, record)
    }

    fn delete_property_value(&self, ctx: &RequestContext, id: &str) -> Result<(), MemoryError> {
        let (doc_id, mut record) = self.load(ctx)?;
        if record.remove(id).is_some() {
            self.save(ctx, &doc_id, record)?;
        }
        Ok(())
    }

    fn collect_observers(&self, out: &mut Vec<Observer>) -> Result<(), MemoryError> {
        self.core.collect_observers(out)
    }

    fn on_event(&self, observer: Observer) -> Result<(), MemoryError> {
        self.core.events().push(observer)
    }

    fn container(&self) -> Option<Arc<dyn DocumentContainer>> {
        self.core.parent_ref().and_then(|parent| parent.container())
    }
}

pub struct Document {
    slot: Arc<DocumentSlot>,
    properties: RwLock<Vec<Arc<dyn Property>>>,
}

impl Document {
    /// A standalone document backed by a [`TemporaryDocument`] until bound.
    pub fn new(id: impl IntoIdResolver) -> Self {
        let core = PropertyCore::new(id).with_parent(Arc::new(TemporaryDocument::new()));
        Self::from_core(core)
    }

    /// A standalone document with an empty id.
    pub fn unnamed() -> Self {
        Self::new(StaticId::default())
    }

    fn from_core(core: PropertyCore) -> Self {
        Self {
            slot: Arc::new(DocumentSlot::new(core)),
            properties: RwLock::new(Vec::new()),
        }
    }

    /// The node this document's children are bound to.
    pub fn slot(&self) -> ParentRef {
        Arc::clone(&self.slot) as ParentRef
    }

    /// Bind a copy of `prototype` to this document and return it.
    ///
    /// A poisoned child list is recovered, so the child is always registered.
    pub fn add_property<P: Bindable>(&self, prototype: &P) -> Arc<P> {
        let property = Arc::new(prototype.attach(self.slot()));
        self.properties_mut()
            .push(Arc::clone(&property) as Arc<dyn Property>);
        property
    }

    /// Builder form of [`Document::add_property`] for prototypes.
    pub fn with_property<P: Bindable>(self, prototype: P) -> Self {
        self.add_property(&prototype);
        self
    }

    fn properties_mut(&self) -> RwLockWriteGuard<'_, Vec<Arc<dyn Property>>> {
        self.properties.write().unwrap_or_else(|poisoned| {
            warn!("document property list was poisoned, recovering");
            self.properties.clear_poison();
            poisoned.into_inner()
        })
    }

    fn snapshot(&self) -> Result<Vec<Arc<dyn Property>>, MemoryError> {
        Ok(self
            .properties
            .read()
            .map_err(|_| MemoryError::LockPoisoned("document property list"))?
            .clone())
    }

    pub fn for_each_property(
        &self,
        mut f: impl FnMut(usize, &Arc<dyn Property>),
    ) -> Result<(), MemoryError> {
        for (index, property) in self.snapshot()?.iter().enumerate() {
            f(index, property);
        }
        Ok(())
    }

    /// The child whose id resolves to `id` for this request.
    pub fn find_property(
        &self,
        ctx: &RequestContext,
        id: &str,
    ) -> Result<Option<Arc<dyn Property>>, MemoryError> {
        for property in self.snapshot()? {
            if property.id(ctx)? == id {
                return Ok(Some(property));
            }
        }
        Ok(None)
    }

    pub fn property_count(&self) -> usize {
        self.properties.read().map(|list| list.len()).unwrap_or(0)
    }

    fn replace_properties(&self, children: Vec<Arc<dyn Property>>) {
        *self.properties_mut() = children;
    }

    fn has_value(&self, ctx: &RequestContext) -> Result<bool, MemoryError> {
        let doc_id = self.slot.core.resolve_id(ctx)?;
        Ok(self
            .slot
            .core
            .parent()?
            .get_property_value(ctx, &doc_id, None)?
            .is_some())
    }
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("core", &self.slot.core)
            .field("properties", &self.property_count())
            .finish()
    }
}

impl Property for Document {
    fn core(&self) -> &PropertyCore {
        &self.slot.core
    }

    fn validate(&self, ctx: &RequestContext, value: Option<&Value>) -> Result<(), MemoryError> {
        guard(self.core(), ctx, value, "record", |value| matches!(value, Value::Map(_)))
    }

    /// Treats `value` as a partial record: only children it names are
    /// compared.
    fn on_has_changed(
        &self,
        ctx: &RequestContext,
        value: Option<&Value>,
    ) -> Result<bool, MemoryError> {
        let has_value = self.has_value(ctx)?;
        let record = match value {
            Some(Value::Map(record)) => record,
            Some(_) => return Ok(true),
            None => return Ok(has_value),
        };
        if !has_value {
            return Ok(true);
        }
        for property in self.snapshot()? {
            let id = property.id(ctx)?;
            if let Some(value) = record.get(&id) {
                if property.has_changed(ctx, Some(value))? {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }

    fn on_get(
        &self,
        ctx: &RequestContext,
        default: Option<Value>,
    ) -> Result<Option<Value>, MemoryError> {
        if default.is_none() && !self.has_value(ctx)? {
            return Ok(None);
        }
        let defaults = default.and_then(Value::into_map).unwrap_or_default();
        let mut record = Record::new();
        for property in self.snapshot()? {
            let id = property.id(ctx)?;
            if let Some(value) = property.get_with(ctx, defaults.get(&id).cloned())? {
                record.insert(id, value);
            }
        }
        Ok(Some(Value::Map(record)))
    }

    /// Partial update: each named child is set on its own, keeping its own
    /// change detection and events. `None` clears the document.
    fn on_set(&self, ctx: &RequestContext, value: Option<Value>) -> Result<(), MemoryError> {
        self.validate(ctx, value.as_ref())?;
        let mut record = match value {
            Some(Value::Map(record)) => record,
            _ => return self.on_delete(ctx),
        };
        for property in self.snapshot()? {
            let id = property.id(ctx)?;
            if let Some(value) = record.remove(&id) {
                property.set(ctx, value)?;
            }
        }
        Ok(())
    }

    fn create_accessor(&self, id: Option<IdRef>, parent: Option<ParentRef>) -> Arc<dyn Property> {
        Arc::new(self.rebind(id, parent))
    }
}

impl Bindable for Document {
    /// Build the slot from `core` and rebind every child to it.
    fn with_core(&self, core: PropertyCore) -> Self {
        let core = match core.parent_ref() {
            Some(_) => core,
            None => core.with_parent(Arc::new(TemporaryDocument::new())),
        };
        let copy = Self::from_core(core);
        let slot = copy.slot();
        let children = self
            .properties
            .read()
            .unwrap_or_else(|poisoned| {
                warn!("copying children from a poisoned document property list");
                poisoned.into_inner()
            })
            .iter()
            .map(|property| property.create_accessor(None, Some(Arc::clone(&slot))))
            .collect();
        copy.replace_properties(children);
        copy
    }

    /// Without a parent the copy gets a fresh temporary one.
    fn rebind(&self, id: Option<IdRef>, parent: Option<ParentRef>) -> Self {
        let parent = parent.unwrap_or_else(|| Arc::new(TemporaryDocument::new()) as ParentRef);
        self.with_core(self.core().rebind(id, Some(parent)))
    }
}
