use std::sync::Arc;

use crate::accessor::{emit, guard, new_event, Bindable, ParentRef, Property, PropertyCore};
use crate::context::RequestContext;
use crate::error::MemoryError;
use crate::events::{CollectionKey, EventKind, PropertyEvent};
use crate::identity::{IdRef, IntoIdResolver, StaticId};
use crate::value::{Record, Value};

use super::items::MapItemView;

/// A keyed collection property.
#[derive(Debug, Clone)]
pub struct MapProperty {
    core: PropertyCore,
}

impl MapProperty {
    pub fn new(id: impl IntoIdResolver) -> Self {
        Self {
            core: PropertyCore::new(id),
        }
    }

    fn load(&self, ctx: &RequestContext) -> Result<Option<Record>, MemoryError> {
        Ok(self.core.current(ctx)?.and_then(Value::into_map))
    }

    fn store(&self, ctx: &RequestContext, record: Record) -> Result<(), MemoryError> {
        let id = self.core.resolve_id(ctx)?;
        self.core
            .parent()?
            .set_property_value(ctx, &id, Some(Value::Map(record)))
    }

    pub fn keys(&self, ctx: &RequestContext) -> Result<Vec<String>, MemoryError> {
        self.core.ensure_configured()?;
        Ok(self
            .load(ctx)?
            .map(|record| record.into_keys().collect())
            .unwrap_or_default())
    }

    pub fn get_item_value(
        &self,
        ctx: &RequestContext,
        key: &str,
    ) -> Result<Option<Value>, MemoryError> {
        self.core.ensure_configured()?;
        Ok(self.load(ctx)?.and_then(|mut record| record.remove(key)))
    }

    pub fn set_item_value(
        &self,
        ctx: &RequestContext,
        key: &str,
        value: Value,
    ) -> Result<(), MemoryError> {
        self.core.ensure_configured()?;
        let mut record = self.load(ctx)?.unwrap_or_default();
        record.insert(key.to_string(), value);
        self.store(ctx, record)
    }

    pub fn insert_item(
        &self,
        ctx: &RequestContext,
        key: &str,
        value: Value,
    ) -> Result<(), MemoryError> {
        self.core.ensure_configured()?;
        let event = new_event(
            self,
            ctx,
            EventKind::CollectionInsert {
                key: CollectionKey::Key(key.to_string()),
                value,
            },
        )?;
        emit(self, ctx, event, |ctx: &RequestContext, ev: &mut PropertyEvent| {
            let value = ev.take_value().unwrap_or(Value::Null);
            let mut record = self.load(ctx)?.unwrap_or_default();
            record.insert(key.to_string(), value);
            self.store(ctx, record)
        })?;
        Ok(())
    }

    /// Insert the current value of another accessor under `key`. Nothing is
    /// inserted when that accessor has no value.
    pub fn insert_item_from(
        &self,
        ctx: &RequestContext,
        key: &str,
        source: &dyn Property,
    ) -> Result<(), MemoryError> {
        match source.get(ctx)? {
            Some(value) => self.insert_item(ctx, key, value),
            None => Ok(()),
        }
    }

    pub fn delete_item(&self, ctx: &RequestContext, key: &str) -> Result<(), MemoryError> {
        self.core.ensure_configured()?;
        let event = new_event(
            self,
            ctx,
            EventKind::CollectionDelete {
                key: CollectionKey::Key(key.to_string()),
            },
        )?;
        emit(self, ctx, event, |ctx: &RequestContext, _: &mut PropertyEvent| {
            let mut record = match self.load(ctx)? {
                Some(record) => record,
                None => return Ok(()),
            };
            match record.remove(key) {
                Some(_) => self.store(ctx, record),
                None => Ok(()),
            }
        })?;
        Ok(())
    }

    /// View one key as an independent accessor shaped like `prototype`.
    pub fn item<P: Bindable>(self: &Arc<Self>, key: &str, prototype: &P) -> P {
        prototype.bind(
            StaticId::new(key),
            Arc::new(MapItemView::new(Arc::clone(self))),
        )
    }
}

impl Property for MapProperty {
    fn core(&self) -> &PropertyCore {
        &self.core
    }

    fn validate(&self, ctx: &RequestContext, value: Option<&Value>) -> Result<(), MemoryError> {
        guard(&self.core, ctx, value, "map", |value| matches!(value, Value::Map(_)))
    }

    fn on_has_changed(
        &self,
        ctx: &RequestContext,
        value: Option<&Value>,
    ) -> Result<bool, MemoryError> {
        let current = self.core.current(ctx)?.filter(|current| current.as_map().is_some());
        Ok(match (value, current) {
            (Some(value), Some(current)) if value.as_map().is_some() => {
                !current.structurally_eq(value)
            }
            (Some(_), _) => true,
            (None, current) => current.is_some(),
        })
    }

    fn create_accessor(&self, id: Option<IdRef>, parent: Option<ParentRef>) -> Arc<dyn Property> {
        Arc::new(self.rebind(id, parent))
    }
}

impl Bindable for MapProperty {
    fn with_core(&self, core: PropertyCore) -> Self {
        Self { core }
    }
}
