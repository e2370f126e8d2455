use std::sync::Arc;

use crate::accessor::{emit, guard, new_event, Bindable, ParentRef, Property, PropertyCore};
use crate::context::RequestContext;
use crate::error::MemoryError;
use crate::events::{CollectionKey, EventKind, PropertyEvent};
use crate::identity::{IdRef, IntoIdResolver, StaticId};
use crate::value::Value;

use super::items::ArrayItemView;

/// How far past the end `set_item_value` may write.
pub const MAX_ITEM_GAP: usize = 1024;

/// An ordered list property with positional mutation primitives.
#[derive(Debug, Clone)]
pub struct ArrayProperty {
    core: PropertyCore,
}

impl ArrayProperty {
    pub fn new(id: impl IntoIdResolver) -> Self {
        Self {
            core: PropertyCore::new(id),
        }
    }

    fn load(&self, ctx: &RequestContext) -> Result<Option<Vec<Value>>, MemoryError> {
        Ok(self.core.current(ctx)?.and_then(Value::into_array))
    }

    fn store(&self, ctx: &RequestContext, items: Vec<Value>) -> Result<(), MemoryError> {
        let id = self.core.resolve_id(ctx)?;
        self.core
            .parent()?
            .set_property_value(ctx, &id, Some(Value::Array(items)))
    }

    pub fn length(&self, ctx: &RequestContext) -> Result<usize, MemoryError> {
        self.core.ensure_configured()?;
        Ok(self.load(ctx)?.map(|items| items.len()).unwrap_or(0))
    }

    pub fn get_item_value(
        &self,
        ctx: &RequestContext,
        position: usize,
    ) -> Result<Option<Value>, MemoryError> {
        self.core.ensure_configured()?;
        Ok(self
            .load(ctx)?
            .and_then(|mut items| (position < items.len()).then(|| items.swap_remove(position))))
    }

    /// Overwrite one slot, padding with nulls when `position` is past the end.
    /// At most [`MAX_ITEM_GAP`] nulls are padded.
    pub fn set_item_value(
        &self,
        ctx: &RequestContext,
        position: usize,
        value: Value,
    ) -> Result<(), MemoryError> {
        self.core.ensure_configured()?;
        let mut items = self.load(ctx)?.unwrap_or_default();
        if position >= items.len() {
            if position - items.len() > MAX_ITEM_GAP {
                return Err(MemoryError::IndexOutOfRange {
                    property: self.core.resolve_id(ctx)?,
                    index: position,
                    len: items.len(),
                });
            }
            items.resize(position, Value::Null);
            items.push(value);
        } else {
            items[position] = value;
        }
        self.store(ctx, items)
    }

    /// Insert `value` at `position`, or append when `position` is `None`.
    /// Positions past the end append.
    pub fn insert_item(
        &self,
        ctx: &RequestContext,
        value: Value,
        position: Option<usize>,
    ) -> Result<(), MemoryError> {
        self.core.ensure_configured()?;
        let event = new_event(
            self,
            ctx,
            EventKind::CollectionInsert {
                key: CollectionKey::Position(position),
                value,
            },
        )?;
        emit(self, ctx, event, |ctx: &RequestContext, ev: &mut PropertyEvent| {
            let value = ev.take_value().unwrap_or(Value::Null);
            let mut items = self.load(ctx)?.unwrap_or_default();
            match position {
                Some(position) => items.insert(position.min(items.len()), value),
                None => items.push(value),
            }
            self.store(ctx, items)
        })?;
        Ok(())
    }

    /// Remove the item at `position`, or the last item when `position` is
    /// `None`. Out-of-range positions leave the list untouched.
    pub fn delete_item(
        &self,
        ctx: &RequestContext,
        position: Option<usize>,
    ) -> Result<(), MemoryError> {
        self.core.ensure_configured()?;
        let event = new_event(
            self,
            ctx,
            EventKind::CollectionDelete {
                key: CollectionKey::Position(position),
            },
        )?;
        emit(self, ctx, event, |ctx: &RequestContext, _: &mut PropertyEvent| {
            let mut items = match self.load(ctx)? {
                Some(items) => items,
                None => return Ok(()),
            };
            let removed = match position {
                Some(position) if position < items.len() => Some(items.remove(position)),
                Some(_) => None,
                None => items.pop(),
            };
            match removed {
                Some(_) => self.store(ctx, items),
                None => Ok(()),
            }
        })?;
        Ok(())
    }

    /// View one position as an independent accessor shaped like `prototype`.
    pub fn item<P: Bindable>(self: &Arc<Self>, position: usize, prototype: &P) -> P {
        prototype.bind(
            StaticId::new(position.to_string()),
            Arc::new(ArrayItemView::new(Arc::clone(self))),
        )
    }
}

impl Property for ArrayProperty {
    fn core(&self) -> &PropertyCore {
        &self.core
    }

    fn validate(&self, ctx: &RequestContext, value: Option<&Value>) -> Result<(), MemoryError> {
        guard(&self.core, ctx, value, "array", |value| {
            matches!(value, Value::Array(_))
        })
    }

    fn on_has_changed(
        &self,
        ctx: &RequestContext,
        value: Option<&Value>,
    ) -> Result<bool, MemoryError> {
        let current = self.core.current(ctx)?.filter(|current| current.as_array().is_some());
        Ok(match (value, current) {
            (Some(value), Some(current)) if value.as_array().is_some() => {
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

impl Bindable for ArrayProperty {
    fn with_core(&self, core: PropertyCore) -> Self {
        Self { core }
    }
}
