//! Item views: present one slot of a collection as the parent of an
//! independent accessor. Views own nothing; storage and observers are the
//! collection's.

use std::sync::Arc;

use crate::accessor::{PropertyParent, Property};
use crate::context::RequestContext;
use crate::error::MemoryError;
use crate::events::Observer;
use crate::store::DocumentContainer;
use crate::value::Value;

use super::array::ArrayProperty;
use super::map::MapProperty;

fn parse_position(id: &str) -> Result<usize, MemoryError> {
    id.parse()
        .map_err(|_| MemoryError::InvalidItemKey(id.to_string()))
}

pub struct ArrayItemView {
    array: Arc<ArrayProperty>,
}

impl ArrayItemView {
    pub fn new(array: Arc<ArrayProperty>) -> Self {
        Self { array }
    }
}

impl PropertyParent for ArrayItemView {
    fn path(&self, ctx: &RequestContext) -> Result<String, MemoryError> {
        self.array.path(ctx)
    }

    fn get_property_value(
        &self,
        ctx: &RequestContext,
        id: &str,
        _default: Option<Value>,
    ) -> Result<Option<Value>, MemoryError> {
        self.array.get_item_value(ctx, parse_position(id)?)
    }

    fn set_property_value(
        &self,
        ctx: &RequestContext,
        id: &str,
        value: Option<Value>,
    ) -> Result<(), MemoryError> {
        self.array
            .set_item_value(ctx, parse_position(id)?, value.unwrap_or(Value::Null))
    }

    fn delete_property_value(&self, ctx: &RequestContext, id: &str) -> Result<(), MemoryError> {
        self.array.delete_item(ctx, Some(parse_position(id)?))
    }

    fn collect_observers(&self, out: &mut Vec<Observer>) -> Result<(), MemoryError> {
        self.array.core().collect_observers(out)
    }

    fn on_event(&self, observer: Observer) -> Result<(), MemoryError> {
        self.array.on_event(observer)
    }

    fn container(&self) -> Option<Arc<dyn DocumentContainer>> {
        self.array.core().parent_ref().and_then(|parent| parent.container())
    }
}

pub struct MapItemView {
    map: Arc<MapProperty>,
}

impl MapItemView {
    pub fn new(map: Arc<MapProperty>) -> Self {
        Self { map }
    }
}

impl PropertyParent for MapItemView {
    fn path(&self, ctx: &RequestContext) -> Result<String, MemoryError> {
        self.map.path(ctx)
    }

    fn get_property_value(
        &self,
        ctx: &RequestContext,
        id: &str,
        _default: Option<Value>,
    ) -> Result<Option<Value>, MemoryError> {
        self.map.get_item_value(ctx, id)
    }

    fn set_property_value(
        &self,
        ctx: &RequestContext,
        id: &str,
        value: Option<Value>,
    ) -> Result<(), MemoryError> {
        match value {
            Some(value) => self.map.set_item_value(ctx, id, value),
            None => self.map.delete_item(ctx, id),
        }
    }

    fn delete_property_value(&self, ctx: &RequestContext, id: &str) -> Result<(), MemoryError> {
        self.map.delete_item(ctx, id)
    }

    fn collect_observers(&self, out: &mut Vec<Observer>) -> Result<(), MemoryError> {
        self.map.core().collect_observers(out)
    }

    fn on_event(&self, observer: Observer) -> Result<(), MemoryError> {
        self.map.on_event(observer)
    }

    fn container(&self) -> Option<Arc<dyn DocumentContainer>> {
        self.map.core().parent_ref().and_then(|parent| parent.container())
    }
}
