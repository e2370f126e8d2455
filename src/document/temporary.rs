use std::sync::{Arc, Mutex};

use crate::accessor::{ParentRef, PropertyParent};
use crate::context::RequestContext;
use crate::error::MemoryError;
use crate::events::{EventSource, Observer};
use crate::store::DocumentContainer;
use crate::value::Value;

/// An in-process, non-persistent parent holding a single body.
///
/// Unbound documents use one so they can be manipulated standalone, and
/// fetched records are wrapped in one so an accessor shape can be projected
/// onto them. Events and container lookups forward to the optional parent.
#[derive(Default)]
pub struct TemporaryDocument {
    body: Mutex<Option<Value>>,
    parent: Option<ParentRef>,
    events: EventSource,
}

impl TemporaryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(body: Value, parent: Option<ParentRef>) -> Self {
        Self {
            body: Mutex::new(Some(body)),
            parent,
            events: EventSource::new(),
        }
    }

    pub fn body(&self) -> Result<Option<Value>, MemoryError> {
        Ok(self
            .body
            .lock()
            .map_err(|_| MemoryError::LockPoisoned("temporary document read"))?
            .clone())
    }
}

fn stamp_id(body: &mut Value, id: &str) {
    if id.is_empty() {
        return;
    }
    if let Value::Map(record) = body {
        record.insert("id".to_string(), Value::from(id));
    }
}

impl PropertyParent for TemporaryDocument {
    fn path(&self, _ctx: &RequestContext) -> Result<String, MemoryError> {
        Ok(String::new())
    }

    fn get_property_value(
        &self,
        _ctx: &RequestContext,
        id: &str,
        default: Option<Value>,
    ) -> Result<Option<Value>, MemoryError> {
        let mut body = self
            .body
            .lock()
            .map_err(|_| MemoryError::LockPoisoned("temporary document read"))?;
        let value = body.get_or_insert_with(|| default.unwrap_or_else(Value::empty_map));
        stamp_id(value, id);
        Ok(Some(value.clone()))
    }

    fn set_property_value(
        &self,
        _ctx: &RequestContext,
        id: &str,
        value: Option<Value>,
    ) -> Result<(), MemoryError> {
        let mut body = self
            .body
            .lock()
            .map_err(|_| MemoryError::LockPoisoned("temporary document write"))?;
        *body = value;
        if let Some(value) = body.as_mut() {
            stamp_id(value, id);
        }
        Ok(())
    }

    fn delete_property_value(&self, _ctx: &RequestContext, _id: &str) -> Result<(), MemoryError> {
        *self
            .body
            .lock()
            .map_err(|_| MemoryError::LockPoisoned("temporary document delete"))? = None;
        Ok(())
    }

    fn collect_observers(&self, out: &mut Vec<Observer>) -> Result<(), MemoryError> {
        self.events.extend_into(out)?;
        match &self.parent {
            Some(parent) => parent.collect_observers(out),
            None => Ok(()),
        }
    }

    fn on_event(&self, observer: Observer) -> Result<(), MemoryError> {
        self.events.push(observer)
    }

    fn container(&self) -> Option<Arc<dyn DocumentContainer>> {
        self.parent.as_ref().and_then(|parent| parent.container())
    }
}
