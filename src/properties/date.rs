use std::sync::Arc;

use crate::accessor::{guard, Bindable, ParentRef, Property, PropertyCore};
use crate::context::RequestContext;
use crate::error::MemoryError;
use crate::identity::{IdRef, IntoIdResolver};
use crate::value::{format_timestamp, parse_timestamp, Value};

/// A date property. Callers see [`Value::Date`]; the slot holds the RFC 3339
/// text with millisecond precision.
#[derive(Debug, Clone)]
pub struct DateProperty {
    core: PropertyCore,
}

impl DateProperty {
    pub fn new(id: impl IntoIdResolver) -> Self {
        Self {
            core: PropertyCore::new(id),
        }
    }
}

fn encode(value: Option<Value>) -> Option<Value> {
    match value {
        Some(Value::Date(date)) => Some(Value::String(format_timestamp(&date))),
        other => other,
    }
}

impl Property for DateProperty {
    fn core(&self) -> &PropertyCore {
        &self.core
    }

    fn validate(&self, ctx: &RequestContext, value: Option<&Value>) -> Result<(), MemoryError> {
        guard(&self.core, ctx, value, "date", |value| {
            matches!(value, Value::Date(_))
        })
    }

    fn on_has_changed(
        &self,
        ctx: &RequestContext,
        value: Option<&Value>,
    ) -> Result<bool, MemoryError> {
        let stored = self.core.current(ctx)?;
        let stored = stored.as_ref().and_then(Value::as_str);
        Ok(match (value, stored) {
            (Some(Value::Date(date)), Some(stored)) => stored != format_timestamp(date),
            (Some(_), _) => true,
            (None, stored) => stored.is_some(),
        })
    }

    fn on_set(&self, ctx: &RequestContext, value: Option<Value>) -> Result<(), MemoryError> {
        self.validate(ctx, value.as_ref())?;
        let id = self.core.resolve_id(ctx)?;
        self.core.parent()?.set_property_value(ctx, &id, encode(value))
    }

    fn decode(&self, stored: Value) -> Result<Value, MemoryError> {
        match stored {
            Value::String(text) => parse_timestamp(&text)
                .map(Value::Date)
                .ok_or_else(|| MemoryError::Serde(format!("'{}' is not an RFC 3339 timestamp", text))),
            Value::Date(date) => Ok(Value::Date(date)),
            other => Err(MemoryError::Serde(format!(
                "expected a timestamp, found {}",
                other.kind()
            ))),
        }
    }

    fn create_accessor(&self, id: Option<IdRef>, parent: Option<ParentRef>) -> Arc<dyn Property> {
        Arc::new(self.rebind(id, parent))
    }
}

impl Bindable for DateProperty {
    fn with_core(&self, core: PropertyCore) -> Self {
        Self { core }
    }
}
