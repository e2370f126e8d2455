use std::sync::Arc;

use crate::accessor::{Bindable, ParentRef, Property, PropertyCore};
use crate::context::RequestContext;
use crate::error::MemoryError;
use crate::identity::{IdRef, IntoIdResolver};
use crate::value::{Value, ValueKind};

/// An untyped property. Accepts any value.
#[derive(Debug, Clone)]
pub struct AnyProperty {
    core: PropertyCore,
}

impl AnyProperty {
    pub fn new(id: impl IntoIdResolver) -> Self {
        Self {
            core: PropertyCore::new(id),
        }
    }
}

/// Kind-aware comparison: different kinds always differ, containers compare
/// structurally, everything else by value.
fn differs(current: &Value, value: &Value) -> bool {
    if current.kind() != value.kind() {
        return true;
    }
    match current.kind() {
        ValueKind::Array | ValueKind::Map => !current.structurally_eq(value),
        _ => current != value,
    }
}

impl Property for AnyProperty {
    fn core(&self) -> &PropertyCore {
        &self.core
    }

    fn on_has_changed(
        &self,
        ctx: &RequestContext,
        value: Option<&Value>,
    ) -> Result<bool, MemoryError> {
        let current = self.core.current(ctx)?;
        Ok(match (current.as_ref(), value) {
            (None, None) => false,
            (Some(current), Some(value)) => differs(current, value),
            _ => true,
        })
    }

    fn create_accessor(&self, id: Option<IdRef>, parent: Option<ParentRef>) -> Arc<dyn Property> {
        Arc::new(self.rebind(id, parent))
    }
}

impl Bindable for AnyProperty {
    fn with_core(&self, core: PropertyCore) -> Self {
        Self { core }
    }
}
