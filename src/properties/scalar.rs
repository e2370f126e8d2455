use std::marker::PhantomData;
use std::sync::Arc;

use crate::accessor::{guard, Bindable, ParentRef, Property, PropertyCore};
use crate::context::RequestContext;
use crate::error::MemoryError;
use crate::identity::{IdRef, IntoIdResolver};
use crate::value::{Value, ValueKind};

/// The primitive kind a [`ScalarProperty`] holds.
pub trait ScalarKind: Send + Sync + 'static {
    const KIND: ValueKind;

    fn accepts(value: &Value) -> bool {
        value.kind() == Self::KIND
    }
}

#[derive(Debug)]
pub struct StringKind;

#[derive(Debug)]
pub struct NumberKind;

#[derive(Debug)]
pub struct BooleanKind;

impl ScalarKind for StringKind {
    const KIND: ValueKind = ValueKind::String;
}

/// NaN and the infinities have no stored form and never compare equal to
/// themselves, so they are rejected.
impl ScalarKind for NumberKind {
    const KIND: ValueKind = ValueKind::Number;

    fn accepts(value: &Value) -> bool {
        matches!(value, Value::Number(number) if number.is_finite())
    }
}

impl ScalarKind for BooleanKind {
    const KIND: ValueKind = ValueKind::Bool;
}

/// A primitive-typed property compared by value.
#[derive(Debug)]
pub struct ScalarProperty<K: ScalarKind> {
    core: PropertyCore,
    kind: PhantomData<fn() -> K>,
}

pub type StringProperty = ScalarProperty<StringKind>;
pub type NumberProperty = ScalarProperty<NumberKind>;
pub type BooleanProperty = ScalarProperty<BooleanKind>;

impl<K: ScalarKind> ScalarProperty<K> {
    pub fn new(id: impl IntoIdResolver) -> Self {
        Self::from_core(PropertyCore::new(id))
    }

    pub fn unbound() -> Self {
        Self::from_core(PropertyCore::unbound())
    }

    pub(crate) fn from_core(core: PropertyCore) -> Self {
        Self {
            core,
            kind: PhantomData,
        }
    }
}

impl<K: ScalarKind> Clone for ScalarProperty<K> {
    fn clone(&self) -> Self {
        Self::from_core(self.core.clone())
    }
}

impl<K: ScalarKind> Property for ScalarProperty<K> {
    fn core(&self) -> &PropertyCore {
        &self.core
    }

    fn validate(&self, ctx: &RequestContext, value: Option<&Value>) -> Result<(), MemoryError> {
        guard(&self.core, ctx, value, K::KIND.name(), K::accepts)
    }

    fn on_has_changed(
        &self,
        ctx: &RequestContext,
        value: Option<&Value>,
    ) -> Result<bool, MemoryError> {
        let current = self
            .core
            .current(ctx)?
            .filter(|current| K::accepts(current));
        Ok(match (value, current) {
            (Some(value), Some(current)) => value != &current,
            (Some(_), None) => true,
            (None, current) => current.is_some(),
        })
    }

    fn create_accessor(&self, id: Option<IdRef>, parent: Option<ParentRef>) -> Arc<dyn Property> {
        Arc::new(self.rebind(id, parent))
    }
}

impl<K: ScalarKind> Bindable for ScalarProperty<K> {
    fn with_core(&self, core: PropertyCore) -> Self {
        Self::from_core(core)
    }
}
