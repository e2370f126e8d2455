//! Accessor core.
//!
//! A [`Property`] reads and writes one named slot of its [`PropertyParent`].
//! Writes are gated on change detection, announced through the event
//! pipeline, and only then applied. Reads fall through to the parent and can
//! materialize a default, which is written back like any other set.

mod base;

use std::sync::Arc;

use log::trace;

pub use base::PropertyCore;

use crate::context::RequestContext;
use crate::error::MemoryError;
use crate::events::{self, EventKind, Next, Observer, PropertyEvent};
use crate::identity::{IdRef, IntoIdResolver};
use crate::store::DocumentContainer;
use crate::value::Value;

/// A node that owns named value slots: documents, item views, cache roots.
pub trait PropertyParent: Send + Sync {
    fn path(&self, ctx: &RequestContext) -> Result<String, MemoryError>;

    /// Read slot `id`. When the slot is empty and `default` is given, the
    /// default is stored in the slot and returned.
    fn get_property_value(
        &self,
        ctx: &RequestContext,
        id: &str,
        default: Option<Value>,
    ) -> Result<Option<Value>, MemoryError>;

    /// Write slot `id`. `None` clears it.
    fn set_property_value(
        &self,
        ctx: &RequestContext,
        id: &str,
        value: Option<Value>,
    ) -> Result<(), MemoryError>;

    fn delete_property_value(&self, ctx: &RequestContext, id: &str) -> Result<(), MemoryError>;

    /// Append this node's observers and then its ancestors' to `out`.
    fn collect_observers(&self, out: &mut Vec<Observer>) -> Result<(), MemoryError>;

    fn on_event(&self, observer: Observer) -> Result<(), MemoryError>;

    /// The document container reachable from this node, if any.
    fn container(&self) -> Option<Arc<dyn DocumentContainer>> {
        None
    }
}

pub type ParentRef = Arc<dyn PropertyParent>;

pub trait Property: Send + Sync {
    fn core(&self) -> &PropertyCore;

    /// Whether writing `value` would change the slot. `None` asks whether a
    /// value currently exists.
    fn on_has_changed(
        &self,
        ctx: &RequestContext,
        value: Option<&Value>,
    ) -> Result<bool, MemoryError>;

    /// A copy of this accessor bound to a new id and/or parent.
    fn create_accessor(&self, id: Option<IdRef>, parent: Option<ParentRef>) -> Arc<dyn Property>;

    /// Type guard run before change detection and again before storage.
    fn validate(&self, _ctx: &RequestContext, _value: Option<&Value>) -> Result<(), MemoryError> {
        Ok(())
    }

    fn on_get(
        &self,
        ctx: &RequestContext,
        default: Option<Value>,
    ) -> Result<Option<Value>, MemoryError> {
        read_through(self, ctx, default)
    }

    fn on_set(&self, ctx: &RequestContext, value: Option<Value>) -> Result<(), MemoryError> {
        self.validate(ctx, value.as_ref())?;
        let id = self.core().resolve_id(ctx)?;
        self.core().parent()?.set_property_value(ctx, &id, value)
    }

    fn on_delete(&self, ctx: &RequestContext) -> Result<(), MemoryError> {
        let id = self.core().resolve_id(ctx)?;
        self.core().parent()?.delete_property_value(ctx, &id)
    }

    /// Convert a stored value into the value callers see.
    fn decode(&self, stored: Value) -> Result<Value, MemoryError> {
        Ok(stored)
    }

    fn id(&self, ctx: &RequestContext) -> Result<String, MemoryError> {
        self.core().ensure_configured()?;
        self.core().resolve_id(ctx)
    }

    /// Dot-joined id chain from the root, for diagnostics.
    fn path(&self, ctx: &RequestContext) -> Result<String, MemoryError> {
        let id = self.id(ctx)?;
        let parent_path = self.core().parent()?.path(ctx)?;
        if parent_path.is_empty() {
            Ok(id)
        } else {
            Ok(format!("{}.{}", parent_path, id))
        }
    }

    fn get(&self, ctx: &RequestContext) -> Result<Option<Value>, MemoryError> {
        self.get_with(ctx, None)
    }

    /// Read the value, materializing `default` when the slot is empty.
    fn get_or(&self, ctx: &RequestContext, default: Value) -> Result<Value, MemoryError> {
        let fallback = default.clone();
        Ok(self.get_with(ctx, Some(default))?.unwrap_or(fallback))
    }

    fn get_with(
        &self,
        ctx: &RequestContext,
        default: Option<Value>,
    ) -> Result<Option<Value>, MemoryError> {
        self.core().ensure_configured()?;
        self.on_get(ctx, default)
    }

    fn set(&self, ctx: &RequestContext, value: Value) -> Result<(), MemoryError> {
        self.set_with(ctx, Some(value), false)
    }

    /// Write `value` if it differs from the stored one, or unconditionally
    /// when `force` is set. Unchanged writes emit no events.
    fn set_with(
        &self,
        ctx: &RequestContext,
        value: Option<Value>,
        force: bool,
    ) -> Result<(), MemoryError> {
        self.core().ensure_configured()?;
        self.validate(ctx, value.as_ref())?;
        if !force && !self.on_has_changed(ctx, value.as_ref())? {
            trace!("'{}' unchanged, write skipped", self.core().resolve_id(ctx)?);
            return Ok(());
        }
        let event = new_event(self, ctx, EventKind::SetProperty { value })?;
        emit(self, ctx, event, |ctx: &RequestContext, ev: &mut PropertyEvent| {
            self.on_set(ctx, ev.take_value())
        })?;
        Ok(())
    }

    fn delete(&self, ctx: &RequestContext) -> Result<(), MemoryError> {
        self.core().ensure_configured()?;
        if !self.on_has_changed(ctx, None)? {
            return Ok(());
        }
        let event = new_event(self, ctx, EventKind::DeleteProperty)?;
        emit(self, ctx, event, |ctx: &RequestContext, _: &mut PropertyEvent| {
            self.on_delete(ctx)
        })?;
        Ok(())
    }

    fn has_changed(&self, ctx: &RequestContext, value: Option<&Value>) -> Result<bool, MemoryError> {
        self.core().ensure_configured()?;
        self.on_has_changed(ctx, value)
    }

    /// Run `event` through this accessor's bubbled observer chain, then
    /// `terminal`. Returns whether the terminal ran.
    fn emit_event(
        &self,
        ctx: &RequestContext,
        event: PropertyEvent,
        terminal: &mut dyn FnMut(&RequestContext, &mut PropertyEvent) -> Result<(), MemoryError>,
    ) -> Result<bool, MemoryError> {
        emit(self, ctx, event, |ctx: &RequestContext, ev: &mut PropertyEvent| {
            terminal(ctx, ev)
        })
    }

    fn on_event(&self, observer: Observer) -> Result<(), MemoryError> {
        self.core().events().push(observer)
    }

    fn observe<F>(&self, handler: F) -> Result<(), MemoryError>
    where
        Self: Sized,
        F: Fn(&RequestContext, &mut PropertyEvent, Next<'_>) -> Result<(), MemoryError>
            + Send
            + Sync
            + 'static,
    {
        self.on_event(events::observer(handler))
    }

    fn tags(&self) -> &[String] {
        self.core().tags()
    }
}

/// Accessors that can be copied onto a new id or parent while keeping their
/// concrete type.
pub trait Bindable: Property + Sized + 'static {
    /// A copy of this accessor carrying `core`.
    fn with_core(&self, core: PropertyCore) -> Self;

    /// Copy onto a new id and/or parent; `None` keeps the current one.
    fn rebind(&self, id: Option<IdRef>, parent: Option<ParentRef>) -> Self {
        self.with_core(self.core().rebind(id, parent))
    }

    fn bind(&self, id: impl IntoIdResolver, parent: ParentRef) -> Self {
        self.rebind(Some(id.into_id_resolver()), Some(parent))
    }

    /// Bind to `parent`, keeping the current id.
    fn attach(&self, parent: ParentRef) -> Self {
        self.rebind(None, Some(parent))
    }

    fn with_tag(self, tag: impl Into<String>) -> Self {
        let mut core = self.core().clone();
        core.add_tag(tag);
        self.with_core(core)
    }
}

/// Build an event stamped with `property`'s id and path.
pub fn new_event<P: Property + ?Sized>(
    property: &P,
    ctx: &RequestContext,
    kind: EventKind,
) -> Result<PropertyEvent, MemoryError> {
    Ok(PropertyEvent::new(property.id(ctx)?, property.path(ctx)?, kind))
}

/// Dispatch `event` through `property`'s observers and its ancestors'.
pub fn emit<P, F>(
    property: &P,
    ctx: &RequestContext,
    mut event: PropertyEvent,
    terminal: F,
) -> Result<bool, MemoryError>
where
    P: Property + ?Sized,
    F: FnOnce(&RequestContext, &mut PropertyEvent) -> Result<(), MemoryError>,
{
    let mut chain = Vec::new();
    property.core().collect_observers(&mut chain)?;
    events::dispatch(ctx, &mut event, &chain, terminal)
}

/// Default read path: fetch from the parent; when the slot is empty and a
/// default is given, write a copy of it through a set event and return it.
pub fn read_through<P: Property + ?Sized>(
    property: &P,
    ctx: &RequestContext,
    default: Option<Value>,
) -> Result<Option<Value>, MemoryError> {
    let id = property.core().resolve_id(ctx)?;
    let parent = property.core().parent()?;
    if let Some(stored) = parent.get_property_value(ctx, &id, None)? {
        return property.decode(stored).map(Some);
    }

    let default = match default {
        Some(default) => default,
        None => return Ok(None),
    };
    property.validate(ctx, Some(&default))?;
    let event = new_event(
        property,
        ctx,
        EventKind::SetProperty {
            value: Some(default.clone()),
        },
    )?;
    emit(property, ctx, event, |ctx: &RequestContext, ev: &mut PropertyEvent| {
        property.on_set(ctx, ev.take_value())
    })?;
    Ok(Some(default))
}

/// Reject values whose kind `accept` refuses, naming the property.
pub fn guard(
    core: &PropertyCore,
    ctx: &RequestContext,
    value: Option<&Value>,
    expected: &'static str,
    accept: impl Fn(&Value) -> bool,
) -> Result<(), MemoryError> {
    match value {
        Some(value) if !accept(value) => Err(MemoryError::InvalidAssignment {
            property: core.resolve_id(ctx)?,
            expected,
        }),
        _ => Ok(()),
    }
}
