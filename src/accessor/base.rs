use std::fmt;

use super::ParentRef;
use crate::context::RequestContext;
use crate::error::MemoryError;
use crate::events::{EventSource, Observer};
use crate::identity::{IdRef, IntoIdResolver};
use crate::value::Value;

/// Configuration shared by every accessor: how its id is resolved, which
/// parent owns its slot, its own observers and free-form tags.
#[derive(Clone, Default)]
pub struct PropertyCore {
    id: Option<IdRef>,
    parent: Option<ParentRef>,
    events: EventSource,
    tags: Vec<String>,
}

impl PropertyCore {
    pub fn new(id: impl IntoIdResolver) -> Self {
        Self {
            id: Some(id.into_id_resolver()),
            ..Self::default()
        }
    }

    /// A core with neither id nor parent. Using it fails with `NotConfigured`.
    pub fn unbound() -> Self {
        Self::default()
    }

    pub fn with_parent(mut self, parent: ParentRef) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn add_tag(&mut self, tag: impl Into<String>) {
        self.tags.push(tag.into());
    }

    pub fn id_resolver(&self) -> Option<&IdRef> {
        self.id.as_ref()
    }

    pub fn parent(&self) -> Result<&ParentRef, MemoryError> {
        self.parent.as_ref().ok_or(MemoryError::NotConfigured("parent"))
    }

    pub fn parent_ref(&self) -> Option<&ParentRef> {
        self.parent.as_ref()
    }

    pub fn resolve_id(&self, ctx: &RequestContext) -> Result<String, MemoryError> {
        self.id
            .as_ref()
            .ok_or(MemoryError::NotConfigured("id resolver"))?
            .resolve(ctx)
    }

    pub fn ensure_configured(&self) -> Result<(), MemoryError> {
        self.parent()?;
        if self.id.is_none() {
            return Err(MemoryError::NotConfigured("id resolver"));
        }
        Ok(())
    }

    pub fn events(&self) -> &EventSource {
        &self.events
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Copy this configuration onto a new id and/or parent. Observers and
    /// tags are copied; anything left `None` is kept.
    pub fn rebind(&self, id: Option<IdRef>, parent: Option<ParentRef>) -> Self {
        Self {
            id: id.or_else(|| self.id.clone()),
            parent: parent.or_else(|| self.parent.clone()),
            events: self.events.clone(),
            tags: self.tags.clone(),
        }
    }

    /// The stored value of this accessor's slot, without defaults.
    pub fn current(&self, ctx: &RequestContext) -> Result<Option<Value>, MemoryError> {
        let id = self.resolve_id(ctx)?;
        self.parent()?.get_property_value(ctx, &id, None)
    }

    /// Local observers first, then every ancestor's, outward.
    pub fn collect_observers(&self, out: &mut Vec<Observer>) -> Result<(), MemoryError> {
        self.events.extend_into(out)?;
        if let Some(parent) = &self.parent {
            parent.collect_observers(out)?;
        }
        Ok(())
    }
}

impl fmt::Debug for PropertyCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyCore")
            .field("id", &self.id)
            .field("bound", &self.parent.is_some())
            .field("observers", &self.events.len())
            .field("tags", &self.tags)
            .finish()
    }
}
