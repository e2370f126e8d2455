//! Event pipeline.
//!
//! Every mutation an accessor performs is announced as a [`PropertyEvent`]
//! before it happens. Observers are chained: each receives a [`Next`] handle
//! and the mutation only runs once the last observer in the chain proceeds.
//! The chain for an emission is precomputed by walking from the mutated
//! accessor outward through its ancestors, so local observers always run
//! before any ancestor's.

mod source;

use std::fmt;
use std::sync::Arc;

use log::debug;

use crate::context::RequestContext;
use crate::error::MemoryError;
use crate::value::Value;

pub use source::EventSource;

/// An event handler. Call `next.run(ctx, event)` to proceed; returning
/// without doing so vetoes the mutation.
pub type Observer = Arc<
    dyn Fn(&RequestContext, &mut PropertyEvent, Next<'_>) -> Result<(), MemoryError> + Send + Sync,
>;

/// Wrap a closure as an [`Observer`].
pub fn observer<F>(handler: F) -> Observer
where
    F: Fn(&RequestContext, &mut PropertyEvent, Next<'_>) -> Result<(), MemoryError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(handler)
}

type Terminal<'a> = dyn FnMut(&RequestContext, &mut PropertyEvent) -> Result<(), MemoryError> + 'a;

/// Address of a collection slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionKey {
    /// Array position. `None` means "the end": append on insert, pop on delete.
    Position(Option<usize>),
    Key(String),
}

impl fmt::Display for CollectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollectionKey::Position(Some(index)) => write!(f, "{}", index),
            CollectionKey::Position(None) => f.write_str("end"),
            CollectionKey::Key(key) => f.write_str(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    SetProperty { value: Option<Value> },
    DeleteProperty,
    CollectionInsert { key: CollectionKey, value: Value },
    CollectionDelete { key: CollectionKey },
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::SetProperty { .. } => "setProperty",
            EventKind::DeleteProperty => "deleteProperty",
            EventKind::CollectionInsert { .. } => "collectionInsert",
            EventKind::CollectionDelete { .. } => "collectionDelete",
        }
    }
}

/// A pending mutation, announced to observers before it is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyEvent {
    /// Id of the accessor the mutation originated on.
    pub property: String,
    /// Dotted path of that accessor.
    pub path: String,
    pub kind: EventKind,
}

impl PropertyEvent {
    pub fn new(property: impl Into<String>, path: impl Into<String>, kind: EventKind) -> Self {
        Self {
            property: property.into(),
            path: path.into(),
            kind,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// The value carried by a set or insert event.
    pub fn value(&self) -> Option<&Value> {
        match &self.kind {
            EventKind::SetProperty { value } => value.as_ref(),
            EventKind::CollectionInsert { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Mutable access to the carried value, so observers can rewrite it.
    pub fn value_mut(&mut self) -> Option<&mut Value> {
        match &mut self.kind {
            EventKind::SetProperty { value } => value.as_mut(),
            EventKind::CollectionInsert { value, .. } => Some(value),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&CollectionKey> {
        match &self.kind {
            EventKind::CollectionInsert { key, .. } | EventKind::CollectionDelete { key } => {
                Some(key)
            }
            _ => None,
        }
    }

    /// Move the (possibly rewritten) value out once the chain has resolved.
    pub fn take_value(&mut self) -> Option<Value> {
        match &mut self.kind {
            EventKind::SetProperty { value } => value.take(),
            EventKind::CollectionInsert { value, .. } => {
                Some(std::mem::replace(value, Value::Null))
            }
            _ => None,
        }
    }
}

/// The remainder of an observer chain.
pub struct Next<'a> {
    rest: &'a [Observer],
    terminal: &'a mut Terminal<'a>,
}

impl<'a> Next<'a> {
    /// Invoke the next observer, or the mutation itself when none are left.
    pub fn run(self, ctx: &RequestContext, event: &mut PropertyEvent) -> Result<(), MemoryError> {
        match self.rest.split_first() {
            Some((observer, rest)) => observer(
                ctx,
                event,
                Next {
                    rest,
                    terminal: self.terminal,
                },
            ),
            None => (self.terminal)(ctx, event),
        }
    }
}

/// Run `event` through `chain`, then `terminal` if every observer proceeded.
///
/// Returns whether the terminal ran.
pub fn dispatch<F>(
    ctx: &RequestContext,
    event: &mut PropertyEvent,
    chain: &[Observer],
    terminal: F,
) -> Result<bool, MemoryError>
where
    F: FnOnce(&RequestContext, &mut PropertyEvent) -> Result<(), MemoryError>,
{
    let mut terminal = Some(terminal);
    let mut ran = false;
    let mut last = |ctx: &RequestContext, event: &mut PropertyEvent| -> Result<(), MemoryError> {
        ran = true;
        match terminal.take() {
            Some(apply) => apply(ctx, event),
            None => Ok(()),
        }
    };
    Next {
        rest: chain,
        terminal: &mut last,
    }
    .run(ctx, event)?;

    if !ran {
        debug!("{} on '{}' vetoed by an observer", event.name(), event.path);
    }
    Ok(ran)
}
