//! Request-scoped context: ambient attributes plus an opaque slot bag.
//!
//! A `RequestContext` is created per incoming request and dropped with it.
//! Caches attach their entry tables to it under a [`SlotKey`], so two requests
//! never share dirty state.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::MemoryError;

pub const CONVERSATION_ID: &str = "conversation.id";
pub const USER_ID: &str = "user.id";
pub const CHANNEL_ID: &str = "channel.id";

static NEXT_SLOT: AtomicU64 = AtomicU64::new(1);

/// Opaque identity of a request slot. Each cache-fronted root allocates one;
/// the data stored under it lives in the request, not in the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotKey(u64);

impl SlotKey {
    pub fn new() -> Self {
        SlotKey(NEXT_SLOT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SlotKey {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct RequestContext {
    attributes: HashMap<String, String>,
    slots: Mutex<HashMap<SlotKey, Box<dyn Any + Send>>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a context from a map of ambient attributes.
    pub fn from_attributes(attributes: HashMap<String, String>) -> Self {
        Self {
            attributes,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_conversation(self, id: impl Into<String>) -> Self {
        self.with_attribute(CONVERSATION_ID, id)
    }

    pub fn with_user(self, id: impl Into<String>) -> Self {
        self.with_attribute(USER_ID, id)
    }

    pub fn with_channel(self, id: impl Into<String>) -> Self {
        self.with_attribute(CHANNEL_ID, id)
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|value| value.as_str())
    }

    /// Look up an attribute an id resolver depends on.
    pub fn require(&self, key: &'static str) -> Result<&str, MemoryError> {
        self.attribute(key)
            .ok_or(MemoryError::MissingContextAttribute(key))
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.attribute(CONVERSATION_ID)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.attribute(USER_ID)
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.attribute(CHANNEL_ID)
    }

    pub fn attributes(&self) -> &HashMap<String, String> {
        &self.attributes
    }

    /// Run `f` against the value stored under `key`, creating it on first use.
    pub fn with_slot<T, R>(&self, key: SlotKey, f: impl FnOnce(&mut T) -> R) -> Result<R, MemoryError>
    where
        T: Default + Send + 'static,
    {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| MemoryError::LockPoisoned("request slot access"))?;
        let slot = slots
            .entry(key)
            .or_insert_with(|| Box::new(T::default()));
        let value = slot
            .downcast_mut::<T>()
            .ok_or_else(|| MemoryError::Storage("request slot holds an unexpected type".into()))?;
        Ok(f(value))
    }

    pub fn has_slot(&self, key: SlotKey) -> bool {
        self.slots
            .lock()
            .map(|slots| slots.contains_key(&key))
            .unwrap_or(false)
    }
}
