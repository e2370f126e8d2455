use std::fmt;
use std::sync::RwLock;

use super::Observer;
use crate::error::MemoryError;

/// The ordered observer list owned by one accessor.
///
/// Cloning snapshots the list: a rebound copy starts with the same observers
/// but later registrations on either side are independent.
#[derive(Default)]
pub struct EventSource {
    observers: RwLock<Vec<Observer>>,
}

impl EventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, observer: Observer) -> Result<(), MemoryError> {
        self.observers
            .write()
            .map_err(|_| MemoryError::LockPoisoned("observer registration"))?
            .push(observer);
        Ok(())
    }

    /// Append this source's observers, in registration order, to `out`.
    pub fn extend_into(&self, out: &mut Vec<Observer>) -> Result<(), MemoryError> {
        let observers = self
            .observers
            .read()
            .map_err(|_| MemoryError::LockPoisoned("observer lookup"))?;
        out.extend(observers.iter().cloned());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.observers.read().map(|list| list.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Clone for EventSource {
    fn clone(&self) -> Self {
        let observers = self
            .observers
            .read()
            .map(|list| list.clone())
            .unwrap_or_default();
        Self {
            observers: RwLock::new(observers),
        }
    }
}

impl fmt::Debug for EventSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSource")
            .field("observers", &self.len())
            .finish()
    }
}
