//! Request-scoped write-back cache.
//!
//! Entries live in the [`RequestContext`] under the cache's [`SlotKey`], so
//! each request sees its own table and dirty state never leaks between
//! requests. Reads go through to the backing on a miss; writes only touch
//! the table. [`WriteBackCache::flush`] compares each entry's canonical
//! serialization with the one last seen in storage and writes back the ones
//! that differ.

use std::collections::HashMap;
use std::thread;

use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::context::{RequestContext, SlotKey};
use crate::error::{FlushFailure, MemoryError};
use crate::value::Value;

const DEFAULT_MAX_CONCURRENT_WRITES: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlushOptions {
    /// Upper bound on backing writes in flight at once during a flush.
    pub max_concurrent_writes: usize,
}

impl Default for FlushOptions {
    fn default() -> Self {
        Self {
            max_concurrent_writes: DEFAULT_MAX_CONCURRENT_WRITES,
        }
    }
}

/// What happens to the entry table after a fully successful flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushPolicy {
    /// Keep entries; later reads keep hitting the cache.
    Retain,
    /// Drop every entry; later reads go back to storage.
    Clear,
}

/// The storage a cache reads through to and flushes into.
pub trait CacheBacking: Send + Sync {
    fn load(&self, ctx: &RequestContext, id: &str) -> Result<Option<Value>, MemoryError>;

    fn write(&self, ctx: &RequestContext, id: &str, value: &Value) -> Result<(), MemoryError>;

    fn remove(&self, ctx: &RequestContext, id: &str) -> Result<(), MemoryError>;
}

/// Counts from a successful flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub written: usize,
    pub deleted: usize,
    pub unchanged: usize,
}

#[derive(Debug, Clone, Default)]
struct CacheEntry {
    /// Canonical form of the value last seen in storage.
    stored: Option<String>,
    /// Current value. `None` once removed in this request.
    value: Option<Value>,
}

impl CacheEntry {
    fn clean(value: Value) -> Self {
        Self {
            stored: Some(value.canonical()),
            value: Some(value),
        }
    }

    fn current_hash(&self) -> Option<String> {
        self.value.as_ref().map(Value::canonical)
    }

    fn is_dirty(&self) -> bool {
        self.current_hash() != self.stored
    }
}

type Entries = HashMap<String, CacheEntry>;

struct PendingWrite {
    id: String,
    value: Option<Value>,
    hash: Option<String>,
}

fn apply<B: CacheBacking + ?Sized>(
    ctx: &RequestContext,
    backing: &B,
    pending: &PendingWrite,
) -> Result<(), MemoryError> {
    match &pending.value {
        Some(value) => backing.write(ctx, &pending.id, value),
        None => backing.remove(ctx, &pending.id),
    }
}

#[derive(Debug)]
pub struct WriteBackCache {
    slot: SlotKey,
    options: FlushOptions,
    policy: FlushPolicy,
}

impl WriteBackCache {
    pub fn new(policy: FlushPolicy, options: FlushOptions) -> Self {
        Self {
            slot: SlotKey::new(),
            options,
            policy,
        }
    }

    pub fn policy(&self) -> FlushPolicy {
        self.policy
    }

    pub fn options(&self) -> &FlushOptions {
        &self.options
    }

    fn with_entries<R>(
        &self,
        ctx: &RequestContext,
        f: impl FnOnce(&mut Entries) -> R,
    ) -> Result<R, MemoryError> {
        ctx.with_slot(self.slot, f)
    }

    /// Read `id`. A miss loads from `backing` and seeds a clean entry; if the
    /// backing has nothing, `default` seeds it instead without being written.
    pub fn read<B: CacheBacking + ?Sized>(
        &self,
        ctx: &RequestContext,
        backing: &B,
        id: &str,
        default: Option<Value>,
    ) -> Result<Option<Value>, MemoryError> {
        let hit = self.with_entries(ctx, |entries| entries.get(id).map(|entry| entry.value.clone()))?;
        match hit {
            Some(Some(value)) => {
                trace!("cache hit for '{}'", id);
                return Ok(Some(value));
            }
            Some(None) => {
                trace!("'{}' was removed in this request", id);
                return match default {
                    Some(default) => {
                        self.write(ctx, id, default.clone())?;
                        Ok(Some(default))
                    }
                    None => Ok(None),
                };
            }
            None => {}
        }

        trace!("cache miss for '{}'", id);
        let seed = match backing.load(ctx, id)? {
            Some(value) => value,
            None => match default {
                Some(default) => default,
                None => return Ok(None),
            },
        };
        self.with_entries(ctx, |entries| {
            entries
                .entry(id.to_string())
                .or_insert_with(|| CacheEntry::clean(seed))
                .value
                .clone()
        })
    }

    /// Replace the cached value. Storage is untouched until flush.
    pub fn write(&self, ctx: &RequestContext, id: &str, value: Value) -> Result<(), MemoryError> {
        self.with_entries(ctx, |entries| {
            entries.entry(id.to_string()).or_default().value = Some(value);
        })
    }

    /// Mark `id` as removed; flush issues the backing delete.
    pub fn remove<B: CacheBacking + ?Sized>(
        &self,
        ctx: &RequestContext,
        backing: &B,
        id: &str,
    ) -> Result<(), MemoryError> {
        let known = self.with_entries(ctx, |entries| entries.contains_key(id))?;
        if !known {
            let stored = backing.load(ctx, id)?.map(|value| value.canonical());
            self.with_entries(ctx, |entries| {
                entries.entry(id.to_string()).or_insert(CacheEntry {
                    stored,
                    value: None,
                });
            })?;
        }
        self.with_entries(ctx, |entries| {
            if let Some(entry) = entries.get_mut(id) {
                entry.value = None;
            }
        })
    }

    /// Number of entries whose value differs from storage.
    pub fn pending_changes(&self, ctx: &RequestContext) -> Result<usize, MemoryError> {
        self.with_entries(ctx, |entries| {
            entries.values().filter(|entry| entry.is_dirty()).count()
        })
    }

    /// Forget everything cached for this request, dirty or not.
    pub fn discard(&self, ctx: &RequestContext) -> Result<(), MemoryError> {
        self.with_entries(ctx, |entries| entries.clear())
    }

    /// Write every dirty entry back to `backing`.
    ///
    /// Writes run concurrently, at most `max_concurrent_writes` at a time.
    /// The flush is not atomic: successful writes are kept when others fail,
    /// failed entries stay dirty, and the error lists every failure.
    pub fn flush<B: CacheBacking + ?Sized>(
        &self,
        ctx: &RequestContext,
        backing: &B,
    ) -> Result<FlushReport, MemoryError> {
        let (pending, unchanged) = self.with_entries(ctx, |entries| {
            let mut pending = Vec::new();
            let mut unchanged = 0;
            for (id, entry) in entries.iter() {
                if entry.is_dirty() {
                    pending.push(PendingWrite {
                        id: id.clone(),
                        value: entry.value.clone(),
                        hash: entry.current_hash(),
                    });
                } else {
                    unchanged += 1;
                }
            }
            (pending, unchanged)
        })?;

        let results = self.dispatch(ctx, backing, &pending);

        let mut report = FlushReport {
            unchanged,
            ..FlushReport::default()
        };
        let mut failures = Vec::new();
        self.with_entries(ctx, |entries| {
            for (write, result) in pending.into_iter().zip(results) {
                match result {
                    Ok(()) if write.value.is_none() => {
                        entries.remove(&write.id);
                        report.deleted += 1;
                    }
                    Ok(()) => {
                        if let Some(entry) = entries.get_mut(&write.id) {
                            entry.stored = write.hash;
                        }
                        report.written += 1;
                    }
                    Err(error) => {
                        warn!("flush of '{}' failed: {}", write.id, error);
                        failures.push(FlushFailure {
                            id: write.id,
                            error,
                        });
                    }
                }
            }
            if failures.is_empty() && self.policy == FlushPolicy::Clear {
                entries.clear();
            }
        })?;

        debug!(
            "flushed {} writes and {} deletes, {} unchanged, {} failed",
            report.written,
            report.deleted,
            report.unchanged,
            failures.len()
        );
        if failures.is_empty() {
            Ok(report)
        } else {
            Err(MemoryError::Flush(failures))
        }
    }

    fn dispatch<B: CacheBacking + ?Sized>(
        &self,
        ctx: &RequestContext,
        backing: &B,
        pending: &[PendingWrite],
    ) -> Vec<Result<(), MemoryError>> {
        if pending.len() == 1 {
            return vec![apply(ctx, backing, &pending[0])];
        }
        let width = self.options.max_concurrent_writes.max(1);
        let mut results = Vec::with_capacity(pending.len());
        for chunk in pending.chunks(width) {
            thread::scope(|scope| {
                let handles: Vec<_> = chunk
                    .iter()
                    .map(|write| scope.spawn(move || apply(ctx, backing, write)))
                    .collect();
                for handle in handles {
                    results.push(handle.join().unwrap_or_else(|_| {
                        Err(MemoryError::Storage("flush writer panicked".into()))
                    }));
                }
            });
        }
        results
    }
}
