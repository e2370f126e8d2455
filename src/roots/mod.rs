//! Cache-fronted roots.
//!
//! A root is the top of an accessor tree. It answers slot reads and writes
//! from a request-scoped [`WriteBackCache`](crate::cache::WriteBackCache) and
//! persists dirty slots on `save_changes`.

mod container;
mod property_store;

use std::sync::{Arc, RwLock, Weak};

use log::warn;

pub use container::CachedDocumentContainer;
pub use property_store::CachedPropertyStore;

use crate::accessor::Property;
use crate::error::MemoryError;

/// Documents added to a root, in registration order.
///
/// Entries are weak: documents hold their root as parent, so the root must
/// not keep them alive. Dropped documents are skipped and pruned.
#[derive(Default)]
struct DocumentList {
    documents: RwLock<Vec<Weak<dyn Property>>>,
}

impl DocumentList {
    fn register(&self, document: Arc<dyn Property>) {
        let mut documents = self.documents.write().unwrap_or_else(|poisoned| {
            warn!("root document list was poisoned, recovering");
            self.documents.clear_poison();
            poisoned.into_inner()
        });
        documents.retain(|entry| entry.strong_count() > 0);
        documents.push(Arc::downgrade(&document));
    }

    fn for_each(&self, mut f: impl FnMut(usize, &Arc<dyn Property>)) -> Result<(), MemoryError> {
        let live: Vec<Arc<dyn Property>> = self
            .documents
            .read()
            .map_err(|_| MemoryError::LockPoisoned("root document list"))?
            .iter()
            .filter_map(Weak::upgrade)
            .collect();
        for (index, document) in live.iter().enumerate() {
            f(index, document);
        }
        Ok(())
    }
}
