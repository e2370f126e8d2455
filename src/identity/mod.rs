//! Identity resolution: how an accessor computes the key of its slot.

mod conversation;
mod static_id;
mod user;

use std::fmt;
use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::MemoryError;

pub use conversation::{ConversationId, ConversationIdOptions};
pub use static_id::StaticId;
pub use user::{UserId, UserIdOptions};

/// Resolves the key under which a property's value is stored in its parent.
///
/// Implementations must be pure with respect to the request context.
pub trait IdResolver: Send + Sync + fmt::Debug {
    fn resolve(&self, ctx: &RequestContext) -> Result<String, MemoryError>;
}

/// Shared handle to an id resolver. Accessor copies share their resolver.
pub type IdRef = Arc<dyn IdResolver>;

/// Conversion into a shared resolver, so constructors accept `"name"` as well
/// as any resolver.
pub trait IntoIdResolver {
    fn into_id_resolver(self) -> IdRef;
}

impl IntoIdResolver for &str {
    fn into_id_resolver(self) -> IdRef {
        Arc::new(StaticId::new(self))
    }
}

impl IntoIdResolver for String {
    fn into_id_resolver(self) -> IdRef {
        Arc::new(StaticId::new(self))
    }
}

impl IntoIdResolver for IdRef {
    fn into_id_resolver(self) -> IdRef {
        self
    }
}

impl IntoIdResolver for StaticId {
    fn into_id_resolver(self) -> IdRef {
        Arc::new(self)
    }
}

impl IntoIdResolver for ConversationId {
    fn into_id_resolver(self) -> IdRef {
        Arc::new(self)
    }
}

impl IntoIdResolver for UserId {
    fn into_id_resolver(self) -> IdRef {
        Arc::new(self)
    }
}
