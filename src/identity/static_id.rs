use crate::context::RequestContext;
use crate::error::MemoryError;

use super::IdResolver;

/// A constant id.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StaticId {
    id: String,
}

impl StaticId {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl IdResolver for StaticId {
    fn resolve(&self, _ctx: &RequestContext) -> Result<String, MemoryError> {
        Ok(self.id.clone())
    }
}
