//! Serde-loadable options for roots and id resolvers.

use serde::{Deserialize, Serialize};

use crate::cache::FlushOptions;
use crate::error::MemoryError;
use crate::identity::{ConversationId, ConversationIdOptions, UserId, UserIdOptions};

/// Every tunable in one place. Missing sections fall back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    pub flush: FlushOptions,
    pub conversation: ConversationIdOptions,
    pub user: UserIdOptions,
}

impl MemoryConfig {
    pub fn from_json(text: &str) -> Result<Self, MemoryError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn conversation_id(&self) -> ConversationId {
        ConversationId::with_options(self.conversation.clone())
    }

    pub fn user_id(&self) -> UserId {
        UserId::with_options(self.user.clone())
    }
}
