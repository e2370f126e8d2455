use serde::{Deserialize, Serialize};

use crate::context::{RequestContext, CHANNEL_ID, CONVERSATION_ID, USER_ID};
use crate::error::MemoryError;

use super::IdResolver;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationIdOptions {
    pub include_channel_id: bool,
    pub include_user_id: bool,
    pub separator: String,
}

impl Default for ConversationIdOptions {
    fn default() -> Self {
        Self {
            include_channel_id: false,
            include_user_id: false,
            separator: "-".to_string(),
        }
    }
}

/// Derives an id from the current conversation, optionally scoped by channel
/// and participant: `[channel<sep>]conversation[<sep>user]`.
#[derive(Debug, Clone, Default)]
pub struct ConversationId {
    options: ConversationIdOptions,
}

impl ConversationId {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConversationIdOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConversationIdOptions {
        &self.options
    }
}

impl IdResolver for ConversationId {
    fn resolve(&self, ctx: &RequestContext) -> Result<String, MemoryError> {
        let mut id = String::new();
        if self.options.include_channel_id {
            id.push_str(ctx.require(CHANNEL_ID)?);
            id.push_str(&self.options.separator);
        }
        id.push_str(ctx.require(CONVERSATION_ID)?);
        if self.options.include_user_id {
            id.push_str(&self.options.separator);
            id.push_str(ctx.require(USER_ID)?);
        }
        Ok(id)
    }
}
