use serde::{Deserialize, Serialize};

use crate::context::{RequestContext, CHANNEL_ID, USER_ID};
use crate::error::MemoryError;

use super::IdResolver;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserIdOptions {
    pub include_channel_id: bool,
    pub separator: String,
}

impl Default for UserIdOptions {
    fn default() -> Self {
        Self {
            include_channel_id: false,
            separator: "-".to_string(),
        }
    }
}

/// Derives an id from the current participant: `[channel<sep>]user`.
#[derive(Debug, Clone, Default)]
pub struct UserId {
    options: UserIdOptions,
}

impl UserId {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: UserIdOptions) -> Self {
        Self { options }
    }
}

impl IdResolver for UserId {
    fn resolve(&self, ctx: &RequestContext) -> Result<String, MemoryError> {
        let mut id = String::new();
        if self.options.include_channel_id {
            id.push_str(ctx.require(CHANNEL_ID)?);
            id.push_str(&self.options.separator);
        }
        id.push_str(ctx.require(USER_ID)?);
        Ok(id)
    }
}
