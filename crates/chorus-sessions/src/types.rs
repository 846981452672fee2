use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chorus_core::types::IdentityId;

/// Key of a one-to-one conversation: which identity is talking to which user.
///
/// Ordered pair, so identity `aria` with user `42` and identity `bram` with
/// user `42` are separate conversations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DmKey {
    pub identity: IdentityId,
    pub user_id: String,
}

impl DmKey {
    pub fn new(identity: IdentityId, user_id: impl Into<String>) -> Self {
        Self {
            identity,
            user_id: user_id.into(),
        }
    }
}

/// Format: `dm:{identity}:{user_id}`
impl fmt::Display for DmKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dm:{}:{}", self.identity, self.user_id)
    }
}

/// Running tally for one DM conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmSession {
    /// Direct messages received so far, including the current one. Always ≥ 1.
    pub message_count: u64,
    pub last_message_at: DateTime<Utc>,
}
