use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use chorus_core::types::Destination;

/// Who posted a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    /// Platform-native user id.
    pub id: String,
    /// Display name, if available.
    pub name: String,
    /// True for bot accounts (ours or anyone else's).
    pub bot: bool,
}

/// A message delivered to one identity by its transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingMessage {
    /// Platform-native message id.
    pub id: String,
    pub destination: Destination,
    pub author: Author,
    /// Plain text content.
    pub content: String,
    /// User ids mentioned in the message.
    pub mentions: Vec<String>,
    /// When the transport received the message.
    pub received_at: DateTime<Utc>,
}

impl IncomingMessage {
    pub fn mentions_user(&self, user_id: &str) -> bool {
        self.mentions.iter().any(|m| m == user_id)
    }
}

/// The logged-in account behind an identity, known once login completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfInfo {
    pub user_id: String,
    pub display_name: String,
}

/// Lifecycle of a single identity.
///
/// `Unstarted → Connecting → (Live | FailedStartup)`, `Live → ShuttingDown → Stopped`.
/// `FailedStartup` and `Stopped` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityStatus {
    Unstarted,
    Connecting,
    Live,
    FailedStartup(String),
    ShuttingDown,
    Stopped,
}

impl IdentityStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, IdentityStatus::FailedStartup(_) | IdentityStatus::Stopped)
    }
}
