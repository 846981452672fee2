use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of one configured bot identity (the `id` field in config).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(pub String);

impl IdentityId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for IdentityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for IdentityId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Where a message was posted and where replies go.
///
/// Every variant carries the platform channel id; guild variants also carry
/// the guild id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    /// One-to-one conversation with a user.
    Direct { channel_id: String },
    /// Regular text (or announcement) channel inside a guild.
    GuildText { channel_id: String, guild_id: String },
    /// Public, private, or announcement thread inside a guild.
    Thread { channel_id: String, guild_id: String },
    /// Voice, stage, forum, category and anything else we cannot post text into.
    Unsupported { channel_id: String },
}

/// What an identity must hold before it may post into a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// No capability introspection needed (DMs).
    Nothing,
    /// Every capability in the set must be granted.
    All(CapabilitySet),
    /// Posting is never possible.
    Unreachable,
}

impl Destination {
    pub fn channel_id(&self) -> &str {
        match self {
            Destination::Direct { channel_id }
            | Destination::GuildText { channel_id, .. }
            | Destination::Thread { channel_id, .. }
            | Destination::Unsupported { channel_id } => channel_id,
        }
    }

    pub fn is_direct(&self) -> bool {
        matches!(self, Destination::Direct { .. })
    }

    /// Capability requirement for this destination kind.
    pub fn requirement(&self) -> Requirement {
        let base = CapabilitySet::from_iter([
            Capability::View,
            Capability::SendMessages,
            Capability::ReadHistory,
        ]);
        match self {
            Destination::Direct { .. } => Requirement::Nothing,
            Destination::GuildText { .. } => Requirement::All(base),
            Destination::Thread { .. } => {
                Requirement::All(base.with(Capability::SendMessagesInThreads))
            }
            Destination::Unsupported { .. } => Requirement::Unreachable,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            Destination::Direct { .. } => "direct",
            Destination::GuildText { .. } => "guild_text",
            Destination::Thread { .. } => "thread",
            Destination::Unsupported { .. } => "unsupported",
        }
    }
}

/// A single platform permission relevant to posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    View,
    SendMessages,
    ReadHistory,
    SendMessagesInThreads,
}

impl Capability {
    pub const ALL: [Capability; 4] = [
        Capability::View,
        Capability::SendMessages,
        Capability::ReadHistory,
        Capability::SendMessagesInThreads,
    ];

    const fn bit(self) -> u8 {
        match self {
            Capability::View => 1,
            Capability::SendMessages => 1 << 1,
            Capability::ReadHistory => 1 << 2,
            Capability::SendMessagesInThreads => 1 << 3,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::View => write!(f, "view"),
            Capability::SendMessages => write!(f, "send_messages"),
            Capability::ReadHistory => write!(f, "read_history"),
            Capability::SendMessagesInThreads => write!(f, "send_messages_in_threads"),
        }
    }
}

/// Compact set of [`Capability`] values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct CapabilitySet(u8);

impl CapabilitySet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn with(mut self, cap: Capability) -> Self {
        self.insert(cap);
        self
    }

    pub fn insert(&mut self, cap: Capability) {
        self.0 |= cap.bit();
    }

    pub fn contains(&self, cap: Capability) -> bool {
        self.0 & cap.bit() != 0
    }

    pub fn contains_all(&self, other: CapabilitySet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Capabilities in `required` that this set lacks, in declaration order.
    pub fn missing(&self, required: CapabilitySet) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| required.contains(*c) && !self.contains(*c))
            .collect()
    }
}

impl FromIterator<Capability> for CapabilitySet {
    fn from_iter<I: IntoIterator<Item = Capability>>(iter: I) -> Self {
        iter.into_iter().fold(Self::empty(), CapabilitySet::with)
    }
}

/// One message from a destination's recent history, as handed to the AI backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub message_id: String,
    pub author_id: String,
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}
