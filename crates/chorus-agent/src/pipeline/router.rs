use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use chorus_channels::{ChannelError, EventSink, IncomingMessage, RuntimeState, SelfInfo, Transport};
use chorus_core::config::RoutingConfig;
use chorus_core::types::IdentityId;
use chorus_guard::can_respond;

use crate::history::HistoryCache;
use crate::provider::CompletionBackend;

use super::respond::{IgnoreReason, Outcome, ReplyMode};

/// Routes incoming messages for every identity to the completion backend.
pub struct Router {
    pub(crate) state: Arc<RuntimeState>,
    pub(crate) backend: Arc<dyn CompletionBackend>,
    pub(crate) history: HistoryCache,
    pub(crate) history_limit: usize,
    pub(crate) apology: String,
}

impl Router {
    pub fn new(
        state: Arc<RuntimeState>,
        backend: Arc<dyn CompletionBackend>,
        routing: &RoutingConfig,
    ) -> Self {
        Self {
            state,
            backend,
            history: HistoryCache::new(Duration::from_secs(routing.history_cache_ttl_secs)),
            history_limit: routing.history_limit,
            apology: routing.apology.clone(),
        }
    }

    pub fn state(&self) -> &Arc<RuntimeState> {
        &self.state
    }

    pub fn history(&self) -> &HistoryCache {
        &self.history
    }

    /// Run one message through admission, eligibility, and reply generation.
    ///
    /// Never fails: every error ends as a logged outcome (and, past the
    /// backend step, an apology to the channel).
    pub async fn handle(&self, transport: Arc<dyn Transport>, message: IncomingMessage) -> Outcome {
        let Some(me) = transport.self_info() else {
            return Outcome::Ignored(IgnoreReason::NotLoggedIn);
        };
        if message.author.id == me.user_id {
            return Outcome::Ignored(IgnoreReason::OwnMessage);
        }

        let channel = message.destination.channel_id();
        if message.author.bot {
            if !self
                .state
                .chains
                .admit(channel, &message.author.id, message.received_at)
            {
                return Outcome::ChainLimited;
            }
        } else {
            self.state.chains.reset(channel);
        }

        if message.content.trim().is_empty() {
            return Outcome::Ignored(IgnoreReason::EmptyContent);
        }

        let eligible = can_respond(&message.destination, || {
            transport.permissions_for(&message.destination)
        })
        .await;
        if !eligible {
            return Outcome::Ineligible;
        }

        if message.destination.is_direct() {
            return self.handle_direct(transport.as_ref(), &message).await;
        }

        let mode = if is_addressed(&message, &me) {
            ReplyMode::Addressed
        } else {
            ReplyMode::Ambient
        };
        self.respond(transport.as_ref(), &message, mode).await
    }
}

/// True when the message mentions the identity or contains its display name
/// (case-insensitive substring). An empty display name never matches.
pub fn is_addressed(message: &IncomingMessage, me: &SelfInfo) -> bool {
    if message.mentions_user(&me.user_id) {
        return true;
    }
    let name = me.display_name.trim();
    !name.is_empty()
        && message
            .content
            .to_lowercase()
            .contains(&name.to_lowercase())
}

#[async_trait]
impl EventSink for Router {
    async fn on_message(&self, transport: Arc<dyn Transport>, message: IncomingMessage) {
        let identity = transport.identity().id.clone();
        let channel = message.destination.channel_id().to_string();
        let outcome = self.handle(transport, message).await;
        debug!(identity = %identity, channel = %channel, outcome = ?outcome, "message handled");
    }

    fn on_error(&self, identity: &IdentityId, error: &ChannelError) {
        error!(identity = %identity, error = %error, "transport error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chorus_channels::Author;
    use chorus_core::types::Destination;

    fn message(content: &str, mentions: &[&str]) -> IncomingMessage {
        IncomingMessage {
            id: "1".into(),
            destination: Destination::GuildText {
                channel_id: "10".into(),
                guild_id: "1".into(),
            },
            author: Author {
                id: "7".into(),
                name: "alice".into(),
                bot: false,
            },
            content: content.into(),
            mentions: mentions.iter().map(|m| m.to_string()).collect(),
            received_at: chrono::Utc::now(),
        }
    }

    fn me(name: &str) -> SelfInfo {
        SelfInfo {
            user_id: "100".into(),
            display_name: name.into(),
        }
    }

    #[test]
    fn mention_addresses() {
        assert!(is_addressed(&message("hey you", &["100"]), &me("Aria")));
    }

    #[test]
    fn name_match_is_case_insensitive_substring() {
        assert!(is_addressed(&message("what do you think, ARIA?", &[]), &me("Aria")));
        // Substring matches are intentional, even inside other words.
        assert!(is_addressed(&message("malaria season", &[]), &me("Aria")));
    }

    #[test]
    fn unrelated_message_is_ambient() {
        assert!(!is_addressed(&message("nice weather", &["55"]), &me("Aria")));
    }

    #[test]
    fn empty_display_name_never_matches() {
        assert!(!is_addressed(&message("anything", &[]), &me("  ")));
    }
}
