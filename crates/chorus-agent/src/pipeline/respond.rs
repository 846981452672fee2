use tracing::{debug, info, warn};

use chorus_channels::{ChannelError, IncomingMessage, Transport};

use crate::provider::{Completion, CompletionRequest, ProviderError};

use super::router::Router;

/// How a response is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyMode {
    /// Quote/link the triggering message (mentions, name matches, DMs).
    Addressed,
    /// Plain message into the destination.
    Ambient,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    NotLoggedIn,
    OwnMessage,
    EmptyContent,
}

/// What happened to one incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ignored(IgnoreReason),
    /// Loop guard refused a bot-authored message.
    ChainLimited,
    /// The identity cannot post into the destination.
    Ineligible,
    /// Backend asked us to stay quiet this turn.
    RateLimited,
    Delivered(ReplyMode),
    /// Something failed; the apology went out instead.
    Apologized(ReplyMode),
    /// Something failed and the apology could not be delivered either.
    Failed,
}

/// Failures between "decided to answer" and "answer delivered".
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("history fetch failed: {0}")]
    History(#[source] ChannelError),

    #[error("backend failed: {0}")]
    Backend(#[from] ProviderError),

    #[error("backend returned an empty reply")]
    EmptyReply,

    #[error("delivery failed: {0}")]
    Delivery(#[source] ChannelError),
}

impl Router {
    /// Typing, history, backend, delivery. Shared by channel and DM paths.
    pub(crate) async fn respond(
        &self,
        transport: &dyn Transport,
        message: &IncomingMessage,
        mode: ReplyMode,
    ) -> Outcome {
        let identity = &transport.identity().id;
        let channel = message.destination.channel_id();

        if let Err(e) = transport.send_typing(&message.destination).await {
            debug!(identity = %identity, channel = %channel, error = %e, "typing indicator failed");
        }

        let result = match self.generate(transport, message).await {
            Ok(Completion::RateLimited) => {
                info!(identity = %identity, channel = %channel, "backend rate limited, dropping reply");
                return Outcome::RateLimited;
            }
            Ok(Completion::Reply(text)) => deliver(transport, message, mode, &text)
                .await
                .map_err(RouteError::Delivery),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => Outcome::Delivered(mode),
            Err(e) => {
                warn!(
                    identity = %identity,
                    channel = %channel,
                    backend = %self.backend.name(),
                    message_id = %message.id,
                    error = %e,
                    "reply failed, sending apology"
                );
                match deliver(transport, message, mode, &self.apology).await {
                    Ok(()) => Outcome::Apologized(mode),
                    Err(e) => {
                        warn!(identity = %identity, channel = %channel, error = %e, "apology delivery failed");
                        Outcome::Failed
                    }
                }
            }
        }
    }

    async fn generate(
        &self,
        transport: &dyn Transport,
        message: &IncomingMessage,
    ) -> Result<Completion, RouteError> {
        let identity = transport.identity();
        let history = self
            .history
            .fetch_recent(
                transport,
                &message.destination,
                self.history_limit,
                &message.id,
            )
            .await
            .map_err(RouteError::History)?;

        let request = CompletionRequest {
            persona: identity.persona.clone(),
            history,
            self_user_id: transport
                .self_info()
                .map(|s| s.user_id)
                .unwrap_or_default(),
            content_filter: identity.content_filter,
        };

        match self.backend.complete(&request).await? {
            Completion::Reply(text) if text.trim().is_empty() => Err(RouteError::EmptyReply),
            other => Ok(other),
        }
    }
}

async fn deliver(
    transport: &dyn Transport,
    message: &IncomingMessage,
    mode: ReplyMode,
    text: &str,
) -> Result<(), ChannelError> {
    match mode {
        ReplyMode::Addressed => transport.reply(message, text).await,
        ReplyMode::Ambient => transport.send(&message.destination, text).await,
    }
}
