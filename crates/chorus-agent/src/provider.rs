use std::sync::Arc;

use async_trait::async_trait;

use chorus_core::types::HistoryRecord;

/// Everything the backend needs to produce one reply.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Persona code bound to the identity.
    pub persona: String,
    /// Recent messages in the destination, oldest first.
    pub history: Arc<Vec<HistoryRecord>>,
    /// Platform user id of the identity, so its own messages can be told apart.
    pub self_user_id: String,
    /// Ask the backend to apply its content filter.
    pub content_filter: bool,
}

/// Backend answer. Rate limiting is a normal outcome, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Reply(String),
    RateLimited,
}

/// Conversational-AI backend.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    async fn complete(&self, req: &CompletionRequest) -> Result<Completion, ProviderError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}
