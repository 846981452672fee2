//! Reply generation for chat identities: the completion backend, the
//! history cache, and the routing pipeline that ties them to a transport.

pub mod history;
pub mod openai;
pub mod pipeline;
pub mod provider;

pub use history::HistoryCache;
pub use openai::OpenAiCompatBackend;
pub use pipeline::{IgnoreReason, Outcome, ReplyMode, Router};
pub use provider::{Completion, CompletionBackend, CompletionRequest, ProviderError};
