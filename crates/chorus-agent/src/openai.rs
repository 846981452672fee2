use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use chorus_core::config::BackendConfig;

use crate::provider::{Completion, CompletionBackend, CompletionRequest, ProviderError};

/// Backend speaking the OpenAI chat-completions wire format.
///
/// The persona code is sent as the `model`, so one endpoint can serve every
/// identity. HTTP 429 maps to [`Completion::RateLimited`].
pub struct OpenAiCompatBackend {
    client: reqwest::Client,
    api_key: Option<String>,
    url: String,
    max_tokens: u32,
}

impl OpenAiCompatBackend {
    pub fn new(config: &BackendConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            url: format!("{}{}", config.base_url.trim_end_matches('/'), config.chat_path),
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiCompatBackend {
    fn name(&self) -> &str {
        "openai-compat"
    }

    async fn complete(&self, req: &CompletionRequest) -> Result<Completion, ProviderError> {
        let body = build_request_body(req, self.max_tokens);

        debug!(persona = %req.persona, history = req.history.len(), "sending completion request");

        let mut builder = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let resp = builder.send().await?;

        let status = resp.status().as_u16();
        if status == 429 {
            debug!(persona = %req.persona, "backend rate limited");
            return Ok(Completion::RateLimited);
        }

        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "completion API error");
            return Err(ProviderError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        parse_response(api_resp)
    }
}

fn build_request_body(req: &CompletionRequest, max_tokens: u32) -> serde_json::Value {
    // Our own past messages become assistant turns; everyone else is a user
    // turn prefixed with their name so the persona can tell speakers apart.
    let messages: Vec<serde_json::Value> = req
        .history
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .map(|m| {
            if m.author_id == req.self_user_id {
                serde_json::json!({
                    "role": "assistant",
                    "content": m.content,
                })
            } else {
                serde_json::json!({
                    "role": "user",
                    "content": format!("{}: {}", m.author_name, m.content),
                })
            }
        })
        .collect();

    serde_json::json!({
        "model": req.persona,
        "messages": messages,
        "max_tokens": max_tokens,
        "content_filter": req.content_filter,
        "stream": false,
    })
}

fn parse_response(resp: ApiResponse) -> Result<Completion, ProviderError> {
    if let Some(usage) = &resp.usage {
        debug!(
            tokens_in = usage.prompt_tokens,
            tokens_out = usage.completion_tokens,
            "completion usage"
        );
    }
    let choice = resp
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| ProviderError::Parse("response has no choices".to_string()))?;
    Ok(Completion::Reply(
        choice.message.content.unwrap_or_default().trim().to_string(),
    ))
}

// Response types (private, deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
