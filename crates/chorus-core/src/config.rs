use std::collections::HashSet;
use std::fmt;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ChorusError, Result};
use crate::types::IdentityId;

// Routing defaults
pub const DEFAULT_MAX_BOT_CHAIN: u32 = 3;
pub const DEFAULT_INACTIVITY_RESET_SECS: u64 = 600; // 10 minutes of silence ends a chain
pub const DEFAULT_HISTORY_LIMIT: usize = 75;
pub const MAX_HISTORY_LIMIT: usize = 100; // Discord returns at most 100 messages per page
pub const DEFAULT_HISTORY_CACHE_TTL_SECS: u64 = 10;
pub const DEFAULT_APOLOGY: &str =
    "Sorry, I couldn't come up with a reply just now. Please try again in a moment.";

// Backend defaults
pub const DEFAULT_CHAT_PATH: &str = "/v1/chat/completions";
pub const DEFAULT_MAX_TOKENS: u32 = 512;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 30;

/// Top-level config (chorus.toml + CHORUS_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChorusConfig {
    pub identities: Vec<IdentityConfig>,
    pub backend: BackendConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
}

/// One bot persona: its own login token and AI persona binding.
#[derive(Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub id: IdentityId,
    /// Discord bot token.
    pub token: String,
    /// Persona code passed to the completion backend.
    pub persona: String,
    /// Ask the backend to apply its content filter. Defaults to true.
    #[serde(default = "bool_true")]
    pub content_filter: bool,
}

// Hand-written so the bot token never lands in logs.
impl fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("id", &self.id)
            .field("token", &"<redacted>")
            .field("persona", &self.persona)
            .field("content_filter", &self.content_filter)
            .finish()
    }
}

/// OpenAI-compatible completion endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL without trailing slash, e.g. `https://persona.example.com`.
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_chat_path")]
    pub chat_path: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Bot-to-bot hops allowed in one channel before replies stop.
    #[serde(default = "default_max_bot_chain")]
    pub max_bot_chain: u32,
    /// Idle gap after which a bot chain is forgotten.
    #[serde(default = "default_inactivity_reset_secs")]
    pub inactivity_reset_secs: u64,
    /// Number of recent messages handed to the backend.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// How long fetched history may be reused. 0 disables the cache.
    #[serde(default = "default_history_cache_ttl_secs")]
    pub history_cache_ttl_secs: u64,
    /// Text sent when a reply could not be produced.
    #[serde(default = "default_apology")]
    pub apology: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_bot_chain: DEFAULT_MAX_BOT_CHAIN,
            inactivity_reset_secs: DEFAULT_INACTIVITY_RESET_SECS,
            history_limit: DEFAULT_HISTORY_LIMIT,
            history_cache_ttl_secs: DEFAULT_HISTORY_CACHE_TTL_SECS,
            apology: DEFAULT_APOLOGY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// How long to wait for the gateway `ready` event before giving up on a login.
    #[serde(default = "default_login_timeout_secs")]
    pub login_timeout_secs: u64,
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            login_timeout_secs: DEFAULT_LOGIN_TIMEOUT_SECS,
        }
    }
}

fn bool_true() -> bool {
    true
}
fn default_chat_path() -> String {
    DEFAULT_CHAT_PATH.to_string()
}
fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}
fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
fn default_max_bot_chain() -> u32 {
    DEFAULT_MAX_BOT_CHAIN
}
fn default_inactivity_reset_secs() -> u64 {
    DEFAULT_INACTIVITY_RESET_SECS
}
fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}
fn default_history_cache_ttl_secs() -> u64 {
    DEFAULT_HISTORY_CACHE_TTL_SECS
}
fn default_apology() -> String {
    DEFAULT_APOLOGY.to_string()
}
fn default_login_timeout_secs() -> u64 {
    DEFAULT_LOGIN_TIMEOUT_SECS
}

impl ChorusConfig {
    /// Load config from a TOML file with CHORUS_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g. `CHORUS_ROUTING__MAX_BOT_CHAIN=5`.
    /// Falls back to `~/.chorus/chorus.toml` when no path is given.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config = Self::from_figment(
            Figment::new()
                .merge(Toml::file(&path))
                .merge(Env::prefixed("CHORUS_").split("__")),
        )?;

        info!(path = %path, identities = config.identities.len(), "config loaded");
        Ok(config)
    }

    /// Extract and validate a config from an already-assembled figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: ChorusConfig = figment
            .extract()
            .map_err(|e| ChorusError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.identities.is_empty() {
            return Err(ChorusError::Config(
                "at least one [[identities]] entry is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for identity in &self.identities {
            if identity.id.as_str().trim().is_empty() {
                return Err(ChorusError::InvalidIdentity {
                    id: identity.id.to_string(),
                    reason: "id must not be empty".to_string(),
                });
            }
            if !seen.insert(identity.id.clone()) {
                return Err(ChorusError::InvalidIdentity {
                    id: identity.id.to_string(),
                    reason: "duplicate id".to_string(),
                });
            }
        }

        if self.routing.max_bot_chain == 0 {
            return Err(ChorusError::Config(
                "routing.max_bot_chain must be at least 1".to_string(),
            ));
        }
        if self.routing.history_limit == 0 || self.routing.history_limit > MAX_HISTORY_LIMIT {
            return Err(ChorusError::Config(format!(
                "routing.history_limit must be between 1 and {MAX_HISTORY_LIMIT}"
            )));
        }

        Ok(())
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.chorus/chorus.toml", home)
}
