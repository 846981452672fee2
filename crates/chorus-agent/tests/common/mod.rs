// Test doubles shared by the routing tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use chorus_agent::{Completion, CompletionBackend, CompletionRequest, ProviderError, Router};
use chorus_channels::{Author, ChannelError, IncomingMessage, RuntimeState, SelfInfo, Transport};
use chorus_core::config::{IdentityConfig, RoutingConfig};
use chorus_core::types::{Capability, CapabilitySet, Destination, HistoryRecord, IdentityId};

pub const APOLOGY: &str = "sorry, try again";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Typing(String),
    Send { channel: String, text: String },
    Reply { to: String, text: String },
}

pub struct MockTransport {
    identity: IdentityConfig,
    me: SelfInfo,
    pub actions: Mutex<Vec<Action>>,
    pub permissions: Mutex<Result<Option<CapabilitySet>, String>>,
    pub history_error: Mutex<Option<String>>,
    /// Messages posted in the channel so far; shareable between transports.
    pub log: Arc<Mutex<Vec<HistoryRecord>>>,
    pub fail_typing: AtomicBool,
    /// Fail this many deliveries (send or reply) before succeeding.
    pub failing_deliveries: AtomicUsize,
    pub fetches: AtomicUsize,
    pub permission_lookups: AtomicUsize,
}

impl MockTransport {
    pub fn new(id: &str, user_id: &str, display_name: &str) -> Arc<Self> {
        Self::with_log(id, user_id, display_name, Arc::default())
    }

    /// A transport that sees the same channel log as other transports built
    /// with the same `log`.
    pub fn with_log(
        id: &str,
        user_id: &str,
        display_name: &str,
        log: Arc<Mutex<Vec<HistoryRecord>>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            identity: IdentityConfig {
                id: IdentityId::from(id),
                token: format!("token-{id}"),
                persona: format!("char_{id}"),
                content_filter: true,
            },
            me: SelfInfo {
                user_id: user_id.to_string(),
                display_name: display_name.to_string(),
            },
            actions: Mutex::new(Vec::new()),
            permissions: Mutex::new(Ok(Some(full_text_caps()))),
            history_error: Mutex::new(None),
            log,
            fail_typing: AtomicBool::new(false),
            failing_deliveries: AtomicUsize::new(0),
            fetches: AtomicUsize::new(0),
            permission_lookups: AtomicUsize::new(0),
        })
    }

    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().unwrap().clone()
    }

    /// Deliveries only, typing indicators filtered out.
    pub fn deliveries(&self) -> Vec<Action> {
        self.actions()
            .into_iter()
            .filter(|a| !matches!(a, Action::Typing(_)))
            .collect()
    }

    pub fn set_permissions(&self, perms: Result<Option<CapabilitySet>, String>) {
        *self.permissions.lock().unwrap() = perms;
    }

    pub fn fail_history(&self, reason: &str) {
        *self.history_error.lock().unwrap() = Some(reason.to_string());
    }

    /// Make `message` visible to later history fetches.
    pub fn post(&self, message: &IncomingMessage) {
        self.log.lock().unwrap().push(HistoryRecord {
            message_id: message.id.clone(),
            author_id: message.author.id.clone(),
            author_name: message.author.name.clone(),
            author_is_bot: message.author.bot,
            content: message.content.clone(),
            timestamp: message.received_at,
        });
    }

    fn take_delivery_failure(&self) -> bool {
        self.failing_deliveries
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn identity(&self) -> &IdentityConfig {
        &self.identity
    }

    fn self_info(&self) -> Option<SelfInfo> {
        Some(self.me.clone())
    }

    async fn send_typing(&self, destination: &Destination) -> Result<(), ChannelError> {
        if self.fail_typing.load(Ordering::SeqCst) {
            return Err(ChannelError::SendFailed("mock typing failure".into()));
        }
        self.actions
            .lock()
            .unwrap()
            .push(Action::Typing(destination.channel_id().to_string()));
        Ok(())
    }

    async fn send(&self, destination: &Destination, text: &str) -> Result<(), ChannelError> {
        if self.take_delivery_failure() {
            return Err(ChannelError::SendFailed("mock send failure".into()));
        }
        self.actions.lock().unwrap().push(Action::Send {
            channel: destination.channel_id().to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn reply(&self, message: &IncomingMessage, text: &str) -> Result<(), ChannelError> {
        if self.take_delivery_failure() {
            return Err(ChannelError::SendFailed("mock reply failure".into()));
        }
        self.actions.lock().unwrap().push(Action::Reply {
            to: message.id.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn permissions_for(
        &self,
        _: &Destination,
    ) -> Result<Option<CapabilitySet>, ChannelError> {
        self.permission_lookups.fetch_add(1, Ordering::SeqCst);
        self.permissions
            .lock()
            .unwrap()
            .clone()
            .map_err(ChannelError::FetchFailed)
    }

    async fn fetch_recent(
        &self,
        destination: &Destination,
        _limit: usize,
    ) -> Result<Vec<HistoryRecord>, ChannelError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.history_error.lock().unwrap().clone() {
            return Err(ChannelError::FetchFailed(reason));
        }
        let mut records = vec![HistoryRecord {
            message_id: format!("h-{}", destination.channel_id()),
            author_id: "7".into(),
            author_name: "alice".into(),
            author_is_bot: false,
            content: "earlier message".into(),
            timestamp: Utc::now(),
        }];
        records.extend(self.log.lock().unwrap().iter().cloned());
        Ok(records)
    }

    async fn destroy(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

/// Backend that always returns the same scripted result.
pub struct MockBackend {
    script: Mutex<Script>,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<CompletionRequest>>,
}

#[derive(Clone)]
pub enum Script {
    Reply(String),
    RateLimited,
    Fail,
}

impl MockBackend {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn replying(text: &str) -> Arc<Self> {
        Self::new(Script::Reply(text.to_string()))
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, req: &CompletionRequest) -> Result<Completion, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(req.clone());
        match self.script.lock().unwrap().clone() {
            Script::Reply(text) => Ok(Completion::Reply(text)),
            Script::RateLimited => Ok(Completion::RateLimited),
            Script::Fail => Err(ProviderError::Api {
                status: 503,
                message: "mock outage".into(),
            }),
        }
    }
}

pub fn full_text_caps() -> CapabilitySet {
    Capability::ALL.into_iter().collect()
}

pub fn routing() -> RoutingConfig {
    RoutingConfig {
        apology: APOLOGY.to_string(),
        ..RoutingConfig::default()
    }
}

pub fn router(backend: Arc<MockBackend>) -> Router {
    router_with(backend, routing())
}

pub fn router_with(backend: Arc<MockBackend>, config: RoutingConfig) -> Router {
    Router::new(Arc::new(RuntimeState::new(&config)), backend, &config)
}

pub fn guild(channel_id: &str) -> Destination {
    Destination::GuildText {
        channel_id: channel_id.to_string(),
        guild_id: "1".to_string(),
    }
}

pub fn dm(channel_id: &str) -> Destination {
    Destination::Direct {
        channel_id: channel_id.to_string(),
    }
}

pub struct MessageBuilder {
    msg: IncomingMessage,
}

impl MessageBuilder {
    pub fn bot(mut self) -> Self {
        self.msg.author.bot = true;
        self
    }

    pub fn from_user(mut self, id: &str, name: &str) -> Self {
        self.msg.author.id = id.to_string();
        self.msg.author.name = name.to_string();
        self
    }

    pub fn mentioning(mut self, user_id: &str) -> Self {
        self.msg.mentions.push(user_id.to_string());
        self
    }

    pub fn at(mut self, when: DateTime<Utc>) -> Self {
        self.msg.received_at = when;
        self
    }

    pub fn id(mut self, id: &str) -> Self {
        self.msg.id = id.to_string();
        self
    }

    pub fn build(self) -> IncomingMessage {
        self.msg
    }
}

pub fn message(destination: Destination, content: &str) -> MessageBuilder {
    MessageBuilder {
        msg: IncomingMessage {
            id: "m1".to_string(),
            destination,
            author: Author {
                id: "7".to_string(),
                name: "alice".to_string(),
                bot: false,
            },
            content: content.to_string(),
            mentions: Vec::new(),
            received_at: Utc::now(),
        },
    }
}
