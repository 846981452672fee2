use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::builder::GetMessages;
use serenity::cache::Cache;
use serenity::gateway::ShardManager;
use serenity::http::Http;
use serenity::model::channel::{Channel, ChannelType, GuildChannel, Message};
use serenity::model::id::{ChannelId, MessageId, UserId};
use serenity::model::permissions::Permissions;
use serenity::Client;
use tokio::task::AbortHandle;
use tracing::{debug, info};

use chorus_channels::{ChannelError, IncomingMessage, SelfInfo, Transport};
use chorus_core::config::{IdentityConfig, MAX_HISTORY_LIMIT};
use chorus_core::types::{Capability, CapabilitySet, Destination, HistoryRecord};

use crate::error::DiscordError;
use crate::send;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// A logged-in Discord bot account.
///
/// REST calls go through `http`; the gateway (event stream) runs on its own
/// task and is stopped by [`destroy`](Transport::destroy).
pub struct DiscordTransport {
    identity: IdentityConfig,
    http: Arc<Http>,
    cache: Arc<Cache>,
    shard_manager: Arc<ShardManager>,
    me: Arc<OnceLock<SelfInfo>>,
    gateway_task: OnceLock<AbortHandle>,
}

impl DiscordTransport {
    pub(crate) fn new(identity: IdentityConfig, client: &Client, me: Arc<OnceLock<SelfInfo>>) -> Self {
        Self {
            identity,
            http: Arc::clone(&client.http),
            cache: Arc::clone(&client.cache),
            shard_manager: Arc::clone(&client.shard_manager),
            me,
            gateway_task: OnceLock::new(),
        }
    }

    pub(crate) fn set_gateway_task(&self, handle: AbortHandle) {
        let _ = self.gateway_task.set(handle);
    }

    async fn guild_channel(&self, id: ChannelId) -> Result<Option<GuildChannel>, ChannelError> {
        match id.to_channel((&self.cache, &*self.http)).await {
            Ok(Channel::Guild(channel)) => Ok(Some(channel)),
            Ok(_) => Ok(None),
            Err(e) => Err(ChannelError::FetchFailed(e.to_string())),
        }
    }
}

#[async_trait]
impl Transport for DiscordTransport {
    fn identity(&self) -> &IdentityConfig {
        &self.identity
    }

    fn self_info(&self) -> Option<SelfInfo> {
        self.me.get().cloned()
    }

    async fn send_typing(&self, destination: &Destination) -> Result<(), ChannelError> {
        let channel_id = channel_id(destination).map_err(send_err)?;
        channel_id
            .broadcast_typing(&self.http)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    async fn send(&self, destination: &Destination, text: &str) -> Result<(), ChannelError> {
        let channel_id = channel_id(destination).map_err(send_err)?;
        send::send_chunked(&self.http, channel_id, text)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    async fn reply(&self, message: &IncomingMessage, text: &str) -> Result<(), ChannelError> {
        let channel_id = channel_id(&message.destination).map_err(send_err)?;
        let reply_to = MessageId::new(parse_id(&message.id).map_err(send_err)?);
        send::reply_chunked(&self.http, channel_id, reply_to, text)
            .await
            .map_err(|e| ChannelError::SendFailed(e.to_string()))
    }

    async fn permissions_for(
        &self,
        destination: &Destination,
    ) -> Result<Option<CapabilitySet>, ChannelError> {
        let Some(me) = self.me.get() else {
            return Ok(None);
        };
        let user_id = UserId::new(parse_id(&me.user_id).map_err(fetch_err)?);
        let Some(mut channel) = self.guild_channel(channel_id(destination).map_err(fetch_err)?).await?
        else {
            return Ok(None);
        };

        // Thread permissions are inherited from the parent channel.
        if is_thread(channel.kind) {
            if let Some(parent_id) = channel.parent_id {
                match self.guild_channel(parent_id).await? {
                    Some(parent) => channel = parent,
                    None => return Ok(None),
                }
            }
        }

        let permissions = channel
            .permissions_for_user(&self.cache, user_id)
            .map_err(|e| ChannelError::FetchFailed(e.to_string()))?;
        Ok(Some(capabilities(permissions)))
    }

    async fn fetch_recent(
        &self,
        destination: &Destination,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, ChannelError> {
        let channel_id = channel_id(destination).map_err(fetch_err)?;
        let limit = limit.clamp(1, MAX_HISTORY_LIMIT) as u8;
        let messages = channel_id
            .messages(&*self.http, GetMessages::new().limit(limit))
            .await
            .map_err(|e| ChannelError::FetchFailed(e.to_string()))?;

        debug!(channel = %channel_id, count = messages.len(), "fetched history");
        // Discord returns newest first.
        Ok(messages.iter().rev().map(history_record).collect())
    }

    async fn destroy(&self) -> Result<(), ChannelError> {
        info!(identity = %self.identity.id, "closing discord gateway");
        let shutdown = tokio::time::timeout(SHUTDOWN_TIMEOUT, self.shard_manager.shutdown_all()).await;
        if let Some(task) = self.gateway_task.get() {
            task.abort();
        }
        shutdown.map_err(|_| ChannelError::Timeout {
            ms: SHUTDOWN_TIMEOUT.as_millis() as u64,
        })
    }
}

pub(crate) fn is_thread(kind: ChannelType) -> bool {
    matches!(
        kind,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
    )
}

/// Translate Discord permission bits into the capabilities we care about.
pub fn capabilities(permissions: Permissions) -> CapabilitySet {
    [
        (Permissions::VIEW_CHANNEL, Capability::View),
        (Permissions::SEND_MESSAGES, Capability::SendMessages),
        (Permissions::READ_MESSAGE_HISTORY, Capability::ReadHistory),
        (Permissions::SEND_MESSAGES_IN_THREADS, Capability::SendMessagesInThreads),
    ]
    .into_iter()
    .filter(|(bit, _)| permissions.contains(*bit))
    .map(|(_, cap)| cap)
    .collect()
}

fn history_record(message: &Message) -> HistoryRecord {
    HistoryRecord {
        message_id: message.id.to_string(),
        author_id: message.author.id.to_string(),
        author_name: message.author.display_name().to_string(),
        author_is_bot: message.author.bot,
        content: message.content.clone(),
        timestamp: DateTime::from_timestamp(message.timestamp.unix_timestamp(), 0)
            .unwrap_or_else(Utc::now),
    }
}

/// Parse a snowflake. Zero is rejected because serenity ids panic on it.
pub(crate) fn parse_id(raw: &str) -> Result<u64, DiscordError> {
    raw.parse::<u64>()
        .ok()
        .filter(|id| *id != 0)
        .ok_or_else(|| DiscordError::InvalidId(raw.to_string()))
}

fn channel_id(destination: &Destination) -> Result<ChannelId, DiscordError> {
    parse_id(destination.channel_id()).map(ChannelId::new)
}

fn send_err(e: DiscordError) -> ChannelError {
    ChannelError::SendFailed(e.to_string())
}

fn fetch_err(e: DiscordError) -> ChannelError {
    ChannelError::FetchFailed(e.to_string())
}
