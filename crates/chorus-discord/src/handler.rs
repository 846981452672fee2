use std::sync::{Arc, Mutex, OnceLock};

use chrono::Utc;
use serenity::async_trait;
use serenity::model::channel::{Channel, ChannelType, Message};
use serenity::model::gateway::Ready;
use serenity::prelude::{Context, EventHandler};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use chorus_channels::{Author, EventSink, IncomingMessage, SelfInfo, Transport};
use chorus_core::types::{Destination, IdentityId};

use crate::transport::{is_thread, DiscordTransport};

/// Serenity event handler for one identity. Turns gateway events into
/// [`IncomingMessage`]s and hands them to the shared sink.
pub(crate) struct DiscordHandler {
    pub identity: IdentityId,
    pub sink: Arc<dyn EventSink>,
    pub me: Arc<OnceLock<SelfInfo>>,
    /// Filled in by the connector right after the client is built.
    pub transport: Arc<OnceLock<Arc<DiscordTransport>>>,
    /// Fired on the first `ready` so the connector knows login succeeded.
    pub ready_tx: Mutex<Option<oneshot::Sender<()>>>,
}

#[async_trait]
impl EventHandler for DiscordHandler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        let me = SelfInfo {
            user_id: ready.user.id.to_string(),
            display_name: preferred_name(ready.user.global_name.as_deref(), &ready.user.name),
        };
        if self.me.set(me).is_err() {
            debug!(identity = %self.identity, "gateway re-identified");
        }

        info!(
            identity = %self.identity,
            name = %ready.user.name,
            display_name = ?ready.user.global_name,
            "Discord bot connected"
        );

        if let Ok(mut slot) = self.ready_tx.lock() {
            if let Some(tx) = slot.take() {
                let _ = tx.send(());
            }
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        let Some(transport) = self.transport.get() else {
            debug!(identity = %self.identity, "message before transport was ready, dropping");
            return;
        };

        let destination = classify(&ctx, &msg).await;
        let incoming = IncomingMessage {
            id: msg.id.to_string(),
            destination,
            author: Author {
                id: msg.author.id.to_string(),
                name: msg.author.display_name().to_string(),
                bot: msg.author.bot,
            },
            content: msg.content.clone(),
            mentions: msg.mentions.iter().map(|u| u.id.to_string()).collect(),
            received_at: Utc::now(),
        };

        let sink = Arc::clone(&self.sink);
        let transport: Arc<dyn Transport> = Arc::clone(transport) as Arc<dyn Transport>;
        tokio::spawn(async move {
            sink.on_message(transport, incoming).await;
        });
    }
}

/// The name people see and type: the global display name when set, else
/// the account username.
fn preferred_name(global_name: Option<&str>, username: &str) -> String {
    match global_name.map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => username.to_string(),
    }
}

/// Work out what kind of destination a message was posted in.
///
/// Lookup failures classify as [`Destination::Unsupported`], which the
/// eligibility gate never answers.
async fn classify(ctx: &Context, msg: &Message) -> Destination {
    let channel_id = msg.channel_id.to_string();

    let Some(guild_id) = msg.guild_id else {
        return Destination::Direct { channel_id };
    };
    let guild_id = guild_id.to_string();

    match msg.channel(ctx).await {
        Ok(Channel::Guild(channel)) => guild_destination(channel.kind, channel_id, guild_id),
        Ok(Channel::Private(_)) => Destination::Direct { channel_id },
        Ok(_) => Destination::Unsupported { channel_id },
        Err(e) => {
            warn!(channel = %channel_id, error = %e, "could not resolve channel kind");
            Destination::Unsupported { channel_id }
        }
    }
}

fn guild_destination(kind: ChannelType, channel_id: String, guild_id: String) -> Destination {
    match kind {
        ChannelType::Text | ChannelType::News => Destination::GuildText {
            channel_id,
            guild_id,
        },
        k if is_thread(k) => Destination::Thread {
            channel_id,
            guild_id,
        },
        _ => Destination::Unsupported { channel_id },
    }
}
