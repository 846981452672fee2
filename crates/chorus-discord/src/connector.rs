use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tokio::sync::oneshot;
use tracing::{info, warn};

use chorus_channels::{ChannelError, Connector, EventSink, Transport};
use chorus_core::config::{DiscordConfig, IdentityConfig};

use crate::error::DiscordError;
use crate::handler::DiscordHandler;
use crate::transport::DiscordTransport;

/// Opens one serenity client per identity.
pub struct DiscordConnector {
    login_timeout: Duration,
}

impl DiscordConnector {
    pub fn new(config: &DiscordConfig) -> Self {
        Self {
            login_timeout: Duration::from_secs(config.login_timeout_secs),
        }
    }
}

fn intents() -> GatewayIntents {
    GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::DIRECT_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
}

#[async_trait]
impl Connector for DiscordConnector {
    async fn connect(
        &self,
        identity: IdentityConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Arc<dyn Transport>, ChannelError> {
        let me = Arc::new(OnceLock::new());
        let slot = Arc::new(OnceLock::new());
        let (ready_tx, ready_rx) = oneshot::channel();

        let handler = DiscordHandler {
            identity: identity.id.clone(),
            sink: Arc::clone(&sink),
            me: Arc::clone(&me),
            transport: Arc::clone(&slot),
            ready_tx: Mutex::new(Some(ready_tx)),
        };

        let mut client = Client::builder(&identity.token, intents())
            .event_handler(handler)
            .await
            .map_err(|e| DiscordError::from(e).into_login_error())?;

        let id = identity.id.clone();
        let transport = Arc::new(DiscordTransport::new(identity, &client, me));
        let _ = slot.set(Arc::clone(&transport));

        // Until login completes a start() error goes back to us; after that
        // the receiver is gone and the error is reported to the sink.
        let (failed_tx, failed_rx) = oneshot::channel::<serenity::Error>();
        let task_id = id.clone();
        let task = tokio::spawn(async move {
            info!(identity = %task_id, "Discord: gateway connecting");
            if let Err(e) = client.start().await {
                if let Err(e) = failed_tx.send(e) {
                    warn!(identity = %task_id, error = %e, "Discord: gateway stopped");
                    sink.on_error(&task_id, &ChannelError::ConnectionFailed(e.to_string()));
                }
            }
        });
        transport.set_gateway_task(task.abort_handle());

        match wait_for_login(ready_rx, failed_rx, self.login_timeout).await {
            Ok(()) => {
                info!(identity = %id, "Discord: login confirmed");
                Ok(transport as Arc<dyn Transport>)
            }
            Err(e) => {
                warn!(identity = %id, error = %e, "Discord: login failed");
                if let Err(teardown) = transport.destroy().await {
                    warn!(identity = %id, error = %teardown, "Discord: teardown after failed login");
                }
                Err(e)
            }
        }
    }
}

/// Wait for the first `ready`, a start-up error, or the timeout.
async fn wait_for_login(
    ready: oneshot::Receiver<()>,
    failed: oneshot::Receiver<serenity::Error>,
    timeout: Duration,
) -> Result<(), ChannelError> {
    let wait = async {
        tokio::select! {
            // A failed start drops the handler (and its sender) right after
            // reporting, so check the error first.
            biased;
            failed = failed => match failed {
                Ok(e) => Err(DiscordError::from(e).into_login_error()),
                Err(_) => Err(DiscordError::GatewayClosed.into_login_error()),
            },
            ready = ready => ready.map_err(|_| DiscordError::GatewayClosed.into_login_error()),
        }
    };

    tokio::time::timeout(timeout, wait)
        .await
        .map_err(|_| ChannelError::Timeout {
            ms: timeout.as_millis() as u64,
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use serenity::gateway::GatewayError;

    const WAIT: Duration = Duration::from_secs(1);

    #[tokio::test]
    async fn ready_means_logged_in() {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (_failed_tx, failed_rx) = oneshot::channel::<serenity::Error>();
        ready_tx.send(()).unwrap();

        assert!(wait_for_login(ready_rx, failed_rx, WAIT).await.is_ok());
    }

    #[tokio::test]
    async fn rejected_token_is_auth_failure() {
        let (_ready_tx, ready_rx) = oneshot::channel();
        let (failed_tx, failed_rx) = oneshot::channel();
        failed_tx
            .send(serenity::Error::Gateway(GatewayError::InvalidAuthentication))
            .unwrap();

        let err = wait_for_login(ready_rx, failed_rx, WAIT).await.unwrap_err();
        assert!(matches!(err, ChannelError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn error_wins_over_dropped_ready_sender() {
        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let (failed_tx, failed_rx) = oneshot::channel();
        failed_tx
            .send(serenity::Error::Gateway(GatewayError::InvalidAuthentication))
            .unwrap();
        drop(ready_tx);

        let err = wait_for_login(ready_rx, failed_rx, WAIT).await.unwrap_err();
        assert!(matches!(err, ChannelError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn gateway_closing_early_is_connection_failure() {
        let (ready_tx, ready_rx) = oneshot::channel::<()>();
        let (failed_tx, failed_rx) = oneshot::channel::<serenity::Error>();
        drop(failed_tx);
        drop(ready_tx);

        let err = wait_for_login(ready_rx, failed_rx, WAIT).await.unwrap_err();
        assert!(matches!(err, ChannelError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn silence_times_out() {
        let (_ready_tx, ready_rx) = oneshot::channel::<()>();
        let (_failed_tx, failed_rx) = oneshot::channel::<serenity::Error>();

        let err = wait_for_login(ready_rx, failed_rx, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Timeout { ms: 50 }));
    }
}
