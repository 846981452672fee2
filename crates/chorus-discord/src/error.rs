use chorus_channels::ChannelError;
use serenity::gateway::GatewayError;

/// Errors produced by the Discord transport.
#[derive(Debug, thiserror::Error)]
pub enum DiscordError {
    #[error("serenity error: {0}")]
    Serenity(#[from] serenity::Error),

    #[error("invalid discord id: {0:?}")]
    InvalidId(String),

    #[error("gateway stopped before login completed")]
    GatewayClosed,
}

impl DiscordError {
    /// Map a failure during login to the transport-level error.
    pub fn into_login_error(self) -> ChannelError {
        match self {
            DiscordError::Serenity(serenity::Error::Gateway(GatewayError::InvalidAuthentication)) => {
                ChannelError::AuthFailed("discord rejected the bot token".to_string())
            }
            other => ChannelError::ConnectionFailed(other.to_string()),
        }
    }
}
