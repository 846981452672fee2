use thiserror::Error;

/// Errors that can occur within any transport.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The underlying transport could not be established.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The platform rejected the supplied credentials or token.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// A message could not be delivered to the remote endpoint.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// History or permission lookup failed.
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// An operation exceeded its allowed time budget.
    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// Tearing down the connection failed.
    #[error("Disconnect failed: {0}")]
    DisconnectFailed(String),
}
