use std::sync::Arc;

use async_trait::async_trait;

use chorus_core::config::IdentityConfig;
use chorus_core::types::{CapabilitySet, Destination, HistoryRecord, IdentityId};

use crate::{
    error::ChannelError,
    types::{IncomingMessage, SelfInfo},
};

/// A live, logged-in connection for one identity.
///
/// Implementations must be `Send + Sync`: message tasks for many channels
/// call into the same transport concurrently.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The configured identity this connection belongs to.
    fn identity(&self) -> &IdentityConfig;

    /// Account info learned at login. `None` until login has completed.
    fn self_info(&self) -> Option<SelfInfo>;

    /// Show a typing indicator in `destination`.
    async fn send_typing(&self, destination: &Destination) -> Result<(), ChannelError>;

    /// Post a plain message into `destination`.
    async fn send(&self, destination: &Destination, text: &str) -> Result<(), ChannelError>;

    /// Post a message that quotes/links back to `message`.
    async fn reply(&self, message: &IncomingMessage, text: &str) -> Result<(), ChannelError>;

    /// Capabilities this identity holds in `destination`.
    ///
    /// `Ok(None)` means the platform had nothing to report.
    async fn permissions_for(
        &self,
        destination: &Destination,
    ) -> Result<Option<CapabilitySet>, ChannelError>;

    /// Up to `limit` most recent messages in `destination`, oldest first.
    async fn fetch_recent(
        &self,
        destination: &Destination,
        limit: usize,
    ) -> Result<Vec<HistoryRecord>, ChannelError>;

    /// Tear the connection down.
    async fn destroy(&self) -> Result<(), ChannelError>;
}

/// Receives events from every live transport.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Handle one incoming message. Called on its own task per message.
    async fn on_message(&self, transport: Arc<dyn Transport>, message: IncomingMessage);

    /// A live connection reported an error.
    fn on_error(&self, identity: &IdentityId, error: &ChannelError);
}

/// Opens transports. One call per identity; login happens inside `connect`.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect and log in, wiring events to `sink`.
    ///
    /// Must only return `Ok` once login is confirmed.
    async fn connect(
        &self,
        identity: IdentityConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<Arc<dyn Transport>, ChannelError>;
}
