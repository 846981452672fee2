use tracing::debug;

use chorus_channels::{IncomingMessage, Transport};
use chorus_sessions::DmKey;

use super::respond::{Outcome, ReplyMode};
use super::router::Router;

impl Router {
    /// DM path: count the message, then always answer reply-style.
    ///
    /// The counter moves before any backend work, so it tracks attempts
    /// rather than successful replies.
    pub(crate) async fn handle_direct(
        &self,
        transport: &dyn Transport,
        message: &IncomingMessage,
    ) -> Outcome {
        let key = DmKey::new(transport.identity().id.clone(), message.author.id.clone());
        let session = self.state.dm_sessions.record(&key, message.received_at);
        debug!(key = %key, count = session.message_count, "direct message");

        self.respond(transport, message, ReplyMode::Addressed).await
    }
}
