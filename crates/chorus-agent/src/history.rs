use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use chorus_channels::{ChannelError, Transport};
use chorus_core::types::{Destination, HistoryRecord};

struct CachedHistory {
    fetched_at: Instant,
    records: Arc<Vec<HistoryRecord>>,
}

/// Short-lived cache in front of [`Transport::fetch_recent`].
///
/// Keyed by (channel id, limit). Several identities answering the same
/// message within the TTL share one fetch. An entry that does not contain
/// the triggering message is stale and refetched. A zero TTL disables caching.
pub struct HistoryCache {
    ttl: Duration,
    entries: DashMap<(String, usize), CachedHistory>,
}

impl HistoryCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// Recent messages for `destination`, oldest first. A cached window that
    /// does not contain `trigger_id` is refetched.
    pub async fn fetch_recent(
        &self,
        transport: &dyn Transport,
        destination: &Destination,
        limit: usize,
        trigger_id: &str,
    ) -> Result<Arc<Vec<HistoryRecord>>, ChannelError> {
        let key = (destination.channel_id().to_string(), limit);

        if !self.ttl.is_zero() {
            if let Some(hit) = self.entries.get(&key) {
                let fresh = hit.fetched_at.elapsed() < self.ttl;
                if fresh && hit.records.iter().any(|r| r.message_id == trigger_id) {
                    debug!(channel = %key.0, "history cache hit");
                    return Ok(Arc::clone(&hit.records));
                }
            }
        }

        // No map guard is held across the fetch.
        let records = Arc::new(transport.fetch_recent(destination, limit).await?);

        if !self.ttl.is_zero() {
            self.entries.insert(
                key,
                CachedHistory {
                    fetched_at: Instant::now(),
                    records: Arc::clone(&records),
                },
            );
        }
        Ok(records)
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, cached| cached.fetched_at.elapsed() < self.ttl);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
