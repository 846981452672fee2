use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, instrument};

use crate::types::{DmKey, DmSession};

/// In-memory DM bookkeeping for every (identity, user) pair.
///
/// Counts are informational today; nothing gates on them. State lives for
/// the process lifetime and is cleared on shutdown.
pub struct DmSessionCounter {
    sessions: DashMap<DmKey, DmSession>,
}

impl DmSessionCounter {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Count one more direct message for `key` and return the updated tally.
    ///
    /// Creates the session on first contact. The increment happens under the
    /// key's entry lock, so concurrent messages from one user are all counted.
    #[instrument(skip(self, key), fields(key = %key))]
    pub fn record(&self, key: &DmKey, now: DateTime<Utc>) -> DmSession {
        let entry = self
            .sessions
            .entry(key.clone())
            .and_modify(|s| {
                s.message_count += 1;
                s.last_message_at = now;
            })
            .or_insert_with(|| DmSession {
                message_count: 1,
                last_message_at: now,
            });
        let session = entry.value().clone();
        debug!(count = session.message_count, "dm session updated");
        session
    }

    pub fn get(&self, key: &DmKey) -> Option<DmSession> {
        self.sessions.get(key).map(|s| s.value().clone())
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn clear(&self) {
        self.sessions.clear();
    }
}

impl Default for DmSessionCounter {
    fn default() -> Self {
        Self::new()
    }
}
