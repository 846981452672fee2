//! Bot-to-bot loop guard.
//!
//! Tracks, per channel, how many times the bot author changed during an
//! uninterrupted run of bot messages. Two bots answering each other forever
//! are stopped after `max_chain` hops; a human message or a long enough
//! silence lets them talk again.
//!
//! State is shared by every identity posting into the channel, so an A→B→A
//! chain is caught no matter which configured identity is "self". Several
//! identities observing the same bot message is harmless: the second
//! observation sees the same author and does not advance the count.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use chorus_core::config::RoutingConfig;

/// Snapshot of one channel's bot chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainState {
    /// Number of author changes seen in the current run.
    pub consecutive: u32,
    /// Bot that posted the most recent message of the run. Empty when no run is active.
    pub last_author: String,
    /// When the last *admitted* bot message arrived. `None` for a fresh channel.
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl ChainState {
    fn is_idle(&self, now: DateTime<Utc>, reset_after: chrono::Duration) -> bool {
        match self.last_activity_at {
            Some(at) => now.signed_duration_since(at) > reset_after,
            None => true,
        }
    }
}

/// Concurrent per-channel chain tracker.
///
/// Each `admit` runs under the channel's map entry lock, so two messages in
/// the same channel never interleave their read-modify-write.
pub struct ChainTracker {
    chains: DashMap<String, ChainState>,
    max_chain: u32,
    reset_after: chrono::Duration,
}

impl ChainTracker {
    pub fn new(max_chain: u32, inactivity_reset: Duration) -> Self {
        Self {
            chains: DashMap::new(),
            max_chain,
            reset_after: chrono::Duration::from_std(inactivity_reset)
                .unwrap_or_else(|_| chrono::Duration::weeks(52)),
        }
    }

    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::new(
            config.max_bot_chain,
            Duration::from_secs(config.inactivity_reset_secs),
        )
    }

    /// Decide whether a bot-authored message in `channel_id` may be answered.
    ///
    /// Only call this for bot authors; human messages go through [`reset`](Self::reset).
    pub fn admit(&self, channel_id: &str, author_id: &str, now: DateTime<Utc>) -> bool {
        let mut entry = self.chains.entry(channel_id.to_string()).or_default();

        let mut next = entry.clone();
        if next.is_idle(now, self.reset_after) {
            next.consecutive = 0;
            next.last_author.clear();
        }
        if !next.last_author.is_empty() && next.last_author != author_id {
            next.consecutive += 1;
        }
        next.last_author = author_id.to_string();

        if next.consecutive >= self.max_chain {
            // Hold the count at the cap and leave last_activity_at on the last
            // admitted message, so the idle window still closes on schedule.
            entry.consecutive = self.max_chain;
            entry.last_author = next.last_author;
            debug!(
                channel = %channel_id,
                author = %author_id,
                max = self.max_chain,
                "bot chain limit reached, not answering"
            );
            return false;
        }

        next.last_activity_at = Some(now);
        *entry = next;
        true
    }

    /// Forget the channel's chain (a human spoke).
    pub fn reset(&self, channel_id: &str) {
        if self.chains.remove(channel_id).is_some() {
            debug!(channel = %channel_id, "bot chain cleared by human message");
        }
    }

    /// Current state for a channel, if any bot activity was recorded.
    pub fn get(&self, channel_id: &str) -> Option<ChainState> {
        self.chains.get(channel_id).map(|s| s.value().clone())
    }

    /// Drop chains idle past the reset window. Returns how many were removed.
    pub fn prune(&self, now: DateTime<Utc>) -> usize {
        let before = self.chains.len();
        self.chains
            .retain(|_, state| !state.is_idle(now, self.reset_after));
        before.saturating_sub(self.chains.len())
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
