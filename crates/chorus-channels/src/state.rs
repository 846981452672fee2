use chorus_core::config::RoutingConfig;
use chorus_guard::ChainTracker;
use chorus_sessions::DmSessionCounter;

/// Process-wide mutable state shared by every identity's message tasks.
///
/// Created once at startup, owned by the [`IdentityManager`](crate::IdentityManager)
/// and handed to the message router.
pub struct RuntimeState {
    /// Per-channel bot chains. Channel-scoped, so shared across identities.
    pub chains: ChainTracker,
    /// Per (identity, user) DM counters.
    pub dm_sessions: DmSessionCounter,
}

impl RuntimeState {
    pub fn new(routing: &RoutingConfig) -> Self {
        Self {
            chains: ChainTracker::from_config(routing),
            dm_sessions: DmSessionCounter::new(),
        }
    }
}
