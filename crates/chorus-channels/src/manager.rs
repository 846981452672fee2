use std::sync::Arc;

use dashmap::DashMap;
use futures_util::future::join_all;
use tracing::{error, info, warn};

use chorus_core::config::IdentityConfig;
use chorus_core::types::IdentityId;

use crate::{
    channel::{Connector, EventSink, Transport},
    state::RuntimeState,
    types::IdentityStatus,
};

/// Owns every running identity and the runtime state their handlers share.
///
/// Startup and shutdown fan out across all identities at once; one identity
/// failing never affects the others. There is no retry loop here: a failed
/// login is final for the process lifetime.
pub struct IdentityManager {
    connector: Arc<dyn Connector>,
    sink: Arc<dyn EventSink>,
    state: Arc<RuntimeState>,
    live: DashMap<IdentityId, Arc<dyn Transport>>,
    statuses: DashMap<IdentityId, IdentityStatus>,
}

impl IdentityManager {
    pub fn new(
        connector: Arc<dyn Connector>,
        sink: Arc<dyn EventSink>,
        state: Arc<RuntimeState>,
    ) -> Self {
        Self {
            connector,
            sink,
            state,
            live: DashMap::new(),
            statuses: DashMap::new(),
        }
    }

    pub fn state(&self) -> &Arc<RuntimeState> {
        &self.state
    }

    /// Start every identity concurrently and return the ones that came up.
    ///
    /// Failures are logged and left out of the result.
    pub async fn start_all(&self, identities: Vec<IdentityConfig>) -> Vec<Arc<dyn Transport>> {
        let configured = identities.len();
        for identity in &identities {
            self.statuses
                .insert(identity.id.clone(), IdentityStatus::Unstarted);
        }

        let attempts = identities
            .into_iter()
            .map(|identity| self.start_one(identity));
        let started: Vec<Arc<dyn Transport>> =
            join_all(attempts).await.into_iter().flatten().collect();

        if started.len() < configured {
            warn!(
                started = started.len(),
                configured,
                "some identities failed to start"
            );
        } else {
            info!(started = started.len(), configured, "all identities started");
        }
        started
    }

    /// Connect a single identity; registers it only after confirmed login.
    async fn start_one(&self, identity: IdentityConfig) -> Option<Arc<dyn Transport>> {
        let id = identity.id.clone();
        self.statuses.insert(id.clone(), IdentityStatus::Connecting);
        info!(identity = %id, "connecting identity");

        match self.connector.connect(identity, Arc::clone(&self.sink)).await {
            Ok(transport) => {
                let user = transport
                    .self_info()
                    .map(|s| s.display_name)
                    .unwrap_or_default();
                self.live.insert(id.clone(), Arc::clone(&transport));
                self.statuses.insert(id.clone(), IdentityStatus::Live);
                info!(identity = %id, user = %user, "identity live");
                Some(transport)
            }
            Err(e) => {
                error!(identity = %id, error = %e, "identity failed to start");
                self.statuses
                    .insert(id, IdentityStatus::FailedStartup(e.to_string()));
                None
            }
        }
    }

    /// Tear down every live identity, then clear the registry and DM counters.
    ///
    /// Teardown errors are logged and do not stop the others. Chain state is
    /// channel-scoped and left alone.
    pub async fn shutdown_all(&self) {
        let targets: Vec<(IdentityId, Arc<dyn Transport>)> = self
            .live
            .iter()
            .map(|e| (e.key().clone(), Arc::clone(e.value())))
            .collect();
        info!(count = targets.len(), "shutting down identities");

        let teardowns = targets.into_iter().map(|(id, transport)| async move {
            self.statuses.insert(id.clone(), IdentityStatus::ShuttingDown);
            if let Err(e) = transport.destroy().await {
                warn!(identity = %id, error = %e, "error while shutting down identity");
            }
            self.statuses.insert(id, IdentityStatus::Stopped);
        });
        join_all(teardowns).await;

        self.live.clear();
        self.state.dm_sessions.clear();
        info!("all identities stopped");
    }

    /// Number of identities currently registered as live.
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    /// Live identity ids, sorted for deterministic output.
    pub fn live_ids(&self) -> Vec<IdentityId> {
        let mut ids: Vec<IdentityId> = self.live.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn status(&self, id: &IdentityId) -> Option<IdentityStatus> {
        self.statuses.get(id).map(|s| s.value().clone())
    }
}
