use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{debug, error, info};

use chorus_agent::{OpenAiCompatBackend, Router};
use chorus_channels::{IdentityManager, RuntimeState};
use chorus_core::config::ChorusConfig;
use chorus_discord::DiscordConnector;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Used when `RUST_LOG` is unset. Every workspace crate logs at info.
const DEFAULT_LOG_FILTER: &str = "chorus_gateway=info,chorus_core=info,chorus_guard=info,\
chorus_sessions=info,chorus_channels=info,chorus_agent=info,chorus_discord=info";

/// Run several Discord bot identities against one persona backend.
#[derive(Debug, Parser)]
#[command(name = "chorus-gateway", version)]
struct Args {
    /// Path to chorus.toml (defaults to ~/.chorus/chorus.toml).
    #[arg(short, long, env = "CHORUS_CONFIG")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .init();

    let args = Args::parse();

    // load config: --config > CHORUS_CONFIG env > ~/.chorus/chorus.toml
    let config = ChorusConfig::load(args.config.as_deref())?;

    let state = Arc::new(RuntimeState::new(&config.routing));
    let backend = Arc::new(OpenAiCompatBackend::new(&config.backend)?);
    let router = Arc::new(Router::new(Arc::clone(&state), backend, &config.routing));
    let connector = Arc::new(DiscordConnector::new(&config.discord));

    let manager = IdentityManager::new(connector, router.clone(), Arc::clone(&state));

    let started = manager.start_all(config.identities.clone()).await;
    if started.is_empty() {
        error!("no identity could log in; waiting for shutdown signal anyway");
    } else {
        let ids: Vec<String> = manager.live_ids().iter().map(ToString::to_string).collect();
        info!(live = %ids.join(", "), "Chorus gateway running");
    }

    // Periodically drop idle bot chains and stale history.
    let pruner = {
        let state = Arc::clone(&state);
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(PRUNE_INTERVAL);
            loop {
                tick.tick().await;
                let chains = state.chains.prune(chrono::Utc::now());
                let history = router.history().prune();
                if chains + history > 0 {
                    debug!(chains, history, "pruned idle state");
                }
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    pruner.abort();
    manager.shutdown_all().await;
    Ok(())
}
