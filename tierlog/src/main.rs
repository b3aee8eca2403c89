//! Tierlog HTTP server binary entry point.

use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use tierlog::server::{CliArgs, LogServer, Metrics, ServerConfig};
use tierlog::{Config, TieredStore};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();
    let config = args.load_config();
    let server_config = ServerConfig::from(&args);

    tracing::info!("Opening tiered store with config: {:?}", config);

    let store = Arc::new(TieredStore::open(&config).expect("failed to open tiered store"));
    let metrics = Arc::new(Metrics::new());

    spawn_archival_loop(store.clone(), metrics.clone(), config.archive_interval());

    let server = LogServer::new(store, metrics, server_config);
    server.run().await;
}

/// Runs archival ticks on a fixed cadence. Ticks never overlap; a
/// slow tick simply delays the next one.
fn spawn_archival_loop(
    store: Arc<TieredStore>,
    metrics: Arc<Metrics>,
    interval: std::time::Duration,
) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match store.run_archival().await {
                Ok(summary) => {
                    metrics.observe_archive_tick(&summary);
                    tracing::info!(
                        attempted = summary.attempted,
                        archived = summary.archived,
                        skipped = summary.skipped,
                        failed = summary.failed,
                        "archival tick complete"
                    );
                }
                Err(e) => tracing::error!("archival tick failed: {}", e),
            }
        }
    });
}
