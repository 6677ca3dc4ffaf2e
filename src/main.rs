//! Real-time order-book collector entrypoint.
//!
//! Wires configuration, store, engine, snapshot writer, and venue
//! adapter together, then waits for a shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use predict_collector::engine::Engine;
use predict_collector::platform::polymarket::PolymarketAdapter;
use predict_collector::platform::Adapter;
use predict_collector::snapshot::{SnapshotWriter, SnapshotWriterConfig};
use predict_collector::store::{SqliteStore, Store};
use predict_collector::{Config, EngineConfig};

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);
const ADAPTER_RETRY_BACKOFF: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env();
    info!(
        platform = %config.platform_name,
        database = %config.database_path,
        "starting order-book collector"
    );

    let store: Arc<dyn Store> = Arc::new(
        SqliteStore::open(&config.database_path).context("failed to open store")?,
    );

    let cancel = CancellationToken::new();
    let engine = Engine::new(EngineConfig::default(), cancel.clone());

    let engine_task = tokio::spawn(Arc::clone(&engine).run());

    let snapshot_writer = SnapshotWriter::new(
        Arc::clone(&engine),
        Arc::clone(&store),
        SnapshotWriterConfig {
            interval: config.snapshot_interval,
            depth: config.snapshot_depth,
        },
        cancel.clone(),
    );
    let snapshot_task = tokio::spawn(snapshot_writer.run());

    let adapter = Arc::new(PolymarketAdapter::new(&config, Arc::clone(&engine), Arc::clone(&store)));
    let adapter_task = tokio::spawn(run_adapter_with_retry(Arc::clone(&adapter), cancel.clone()));

    wait_for_shutdown_signal().await;
    info!("shutdown signal received, stopping");
    cancel.cancel();

    let _ = adapter.stop(SHUTDOWN_DEADLINE).await;

    let shutdown = async {
        let _ = engine_task.await;
        let _ = snapshot_task.await;
        let _ = adapter_task.await;
    };
    if tokio::time::timeout(SHUTDOWN_DEADLINE, shutdown).await.is_err() {
        warn!("graceful shutdown deadline exceeded, exiting anyway");
    }

    info!("collector stopped");
    Ok(())
}

/// Restarts the venue adapter with a fixed backoff whenever `start`
/// returns an error, until `cancel` fires. A transient network blip
/// should not take the collector down.
async fn run_adapter_with_retry(adapter: Arc<PolymarketAdapter>, cancel: CancellationToken) {
    while !cancel.is_cancelled() {
        match adapter.start(cancel.clone()).await {
            Ok(()) => {
                if cancel.is_cancelled() {
                    return;
                }
                warn!("adapter stopped unexpectedly, restarting");
            }
            Err(e) => {
                error!(error = %e, "adapter failed, restarting after backoff");
            }
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(ADAPTER_RETRY_BACKOFF) => {}
        }
    }
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "predict_collector=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
