//! Collector mode — assembles storage, aggregator, flusher, and the API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::sync::watch;
use tracing::{error, info};

use pulse_server::{Aggregator, Flusher};
use pulse_storage::{MemoryStore, MetricStore, PgStore};

#[derive(Args)]
pub struct ServerArgs {
    /// Listen address.
    #[arg(long, env = "ADDRESS", default_value = "127.0.0.1:8080")]
    pub addr: SocketAddr,

    /// Seconds between snapshot flushes.
    #[arg(long, env = "STORE_INTERVAL", default_value = "300")]
    pub store_interval: u64,

    /// Snapshot file for the in-memory backend.
    #[arg(long, env = "STORE_FILE", default_value = "/tmp/pulsegrid-metrics.json")]
    pub store_file: PathBuf,

    /// Restore prior state from the snapshot file at startup.
    #[arg(long, env = "RESTORE", default_value_t = true, action = clap::ArgAction::Set)]
    pub restore: bool,

    /// Postgres DSN; when set, selects the relational backend and the
    /// snapshot file is unused.
    #[arg(long, env = "DATABASE_DSN")]
    pub database_dsn: Option<String>,

    /// Shared secret for metric integrity tags.
    #[arg(long, env = "KEY")]
    pub key: Option<String>,
}

pub async fn run(args: ServerArgs) -> anyhow::Result<()> {
    info!("PulseGrid collector starting");

    // ── Storage backend ────────────────────────────────────────────

    let store: Arc<dyn MetricStore> = match &args.database_dsn {
        Some(dsn) => {
            let store = PgStore::connect(dsn).await?;
            info!("postgres backend selected");
            Arc::new(store)
        }
        None => {
            let store = MemoryStore::with_snapshot(&args.store_file, args.restore)?;
            info!(
                file = %args.store_file.display(),
                restore = args.restore,
                "in-memory backend selected"
            );
            Arc::new(store)
        }
    };

    // ── Aggregator ─────────────────────────────────────────────────

    let mut aggregator = Aggregator::new(store.clone());
    if let Some(key) = &args.key {
        aggregator = aggregator.with_secret(key.as_bytes());
        info!("integrity tags required");
    }
    let aggregator = Arc::new(aggregator);

    // ── Flush loop ─────────────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let flusher = Flusher::new(store.clone(), Duration::from_secs(args.store_interval));
    let flush_handle = tokio::spawn(async move { flusher.run(shutdown_rx).await });

    // ── API server ─────────────────────────────────────────────────

    let router = pulse_api::build_router(aggregator);
    let listener = tokio::net::TcpListener::bind(args.addr).await?;
    info!(addr = %args.addr, "collector API listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c()
                .await
                .expect("failed to install CTRL+C handler");
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    // The flusher performs the final flush on its way out.
    if let Err(e) = flush_handle.await? {
        error!(error = %e, "flush loop ended with error");
    }

    store.close().await?;
    info!("collector stopped");
    Ok(())
}
