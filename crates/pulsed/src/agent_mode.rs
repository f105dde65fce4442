//! Agent mode — runs the sampling and delivery pipeline against a collector.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use tokio::sync::watch;
use tracing::{info, warn};

use pulse_agent::{AgentConfig, Dispatcher, Transport, TransportConfig};

/// How long in-flight deliveries may run after the shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[derive(Args)]
pub struct AgentArgs {
    /// Collector ingestion endpoint.
    #[arg(long, env = "ADDRESS", default_value = "http://127.0.0.1:8080/update")]
    pub endpoint: String,

    /// Seconds between host samples.
    #[arg(long, env = "POLL_INTERVAL", default_value = "2")]
    pub poll_interval: u64,

    /// Seconds between delivery rounds.
    #[arg(long, env = "REPORT_INTERVAL", default_value = "10")]
    pub report_interval: u64,

    /// Delivery queue capacity; a full queue blocks sampling.
    #[arg(long, default_value = "100")]
    pub queue_capacity: usize,

    /// Delivery worker count.
    #[arg(long, default_value = "15")]
    pub workers: usize,

    /// Retries per delivery after the first attempt.
    #[arg(long, default_value = "3")]
    pub retry_count: u32,

    /// Initial retry backoff in milliseconds.
    #[arg(long, default_value = "100")]
    pub retry_wait_ms: u64,

    /// Maximum retry backoff in milliseconds.
    #[arg(long, default_value = "900")]
    pub retry_max_wait_ms: u64,

    /// Idle connections kept per host.
    #[arg(long, default_value = "15")]
    pub max_idle_per_host: usize,

    /// Shared secret for metric integrity tags.
    #[arg(long, env = "KEY")]
    pub key: Option<String>,
}

pub async fn run(args: AgentArgs) -> anyhow::Result<()> {
    info!(endpoint = %args.endpoint, "PulseGrid agent starting");

    let transport = Transport::new(TransportConfig {
        endpoint: args.endpoint.clone(),
        max_idle_per_host: args.max_idle_per_host,
        retry_count: args.retry_count,
        retry_wait: Duration::from_millis(args.retry_wait_ms),
        retry_max_wait: Duration::from_millis(args.retry_max_wait_ms),
        // A delivery may not outlive the shorter of the two cadences.
        timeout: Duration::from_secs(args.poll_interval.min(args.report_interval).max(1)),
        secret: args.key.as_ref().map(|k| k.as_bytes().to_vec()),
    })?;

    let dispatcher = Dispatcher::new(
        AgentConfig {
            poll_interval: Duration::from_secs(args.poll_interval),
            report_interval: Duration::from_secs(args.report_interval),
            queue_capacity: args.queue_capacity,
            workers: args.workers,
        },
        Arc::new(transport),
    )?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let pipeline = tokio::spawn(async move { dispatcher.run(shutdown_rx).await });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(SHUTDOWN_GRACE, pipeline).await {
        Ok(result) => result??,
        Err(_) => warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "grace period elapsed; abandoning in-flight deliveries"
        ),
    }

    info!("agent stopped");
    Ok(())
}
