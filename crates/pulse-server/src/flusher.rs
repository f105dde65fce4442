//! Persistence scheduler — periodic flushes plus a final one on shutdown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use pulse_storage::MetricStore;

/// Ticker-driven flush loop for a storage backend.
pub struct Flusher {
    store: Arc<dyn MetricStore>,
    interval: Duration,
}

impl Flusher {
    /// Create a flusher over the given backend.
    pub fn new(store: Arc<dyn MetricStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Run until the shutdown signal fires.
    ///
    /// A periodic flush fault is a hard error and stops the loop; a
    /// fault during the final shutdown flush is logged but does not
    /// block exit.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        info!(interval_secs = self.interval.as_secs(), "flush loop started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    self.store.flush().await?;
                }
                _ = shutdown.changed() => {
                    info!("flush loop shutting down");
                    if let Err(e) = self.store.flush().await {
                        error!(error = %e, "final flush failed");
                    }
                    break;
                }
            }
        }

        Ok(())
    }
}
