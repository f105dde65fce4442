//! The dispatcher — sampling loop, report ticker, and delivery workers.
//!
//! Three kinds of tasks cooperate around the bounded queue:
//!
//! ```text
//! poll loop    — samples on its own cadence, blocks on a full queue
//! report loop  — broadcasts a tick on the reporting cadence
//! N workers    — idle until a tick (or shutdown), then drain the queue
//! ```
//!
//! Queue order is FIFO but workers complete deliveries in no particular
//! order. Shutdown wakes every idle worker; an in-flight delivery is
//! never cancelled, it finishes or fails on its own.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use crate::error::{AgentError, AgentResult};
use crate::queue::{self, SharedReceiver};
use crate::sampler::Sampler;
use crate::transport::Deliver;

/// Pipeline cadences and sizing.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub poll_interval: Duration,
    pub report_interval: Duration,
    pub queue_capacity: usize,
    pub workers: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            report_interval: Duration::from_secs(10),
            queue_capacity: 100,
            workers: 15,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> AgentResult<()> {
        if self.poll_interval.is_zero() {
            return Err(AgentError::Config("poll_interval must be positive".into()));
        }
        if self.report_interval.is_zero() {
            return Err(AgentError::Config("report_interval must be positive".into()));
        }
        if self.queue_capacity == 0 {
            return Err(AgentError::Config("queue_capacity must be positive".into()));
        }
        if self.workers == 0 {
            return Err(AgentError::Config("workers must be positive".into()));
        }
        Ok(())
    }
}

/// Runs the sampling → queue → worker-pool pipeline.
pub struct Dispatcher {
    config: AgentConfig,
    sampler: Arc<Sampler>,
    deliverer: Arc<dyn Deliver>,
}

impl Dispatcher {
    pub fn new(config: AgentConfig, deliverer: Arc<dyn Deliver>) -> AgentResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sampler: Arc::new(Sampler::new()),
            deliverer,
        })
    }

    /// Run the pipeline until the shutdown signal fires, then wait for
    /// every task (including in-flight deliveries) to finish.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let (tx, rx) = queue::bounded(self.config.queue_capacity);
        let (tick_tx, _) = broadcast::channel::<()>(4);

        info!(
            workers = self.config.workers,
            queue_capacity = self.config.queue_capacity,
            poll_secs = self.config.poll_interval.as_secs_f64(),
            report_secs = self.config.report_interval.as_secs_f64(),
            "delivery pipeline started"
        );

        let mut handles = Vec::new();

        // ── Delivery workers ───────────────────────────────────────
        for worker_id in 0..self.config.workers {
            let mut tick_rx = tick_tx.subscribe();
            let rx = rx.clone();
            let deliverer = self.deliverer.clone();
            let mut shutdown = shutdown.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        tick = tick_rx.recv() => {
                            match tick {
                                // A lagged worker just drains on the
                                // next wake; ticks carry no payload.
                                Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                                    drain(&rx, deliverer.as_ref()).await;
                                }
                                Err(broadcast::error::RecvError::Closed) => break,
                            }
                        }
                        _ = shutdown.changed() => break,
                    }
                }
                debug!(worker_id, "delivery worker stopped");
            }));
        }

        // ── Poll loop (sole queue writer) ──────────────────────────
        {
            let sampler = self.sampler.clone();
            let interval = self.config.poll_interval;
            let mut shutdown = shutdown.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {
                            for metric in sampler.sample() {
                                // A full queue blocks here until a
                                // worker frees space or we shut down.
                                tokio::select! {
                                    sent = tx.send(metric) => {
                                        if sent.is_err() {
                                            return;
                                        }
                                    }
                                    _ = shutdown.changed() => return,
                                }
                            }
                        }
                        _ = shutdown.changed() => return,
                    }
                }
            }));
        }

        // ── Report ticker ──────────────────────────────────────────
        {
            let tick_tx = tick_tx.clone();
            let interval = self.config.report_interval;
            let mut shutdown = shutdown.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {
                            // No receivers is fine; workers may all be
                            // mid-drain from the previous tick.
                            let _ = tick_tx.send(());
                        }
                        _ = shutdown.changed() => break,
                    }
                }
            }));
        }

        for handle in handles {
            handle.await?;
        }

        info!("delivery pipeline stopped");
        Ok(())
    }
}

/// Best-effort drain: pop until the queue is empty, delivering each
/// metric in turn. A delivery that exhausts its retries is logged and
/// dropped; the drain moves on.
async fn drain(rx: &SharedReceiver, deliverer: &dyn Deliver) {
    while let Some(metric) = rx.try_next().await {
        if let Err(e) = deliverer.deliver(&metric).await {
            warn!(error = %e, id = %metric.id, "delivery dropped after retries");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pulse_model::Metric;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Recording {
        delivered: tokio::sync::Mutex<Vec<Metric>>,
    }

    impl Recording {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                delivered: tokio::sync::Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Deliver for Recording {
        async fn deliver(&self, metric: &Metric) -> AgentResult<()> {
            self.delivered.lock().await.push(metric.clone());
            Ok(())
        }
    }

    struct Failing {
        attempts: AtomicUsize,
    }

    #[async_trait]
    impl Deliver for Failing {
        async fn deliver(&self, _metric: &Metric) -> AgentResult<()> {
            self.attempts.fetch_add(1, Ordering::Relaxed);
            Err(AgentError::Http("connection refused".to_string()))
        }
    }

    fn fast_config() -> AgentConfig {
        AgentConfig {
            poll_interval: Duration::from_millis(10),
            report_interval: Duration::from_millis(25),
            queue_capacity: 100,
            workers: 4,
        }
    }

    // ── Config ─────────────────────────────────────────────────────

    #[test]
    fn config_rejects_zero_values() {
        let mut config = AgentConfig::default();
        config.workers = 0;
        assert!(config.validate().is_err());

        let mut config = AgentConfig::default();
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        assert!(AgentConfig::default().validate().is_ok());
    }

    // ── Pipeline ───────────────────────────────────────────────────

    #[tokio::test]
    async fn pipeline_delivers_sampled_metrics() {
        let recording = Recording::new();
        let dispatcher = Dispatcher::new(fast_config(), recording.clone()).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { dispatcher.run(shutdown_rx).await });

        // Let several poll and report cycles go by.
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        let delivered = recording.delivered.lock().await;
        assert!(!delivered.is_empty());
        assert!(delivered.iter().any(|m| m.id == "PollCount"));
        assert!(delivered.iter().any(|m| m.id == "RandomValue"));
    }

    #[tokio::test]
    async fn shutdown_wakes_idle_workers() {
        let recording = Recording::new();
        // Hour-long cadences: every task is idle when shutdown fires.
        let config = AgentConfig {
            poll_interval: Duration::from_secs(3600),
            report_interval: Duration::from_secs(3600),
            queue_capacity: 10,
            workers: 8,
        };
        let dispatcher = Dispatcher::new(config, recording).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { dispatcher.run(shutdown_rx).await });
        shutdown_tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("pipeline did not stop on shutdown")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn failed_deliveries_do_not_stall_the_pipeline() {
        let failing = Arc::new(Failing {
            attempts: AtomicUsize::new(0),
        });
        let dispatcher = Dispatcher::new(fast_config(), failing.clone()).unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(async move { dispatcher.run(shutdown_rx).await });
        tokio::time::sleep(Duration::from_millis(200)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap().unwrap();

        // Deliveries were attempted and dropped, none of them fatal.
        assert!(failing.attempts.load(Ordering::Relaxed) > 0);
    }
}
