//! The aggregator — validation, integrity checks, and kind dispatch.

use std::sync::Arc;

use tracing::{debug, warn};

use pulse_model::{Metric, MetricKind};
use pulse_storage::MetricStore;

use crate::error::{ServerError, ServerResult};

/// Applies inbound metrics to a storage backend with the correct merge
/// semantics per kind.
pub struct Aggregator {
    store: Arc<dyn MetricStore>,
    /// Shared secret; when set, inbound tags must verify.
    secret: Option<Vec<u8>>,
}

impl Aggregator {
    /// Create an aggregator over the given backend, accepting unsigned
    /// metrics.
    pub fn new(store: Arc<dyn MetricStore>) -> Self {
        Self {
            store,
            secret: None,
        }
    }

    /// Require inbound metrics to carry a tag valid under `secret`.
    pub fn with_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    /// Validate shape and, when a secret is configured, the tag.
    fn admit(&self, metric: &Metric) -> ServerResult<()> {
        metric.validate()?;

        if let Some(secret) = &self.secret {
            if !metric.verify_tag(secret)? {
                // Logged apart from plain validation failures: a
                // mismatch can mean tampering or a key mismatch between
                // agent and collector.
                warn!(id = %metric.id, kind = %metric.kind, "integrity tag mismatch");
                return Err(ServerError::IntegrityMismatch(metric.id.clone()));
            }
        }

        Ok(())
    }

    /// Ingest a single metric: gauges overwrite, counters accumulate.
    pub async fn ingest(&self, metric: &Metric) -> ServerResult<()> {
        self.admit(metric)?;

        match metric.kind {
            MetricKind::Gauge => self.store.save(metric).await?,
            MetricKind::Counter => self.store.accumulate(metric).await?,
        }

        debug!(id = %metric.id, kind = %metric.kind, "metric ingested");
        Ok(())
    }

    /// Ingest a batch atomically: every item is admitted first, and a
    /// single rejection leaves the whole batch unapplied.
    pub async fn ingest_batch(&self, metrics: &[Metric]) -> ServerResult<()> {
        for metric in metrics {
            self.admit(metric)?;
        }

        self.store.apply_batch(metrics).await?;
        debug!(count = metrics.len(), "batch ingested");
        Ok(())
    }

    /// Load a metric, re-signing it when a secret is configured so the
    /// caller can forward it verifiably.
    pub async fn load(&self, kind: MetricKind, id: &str) -> ServerResult<Option<Metric>> {
        let Some(mut metric) = self.store.load(kind, id).await? else {
            return Ok(None);
        };

        if let Some(secret) = &self.secret {
            metric.sign(secret)?;
        }
        Ok(Some(metric))
    }

    /// Enumerate all stored metrics, re-signed when a secret is set.
    pub async fn list(&self) -> ServerResult<Vec<Metric>> {
        let mut metrics = self.store.list().await?;

        if let Some(secret) = &self.secret {
            for metric in &mut metrics {
                metric.sign(secret)?;
            }
        }
        Ok(metrics)
    }

    /// Probe the backend's persistence medium.
    pub async fn ping(&self) -> ServerResult<()> {
        Ok(self.store.ping().await?)
    }
}
