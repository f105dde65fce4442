//! The storage contract every backend implements.

use async_trait::async_trait;

use pulse_model::{Metric, MetricKind};

use crate::error::StoreResult;

/// Persistence contract for metrics.
///
/// The aggregator depends only on this trait, never on a concrete
/// backend. Callers are expected to hand in validated metrics; the
/// backend enforces merge semantics, not wire shape.
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Store a metric, replacing any prior value (gauge semantics).
    async fn save(&self, metric: &Metric) -> StoreResult<()>;

    /// Add the metric's delta to the stored running total, starting
    /// from the delta itself when the id is new (counter semantics).
    ///
    /// Concurrent accumulates on the same id must not lose updates.
    async fn accumulate(&self, metric: &Metric) -> StoreResult<()>;

    /// Read the current value, or `None` when the metric is absent.
    async fn load(&self, kind: MetricKind, id: &str) -> StoreResult<Option<Metric>>;

    /// Apply a pre-validated batch as one all-or-nothing operation,
    /// dispatching save/accumulate by each metric's kind.
    async fn apply_batch(&self, metrics: &[Metric]) -> StoreResult<()>;

    /// Consistent point-in-time enumeration of all stored metrics,
    /// both kinds, ordered by kind then id.
    async fn list(&self) -> StoreResult<Vec<Metric>>;

    /// Durably persist current state to the backing medium.
    async fn flush(&self) -> StoreResult<()>;

    /// Probe that the persistence medium is reachable.
    async fn ping(&self) -> StoreResult<()>;

    /// Release backend resources. Idempotent.
    async fn close(&self) -> StoreResult<()>;
}
