//! Postgres backend.
//!
//! Two tables, one per kind, with upserts doing the merge work in SQL:
//! a gauge upsert replaces the row value, a counter upsert adds the
//! excluded value to the stored total. Batches run inside a single
//! transaction so a failure applies nothing. `list` scans both tables
//! and combines the results only after both scans succeed.

use sqlx::postgres::PgPool;
use tracing::debug;

use pulse_model::{Metric, MetricKind};

use crate::error::{StoreError, StoreResult};
use crate::store::MetricStore;

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

const CREATE_GAUGE_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS gauge_metrics (
    id    TEXT PRIMARY KEY,
    value DOUBLE PRECISION NOT NULL
)";

const CREATE_COUNTER_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS counter_metrics (
    id    TEXT PRIMARY KEY,
    value BIGINT NOT NULL
)";

const SAVE_GAUGE: &str = "\
INSERT INTO gauge_metrics (id, value) VALUES ($1, $2)
ON CONFLICT (id) DO UPDATE SET value = EXCLUDED.value";

const ACCUMULATE_COUNTER: &str = "\
INSERT INTO counter_metrics (id, value) VALUES ($1, $2)
ON CONFLICT (id) DO UPDATE SET value = counter_metrics.value + EXCLUDED.value";

const LOAD_GAUGE: &str = "SELECT value FROM gauge_metrics WHERE id = $1";
const LOAD_COUNTER: &str = "SELECT value FROM counter_metrics WHERE id = $1";

const LIST_GAUGES: &str = "SELECT id, value FROM gauge_metrics ORDER BY id";
const LIST_COUNTERS: &str = "SELECT id, value FROM counter_metrics ORDER BY id";

/// Metric store backed by Postgres.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database and make sure both tables exist.
    pub async fn connect(dsn: &str) -> StoreResult<Self> {
        let pool = PgPool::connect(dsn).await.map_err(map_err!(Database))?;

        sqlx::query(CREATE_GAUGE_TABLE)
            .execute(&pool)
            .await
            .map_err(map_err!(Database))?;
        sqlx::query(CREATE_COUNTER_TABLE)
            .execute(&pool)
            .await
            .map_err(map_err!(Database))?;

        debug!("postgres store connected");
        Ok(Self { pool })
    }

    fn gauge_value(metric: &Metric) -> StoreResult<f64> {
        metric
            .value
            .ok_or_else(|| StoreError::Malformed(metric.id.clone()))
    }

    fn counter_delta(metric: &Metric) -> StoreResult<i64> {
        metric
            .delta
            .ok_or_else(|| StoreError::NotAccumulable(metric.id.clone()))
    }
}

#[async_trait::async_trait]
impl MetricStore for PgStore {
    async fn save(&self, metric: &Metric) -> StoreResult<()> {
        match metric.kind {
            MetricKind::Gauge => {
                sqlx::query(SAVE_GAUGE)
                    .bind(&metric.id)
                    .bind(Self::gauge_value(metric)?)
                    .execute(&self.pool)
                    .await
                    .map_err(map_err!(Database))?;
            }
            MetricKind::Counter => {
                // Direct save of a counter replaces the running total.
                sqlx::query(
                    "INSERT INTO counter_metrics (id, value) VALUES ($1, $2)
                     ON CONFLICT (id) DO UPDATE SET value = EXCLUDED.value",
                )
                .bind(&metric.id)
                .bind(Self::counter_delta(metric)?)
                .execute(&self.pool)
                .await
                .map_err(map_err!(Database))?;
            }
        }
        Ok(())
    }

    async fn accumulate(&self, metric: &Metric) -> StoreResult<()> {
        sqlx::query(ACCUMULATE_COUNTER)
            .bind(&metric.id)
            .bind(Self::counter_delta(metric)?)
            .execute(&self.pool)
            .await
            .map_err(map_err!(Database))?;
        Ok(())
    }

    async fn load(&self, kind: MetricKind, id: &str) -> StoreResult<Option<Metric>> {
        match kind {
            MetricKind::Gauge => {
                let value: Option<f64> = sqlx::query_scalar(LOAD_GAUGE)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_err!(Database))?;
                Ok(value.map(|v| Metric::gauge(id, v)))
            }
            MetricKind::Counter => {
                let value: Option<i64> = sqlx::query_scalar(LOAD_COUNTER)
                    .bind(id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_err!(Database))?;
                Ok(value.map(|v| Metric::counter(id, v)))
            }
        }
    }

    async fn apply_batch(&self, batch: &[Metric]) -> StoreResult<()> {
        let mut txn = self.pool.begin().await.map_err(map_err!(Database))?;

        for metric in batch {
            match metric.kind {
                MetricKind::Gauge => {
                    sqlx::query(SAVE_GAUGE)
                        .bind(&metric.id)
                        .bind(Self::gauge_value(metric)?)
                        .execute(&mut *txn)
                        .await
                        .map_err(map_err!(Database))?;
                }
                MetricKind::Counter => {
                    sqlx::query(ACCUMULATE_COUNTER)
                        .bind(&metric.id)
                        .bind(Self::counter_delta(metric)?)
                        .execute(&mut *txn)
                        .await
                        .map_err(map_err!(Database))?;
                }
            }
        }

        txn.commit().await.map_err(map_err!(Database))?;
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<Metric>> {
        // Two scans, combined only after both succeed.
        let gauges: Vec<(String, f64)> = sqlx::query_as(LIST_GAUGES)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err!(Database))?;
        let counters: Vec<(String, i64)> = sqlx::query_as(LIST_COUNTERS)
            .fetch_all(&self.pool)
            .await
            .map_err(map_err!(Database))?;

        let mut all = Vec::with_capacity(gauges.len() + counters.len());
        all.extend(gauges.into_iter().map(|(id, v)| Metric::gauge(id, v)));
        all.extend(counters.into_iter().map(|(id, v)| Metric::counter(id, v)));
        Ok(all)
    }

    async fn flush(&self) -> StoreResult<()> {
        // Every write is already durable; nothing to flush.
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(map_err!(Database))?;
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        self.pool.close().await;
        Ok(())
    }
}
