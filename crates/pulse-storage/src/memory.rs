//! In-memory backend with optional file snapshots.
//!
//! The live state is a `RwLock`'d two-level map `kind -> id -> Metric`.
//! `flush` serializes the map under the read lock (writers excluded,
//! readers unaffected) and rewrites the snapshot file atomically via a
//! sibling temp file and rename. Construction optionally restores from
//! the snapshot, tolerating a missing or empty file as "no prior state".

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::debug;

use pulse_model::{Metric, MetricKind};

use crate::error::{StoreError, StoreResult};
use crate::store::MetricStore;

/// Snapshot file layout: `kind -> {id -> Metric}`.
type MetricsMap = HashMap<MetricKind, HashMap<String, Metric>>;

/// Volatile metric store with periodic file snapshots.
pub struct MemoryStore {
    metrics: RwLock<MetricsMap>,
    /// Snapshot target; `None` disables persistence entirely.
    snapshot_path: Option<PathBuf>,
    /// Serializes concurrent flushes so temp-file renames don't race.
    flush_gate: tokio::sync::Mutex<()>,
}

impl MemoryStore {
    /// Create a purely volatile store (no snapshot file).
    pub fn new() -> Self {
        Self {
            metrics: RwLock::new(MetricsMap::default()),
            snapshot_path: None,
            flush_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Create a store that flushes to `path`, restoring prior state
    /// from it first when `restore` is set.
    pub fn with_snapshot(path: impl Into<PathBuf>, restore: bool) -> StoreResult<Self> {
        let path = path.into();
        let metrics = if restore {
            read_snapshot(&path)?
        } else {
            MetricsMap::default()
        };

        Ok(Self {
            metrics: RwLock::new(metrics),
            snapshot_path: Some(path),
            flush_gate: tokio::sync::Mutex::new(()),
        })
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, MetricsMap> {
        self.metrics.read().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, MetricsMap> {
        self.metrics.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Read a snapshot file into the two-level map.
///
/// A missing or empty file is not an error — it means no prior state.
fn read_snapshot(path: &Path) -> StoreResult<MetricsMap> {
    let data = match std::fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(MetricsMap::default()),
        Err(e) => return Err(StoreError::SnapshotRead(e.to_string())),
    };

    if data.is_empty() {
        return Ok(MetricsMap::default());
    }

    serde_json::from_slice(&data).map_err(|e| StoreError::SnapshotRead(e.to_string()))
}

/// Rank for stable `list` ordering.
fn kind_rank(kind: MetricKind) -> u8 {
    match kind {
        MetricKind::Gauge => 0,
        MetricKind::Counter => 1,
    }
}

#[async_trait::async_trait]
impl MetricStore for MemoryStore {
    async fn save(&self, metric: &Metric) -> StoreResult<()> {
        let mut stored = metric.clone();
        stored.tag = None;

        let mut metrics = self.lock_write();
        metrics
            .entry(metric.kind)
            .or_default()
            .insert(metric.id.clone(), stored);
        Ok(())
    }

    async fn accumulate(&self, metric: &Metric) -> StoreResult<()> {
        let delta = metric
            .delta
            .ok_or_else(|| StoreError::NotAccumulable(metric.id.clone()))?;

        // Read-modify-write under the write lock: concurrent
        // accumulates on the same id are linearized here.
        let mut metrics = self.lock_write();
        let by_id = metrics.entry(metric.kind).or_default();
        match by_id.get_mut(&metric.id) {
            Some(existing) => {
                let total = existing.delta.unwrap_or(0) + delta;
                existing.delta = Some(total);
            }
            None => {
                by_id.insert(metric.id.clone(), Metric::counter(metric.id.clone(), delta));
            }
        }
        Ok(())
    }

    async fn load(&self, kind: MetricKind, id: &str) -> StoreResult<Option<Metric>> {
        let metrics = self.lock_read();
        Ok(metrics.get(&kind).and_then(|by_id| by_id.get(id)).cloned())
    }

    async fn apply_batch(&self, batch: &[Metric]) -> StoreResult<()> {
        // Reject anything unapplicable before touching the map, so a
        // bad item leaves the whole batch unapplied.
        for metric in batch {
            if metric.kind == MetricKind::Counter && metric.delta.is_none() {
                return Err(StoreError::NotAccumulable(metric.id.clone()));
            }
        }

        let mut metrics = self.lock_write();
        for metric in batch {
            let by_id = metrics.entry(metric.kind).or_default();
            match metric.kind {
                MetricKind::Gauge => {
                    let mut stored = metric.clone();
                    stored.tag = None;
                    by_id.insert(metric.id.clone(), stored);
                }
                MetricKind::Counter => {
                    let delta = metric.delta.unwrap_or(0);
                    match by_id.get_mut(&metric.id) {
                        Some(existing) => {
                            existing.delta = Some(existing.delta.unwrap_or(0) + delta);
                        }
                        None => {
                            by_id.insert(
                                metric.id.clone(),
                                Metric::counter(metric.id.clone(), delta),
                            );
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<Metric>> {
        let metrics = self.lock_read();
        let mut all: Vec<Metric> = metrics
            .values()
            .flat_map(|by_id| by_id.values().cloned())
            .collect();
        drop(metrics);

        all.sort_by(|a, b| kind_rank(a.kind).cmp(&kind_rank(b.kind)).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn flush(&self) -> StoreResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let _gate = self.flush_gate.lock().await;

        // Serialize under the read lock, then write without holding it.
        let data = {
            let metrics = self.lock_read();
            serde_json::to_vec(&*metrics).map_err(|e| StoreError::SnapshotWrite(e.to_string()))?
        };

        let tmp = PathBuf::from(format!("{}.tmp", path.display()));
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| StoreError::SnapshotWrite(e.to_string()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StoreError::SnapshotWrite(e.to_string()))?;

        debug!(path = %path.display(), bytes = data.len(), "snapshot written");
        Ok(())
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn close(&self) -> StoreResult<()> {
        Ok(())
    }
}
