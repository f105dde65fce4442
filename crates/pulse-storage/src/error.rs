//! Error types for the storage backends.

use thiserror::Error;

/// Result type alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur inside a storage backend.
///
/// A missing metric is NOT an error: `load` returns `Ok(None)`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read snapshot: {0}")]
    SnapshotRead(String),

    #[error("failed to write snapshot: {0}")]
    SnapshotWrite(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("metric {0} is missing the field its kind requires")]
    Malformed(String),

    #[error("metric {0} carries no delta to accumulate")]
    NotAccumulable(String),
}
