//! Error types for the collector core.

use thiserror::Error;

use pulse_model::ModelError;
use pulse_storage::StoreError;

/// Result type alias for aggregator operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors surfaced by the aggregator.
///
/// The three classes matter to callers: validation and integrity
/// failures are the client's fault and are never retried here; storage
/// faults are the backend's and propagate hard.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid metric: {0}")]
    Validation(#[from] ModelError),

    #[error("integrity tag mismatch for metric {0}")]
    IntegrityMismatch(String),

    #[error("storage fault: {0}")]
    Storage(#[from] StoreError),
}
