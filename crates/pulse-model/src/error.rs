//! Error types for the metric domain model.

use thiserror::Error;

/// Result type alias for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building or validating a metric.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("empty metric id")]
    EmptyId,

    #[error("unknown metric kind: {0}")]
    UnknownKind(String),

    #[error("gauge metric {0} requires a value")]
    MissingValue(String),

    #[error("counter metric {0} requires a delta")]
    MissingDelta(String),

    #[error("metric {0} mixes gauge and counter fields")]
    ConflictingFields(String),

    #[error("unparsable {0} value: {1}")]
    UnparsableValue(String, String),
}
