//! Error types for the agent pipeline.

use thiserror::Error;

use pulse_model::ModelError;

/// Result type alias for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors raised while sampling, queueing, or delivering metrics.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid agent config: {0}")]
    Config(String),

    #[error("invalid collector endpoint: {0}")]
    Endpoint(String),

    #[error("failed to encode metric: {0}")]
    Encode(String),

    #[error("request failed: {0}")]
    Http(String),

    #[error("delivery timed out")]
    Timeout,

    #[error("collector rejected delivery with status {0}")]
    Rejected(u16),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl AgentError {
    /// Whether a delivery failure is worth retrying.
    ///
    /// Network faults and timeouts are transient; a collector rejection
    /// or an encode/model failure will fail identically on every retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, AgentError::Http(_) | AgentError::Timeout)
    }
}
