//! Error types for metric registration and recording.

use thiserror::Error;

/// Result type alias for metrics operations.
pub type MetricsResult<T> = Result<T, MetricsError>;

/// Errors surfaced by metric handles and the registry.
///
/// Recording errors are reported to the immediate caller and never
/// leave the registry in a partially-updated state.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("metric `{0}` is already registered in this process")]
    DuplicateName(String),

    #[error("unknown tag key `{key}` for metric `{metric}`")]
    UnknownTagKey { metric: String, key: String },

    #[error("counter `{metric}` cannot be incremented by {amount}")]
    NegativeIncrement { metric: String, amount: f64 },

    #[error("histogram `{0}` boundaries must be strictly increasing")]
    InvalidBoundaries(String),
}
