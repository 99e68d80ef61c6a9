//! Error types for the panel-forecast library.

use thiserror::Error;

/// Result type alias for forecast operations.
pub type Result<T> = std::result::Result<T, ForecastError>;

/// Errors that can occur while partitioning, fitting, forecasting or scoring.
///
/// Errors attached to a single (key, model) pair are recorded in the output
/// tables; only structural errors are returned from the top-level calls.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// Input data is empty.
    #[error("empty input data")]
    EmptyData,

    /// Insufficient data points for the operation.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Dimension mismatch between data structures.
    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// Timestamp-related error (ordering, duplicates, parsing).
    #[error("timestamp error: {0}")]
    TimestampError(String),

    /// Model has not been fitted yet.
    #[error("model must be fitted before prediction")]
    FitRequired,

    /// Missing (NaN or infinite) values detected.
    #[error("missing values detected in data")]
    MissingValues,

    /// The series has holes in its monthly index.
    #[error("series is irregular: {missing} missing months")]
    IrregularSeries { missing: usize },

    /// A transform needs strictly positive data.
    #[error("transform {transform} requires strictly positive values")]
    NonPositiveValues { transform: String },

    /// Every key of the panel lost its training data at the cutoff.
    #[error("cutoff {cutoff} leaves no training observations for any key")]
    EmptyTrainingPanel { cutoff: String },

    /// No fitted model exists for the requested pair.
    #[error("model {model} unavailable for key {key}")]
    ModelUnavailable { key: String, model: String },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// Output could not be written.
    #[error("output error: {0}")]
    Output(String),

    /// Computation error (e.g., numerical issues).
    #[error("computation error: {0}")]
    ComputationError(String),
}

impl From<csv::Error> for ForecastError {
    fn from(err: csv::Error) -> Self {
        ForecastError::Output(err.to_string())
    }
}

impl From<toml::de::Error> for ForecastError {
    fn from(err: toml::de::Error) -> Self {
        ForecastError::Config(err.to_string())
    }
}
