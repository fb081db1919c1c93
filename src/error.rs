//! Error types for model comparison runs

use thiserror::Error;

/// Result type alias for comparator operations
pub type Result<T> = std::result::Result<T, ComparatorError>;

/// Main error type for dataset ingestion, training and persistence
#[derive(Error, Debug)]
pub enum ComparatorError {
    /// Bad input: file type, missing field, unknown or mistyped hyperparameter
    #[error("{0}")]
    Validation(String),

    /// Unsupported model type or otherwise unusable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Insufficient data after cleaning. Only {available} samples available (need at least {required}).")]
    InsufficientData { available: usize, required: usize },

    #[error("{0}")]
    NotFound(String),

    /// Any failure while preprocessing, fitting or predicting
    #[error("Training error: {0}")]
    Training(String),

    #[error("Data error: {0}")]
    Data(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model not fitted")]
    ModelNotFitted,

    #[error("Invalid shape: expected {expected}, got {actual}")]
    Shape { expected: String, actual: String },
}

impl ComparatorError {
    /// Wrap any error raised while fitting or predicting as a training error.
    /// Errors that already describe a user-facing condition are kept as-is.
    pub fn into_training(self) -> Self {
        match self {
            e @ (ComparatorError::Validation(_)
            | ComparatorError::Config(_)
            | ComparatorError::InsufficientData { .. }
            | ComparatorError::NotFound(_)
            | ComparatorError::Training(_)) => e,
            other => ComparatorError::Training(other.to_string()),
        }
    }
}

impl From<polars::error::PolarsError> for ComparatorError {
    fn from(err: polars::error::PolarsError) -> Self {
        ComparatorError::Data(err.to_string())
    }
}

impl From<serde_json::Error> for ComparatorError {
    fn from(err: serde_json::Error) -> Self {
        ComparatorError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ComparatorError {
    fn from(err: ndarray::ShapeError) -> Self {
        ComparatorError::Shape {
            expected: "valid shape".to_string(),
            actual: err.to_string(),
        }
    }
}
