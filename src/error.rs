//! Error types for the gaze calibration library.

use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding of persisted model state failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML encoding or decoding of configuration failed
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Invalid input parameters provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Model lookup, prediction or state error
    #[error("Model error: {0}")]
    ModelError(String),

    /// Model fitting or validation error
    #[error("Training error: {0}")]
    TrainingError(String),

    /// Model state could not be stored or restored
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// Filter initialization or processing error
    #[error("Filter error: {0}")]
    FilterError(String),

    /// Calibration sequence construction error
    #[error("Sequence error: {0}")]
    SequenceError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic I/O error with description
    #[error("I/O error: {0}")]
    IoError(String),
}

/// Application-specific error type (alias for main Error type)
pub type AppError = Error;

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;
