//! Error types for Hearth.

use thiserror::Error;

/// Top-level error type for Hearth operations.
#[derive(Debug, Error)]
pub enum HearthError {
    /// Configuration errors
    #[error("Config error: {0}")]
    Config(String),

    /// Game data errors (spells, templates)
    #[error("Data error: {0}")]
    Data(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Schema version mismatch
    #[error("Schema version mismatch: expected {expected}, got {actual}")]
    VersionMismatch {
        /// Expected version
        expected: String,
        /// Actual version found
        actual: String,
    },
}

/// Result type alias for Hearth operations.
pub type HearthResult<T> = Result<T, HearthError>;
