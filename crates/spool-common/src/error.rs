//! Error types shared across the spool crates

use thiserror::Error;

/// Result type alias for spool operations
pub type Result<T> = std::result::Result<T, SpoolError>;

/// Main error type for the shared data model
#[derive(Error, Debug)]
pub enum SpoolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid offset '{offset}': {reason}")]
    InvalidOffset { offset: String, reason: String },

    #[error("Invalid position {0}: only -1 is reserved for exhausted sources")]
    InvalidPosition(i64),
}
