//! Error types for spool ingestion
//!
//! Parse failures are values, not panics: a producer that meets bytes it
//! cannot turn into records returns [`ProducerError::BadSource`], and the
//! orchestrator decides what happens to the source.

use std::path::PathBuf;

use spool_common::SpoolError;
use thiserror::Error;

/// A source whose content cannot be parsed.
#[derive(Debug, Clone, Error)]
#[error("Bad source '{source_id}' at position {position}: {reason}")]
pub struct BadSourceError {
    pub source_id: String,
    /// Byte position of the offending record
    pub position: u64,
    pub reason: String,
}

impl BadSourceError {
    pub fn new(source_id: impl Into<String>, position: u64, reason: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            position,
            reason: reason.into(),
        }
    }
}

/// Errors raised by a format producer
#[derive(Debug, Error)]
pub enum ProducerError {
    /// Source-fatal: quarantine the source and move on
    #[error(transparent)]
    BadSource(#[from] BadSourceError),

    /// The source could not be read at all
    #[error("Failed to read '{}': {error}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },
}

impl ProducerError {
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        ProducerError::Io {
            path: path.into(),
            error,
        }
    }
}

/// Errors raised by the spool-list collaborator
#[derive(Debug, Error)]
pub enum SpoolerError {
    #[error("Spool I/O error on '{}': {error}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Too many files waiting in the spool directory: {count} exceeds the maximum of {max}")]
    TooManyFiles { count: usize, max: usize },

    #[error("Invalid file pattern '{pattern}': {error}")]
    Pattern {
        pattern: String,
        #[source]
        error: regex::Error,
    },

    /// The bounded wait was cancelled
    #[error("Polling interrupted")]
    Interrupted,
}

impl SpoolerError {
    pub fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        SpoolerError::Io {
            path: path.into(),
            error,
        }
    }
}

/// A transport message whose payload cannot be turned into records.
#[derive(Debug, Clone, Error)]
#[error("Cannot parse message {topic}/{partition}@{offset}: {reason}")]
pub struct CreatorError {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub reason: String,
}

/// Errors raised by a transport consumer
#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Consumer wait interrupted")]
    Interrupted,

    #[error("Consumer failed: {0}")]
    Failed(String),
}

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {error}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Unrecoverable stage failures surfaced to the pipeline engine
#[derive(Debug, Error)]
pub enum StageError {
    /// A bad source could not be isolated, so progress is unsafe
    #[error("Could not quarantine '{source_id}': {error}")]
    Quarantine {
        source_id: String,
        #[source]
        error: SpoolerError,
    },

    #[error(transparent)]
    Spooler(#[from] SpoolerError),

    #[error(transparent)]
    Producer(#[from] ProducerError),

    #[error(transparent)]
    Consumer(#[from] ConsumerError),

    #[error("Invalid checkpoint: {0}")]
    Offset(#[from] SpoolError),
}
