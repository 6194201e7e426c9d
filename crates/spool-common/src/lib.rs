//! Spool Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared data model, error handling and logging for the spool ingestion
//! crates.
//!
//! - **Offsets**: the resumable `(source, position)` checkpoint codec
//! - **Records**: structured output records and the per-cycle batch collector
//! - **Logging**: `tracing` subscriber setup
//!
//! # Example
//!
//! ```
//! use spool_common::offset::{decode, Position};
//!
//! let checkpoint = decode(Some("records-000001.json::-1")).unwrap();
//! assert_eq!(checkpoint.position, Position::Exhausted);
//! ```

pub mod error;
pub mod logging;
pub mod offset;
pub mod record;

// Re-export commonly used types
pub use error::{Result, SpoolError};
pub use offset::{Position, SourceOffset};
pub use record::{BatchMaker, ErrorReport, Record};
