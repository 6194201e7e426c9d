//! Spool Ingest Library
//!
//! Resumable ingestion of spooled files and transport messages into
//! structured records.
//!
//! # Components
//!
//! - **Producers**: parse text, JSON, delimited, XML and wrapped-record files
//!   from a byte offset
//! - **Spool source**: checkpointed orchestration over a spool directory, with
//!   quarantine of files that cannot be parsed
//! - **Transport**: record creators and a bounded batch source for message
//!   payloads
//!
//! # Example
//!
//! ```no_run
//! use spool_common::BatchMaker;
//! use spool_ingest::config::FormatConfig;
//! use spool_ingest::producer::build_producer;
//! use spool_ingest::source::SpoolSource;
//! use spool_ingest::spooler::{DirectorySpooler, DirectorySpoolerConfig};
//! use spool_ingest::IngestConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = IngestConfig::from_file("spool.toml".as_ref())?.normalize();
//!     config.validate()?;
//!
//!     let mut spooler = DirectorySpooler::new(DirectorySpoolerConfig::from_ingest_config(&config))?;
//!     spooler.init(config.spool.initial_file())?;
//!     let mut source = SpoolSource::new(
//!         spooler,
//!         build_producer(&config.format),
//!         config.spool.batch_size,
//!         config.spool.poll_timeout(),
//!     );
//!
//!     let mut batch = BatchMaker::new(100);
//!     let checkpoint = source.produce(None, 100, &mut batch).await?;
//!     println!("{} records, resume at {:?}", batch.len(), checkpoint);
//!     Ok(())
//! }
//! ```

pub mod checkpoint;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod producer;
pub mod runner;
pub mod source;
pub mod spooler;
pub mod transport;

pub use checkpoint::FileCheckpointStore;
pub use config::IngestConfig;
pub use error::{BadSourceError, ConfigError, CreatorError, ProducerError, SpoolerError, StageError};
pub use source::{SourceState, SpoolSource};
