//! Spool ingest run loop
//!
//! Repeats produce cycles, writes each batch as JSON lines and commits the
//! checkpoint only after the batch has been written and flushed. A crash
//! between the two replays at most one batch.

use std::io::Write;

use anyhow::{Context, Result};
use serde_jsonlines::JsonLinesWriter;
use spool_common::{offset, BatchMaker};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::checkpoint::FileCheckpointStore;
use crate::config::IngestConfig;
use crate::producer::build_producer;
use crate::source::SpoolSource;
use crate::spooler::{DirectorySpooler, DirectorySpoolerConfig};

/// Per-run options
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Records requested per cycle
    pub max_batch_size: usize,
    /// Stop after a single cycle
    pub once: bool,
}

/// Totals for a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    pub cycles: u64,
    pub records: u64,
    pub errors: u64,
}

/// Ingest the configured spool directory until `shutdown` is cancelled.
pub async fn run_spool<W: Write>(
    config: &IngestConfig,
    store: &FileCheckpointStore,
    output: W,
    options: RunOptions,
    shutdown: CancellationToken,
) -> Result<RunStats> {
    let mut checkpoint = store
        .load()
        .with_context(|| format!("Failed to load checkpoint from {}", store.path().display()))?;

    // Start the spool at the checkpoint file so older files are not counted as waiting
    let resume_file = offset::decode(checkpoint.as_deref())
        .context("Stored checkpoint is invalid")?
        .source;
    let initial_file = resume_file.as_deref().or(config.spool.initial_file());

    let mut spooler = DirectorySpooler::new(DirectorySpoolerConfig::from_ingest_config(config))?
        .with_shutdown(shutdown.clone());
    spooler.init(initial_file)?;

    let mut source = SpoolSource::new(
        spooler,
        build_producer(&config.format),
        config.spool.batch_size,
        config.spool.poll_timeout(),
    );
    let mut writer = JsonLinesWriter::new(output);
    let mut stats = RunStats::default();

    info!(
        dir = %config.spool.spool_dir.display(),
        checkpoint = ?checkpoint,
        format = ?config.format.data_format,
        "Starting spool ingest"
    );

    loop {
        let mut batch = BatchMaker::new(options.max_batch_size);
        let next = source
            .produce(checkpoint.as_deref(), options.max_batch_size, &mut batch)
            .await?;
        let (records, errors) = batch.into_parts();

        for record in &records {
            writer.write(record).context("Failed to write record")?;
        }
        writer.flush().context("Failed to flush output")?;

        for report in &errors {
            error!(source = %report.source, position = report.position, "{}", report.message);
        }

        stats.cycles += 1;
        stats.records += records.len() as u64;
        stats.errors += errors.len() as u64;

        if next != checkpoint {
            store
                .commit(next.as_deref())
                .with_context(|| format!("Failed to commit checkpoint to {}", store.path().display()))?;
            checkpoint = next;
        }

        if options.once || shutdown.is_cancelled() {
            break;
        }
    }

    info!(
        cycles = stats.cycles,
        records = stats.records,
        errors = stats.errors,
        checkpoint = ?checkpoint,
        "Spool ingest stopped"
    );
    Ok(stats)
}
