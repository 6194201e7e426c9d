//! Spool source
//!
//! Each produce cycle decodes the incoming checkpoint, makes sure an eligible
//! file is open, asks the format producer for at most one batch of records and
//! returns the new checkpoint. Files that fail to parse are quarantined through
//! the spooler and the checkpoint moves past them; failing to quarantine is an
//! unrecoverable [`StageError`].
//!
//! ```text
//!   NoSource ──poll──▶ SourceOpen ──EOF / bad source──▶ SourceExhausted
//!      ▲                  │  ▲ more data                      │
//!      │                  └──┘                                 │
//!      └──────────────── next cycle needs a new file ◀─────────┘
//! ```

use std::path::PathBuf;
use std::time::Duration;

use spool_common::offset::{self, SourceOffset};
use spool_common::{BatchMaker, Position};
use tracing::{debug, error, info, warn};

use crate::eligibility::{is_eligible, needs_new_source};
use crate::error::{ProducerError, SpoolerError, StageError};
use crate::producer::{source_name, DataProducer};
use crate::spooler::Spooler;

/// Observable lifecycle of the spool source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    /// No file is open
    NoSource,
    /// A file is open and has more data
    SourceOpen,
    /// The open file has been fully read or quarantined
    SourceExhausted,
}

#[derive(Debug, Clone)]
struct OpenFile {
    name: String,
    path: PathBuf,
}

/// Resumable reader over a spool of files
pub struct SpoolSource<S> {
    spooler: S,
    producer: Box<dyn DataProducer>,
    batch_size: usize,
    poll_timeout: Duration,
    current: Option<OpenFile>,
    state: SourceState,
}

impl<S: Spooler> SpoolSource<S> {
    pub fn new(spooler: S, producer: Box<dyn DataProducer>, batch_size: usize, poll_timeout: Duration) -> Self {
        Self {
            spooler,
            producer,
            batch_size,
            poll_timeout,
            current: None,
            state: SourceState::NoSource,
        }
    }

    pub fn state(&self) -> SourceState {
        self.state
    }

    /// Name of the open file
    pub fn current_file(&self) -> Option<&str> {
        self.current.as_ref().map(|f| f.name.as_str())
    }

    pub fn spooler(&self) -> &S {
        &self.spooler
    }

    /// Run one produce cycle.
    ///
    /// Returns the checkpoint to persist once the batch has been delivered.
    pub async fn produce(
        &mut self,
        last_offset: Option<&str>,
        max_batch_size: usize,
        batch: &mut BatchMaker,
    ) -> Result<Option<String>, StageError> {
        let limit = self.batch_size.min(max_batch_size);
        let SourceOffset {
            source: mut file,
            mut position,
        } = offset::decode(last_offset)?;

        if needs_new_source(self.current_file(), file.as_deref(), position) {
            self.close();
            match self.next_eligible_file(file.as_deref(), position).await {
                Ok(Some(next)) => {
                    if file.as_deref().is_none_or(|checkpoint| next.name.as_str() > checkpoint) {
                        file = Some(next.name.clone());
                        position = Position::START;
                    }
                    info!(file = %next.name, position = %position, "Opened spool file");
                    self.current = Some(next);
                    self.state = SourceState::SourceOpen;
                }
                Ok(None) => debug!("No spool file available, producing an empty batch"),
                Err(SpoolerError::Interrupted) => {
                    warn!("Spool poll interrupted, keeping the previous checkpoint");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let Some(current) = self.current.clone() else {
            return Ok(offset::encode(file.as_deref(), position));
        };
        let Position::At(start) = position else {
            // An open file is never exhausted here: exhaustion forces a new poll
            self.state = SourceState::SourceExhausted;
            return Ok(offset::encode(file.as_deref(), position));
        };

        position = match self.producer.produce(&current.path, start, limit, batch) {
            Ok(next) => next,
            Err(ProducerError::BadSource(bad)) => {
                error!(
                    file = %bad.source_id,
                    position = bad.position,
                    reason = %bad.reason,
                    "Spool file cannot be parsed, quarantining"
                );
                batch.report_error(&bad.source_id, bad.position as i64, &bad.reason);
                self.spooler
                    .handle_current_file_as_error()
                    .await
                    .map_err(|error| StageError::Quarantine {
                        source_id: current.name.clone(),
                        error,
                    })?;
                Position::Exhausted
            }
            Err(e) => return Err(e.into()),
        };

        self.state = if position.is_exhausted() {
            debug!(file = %current.name, "Spool file exhausted");
            SourceState::SourceExhausted
        } else {
            SourceState::SourceOpen
        };
        Ok(offset::encode(file.as_deref(), position))
    }

    /// Poll until the spooler offers a file the checkpoint allows, or nothing
    async fn next_eligible_file(
        &mut self,
        checkpoint_file: Option<&str>,
        position: Position,
    ) -> Result<Option<OpenFile>, SpoolerError> {
        loop {
            let Some(path) = self.spooler.poll_for_file(self.poll_timeout).await? else {
                return Ok(None);
            };
            let name = source_name(&path);
            if is_eligible(Some(&name), checkpoint_file, position) {
                return Ok(Some(OpenFile { name, path }));
            }
            warn!(
                file = %name,
                checkpoint = checkpoint_file.unwrap_or_default(),
                position = %position,
                "Skipping spool file that sorts before the checkpoint"
            );
        }
    }

    fn close(&mut self) {
        if let Some(file) = self.current.take() {
            debug!(file = %file.name, "Closing spool file");
        }
        self.state = SourceState::NoSource;
    }
}
