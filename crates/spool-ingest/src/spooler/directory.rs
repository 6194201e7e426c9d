//! Local directory spooler

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use regex::Regex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{compile_pattern, Spooler};
use crate::config::{IngestConfig, PostProcessing};
use crate::error::SpoolerError;

/// Directory spooler settings
#[derive(Debug, Clone)]
pub struct DirectorySpoolerConfig {
    pub dir: PathBuf,
    pub file_pattern: String,
    /// More files than this waiting at once is an error
    pub max_spool_files: usize,
    pub post_processing: PostProcessing,
    pub archive_dir: Option<PathBuf>,
    /// Archived files older than this are purged, `None` keeps them
    pub archive_retention: Option<Duration>,
    pub error_archive_dir: Option<PathBuf>,
    pub poll_interval: Duration,
}

impl DirectorySpoolerConfig {
    pub fn from_ingest_config(config: &IngestConfig) -> Self {
        Self {
            dir: config.spool.spool_dir.clone(),
            file_pattern: config.spool.file_pattern.clone(),
            max_spool_files: config.spool.max_spool_files,
            post_processing: config.post_processing.action,
            archive_dir: config.post_processing.archive_dir.clone(),
            archive_retention: config.post_processing.retention(),
            error_archive_dir: config.spool.error_archive_dir.clone(),
            poll_interval: config.spool.poll_interval(),
        }
    }
}

/// Hands out the matching files of a directory in ascending name order.
///
/// A file is post-processed when the next one is handed out, so the file
/// being read is never touched.
pub struct DirectorySpooler {
    config: DirectorySpoolerConfig,
    pattern: Regex,
    /// Files sorting before this are never offered
    initial_file: Option<String>,
    last_offered: Option<String>,
    current: Option<PathBuf>,
    shutdown: CancellationToken,
}

impl DirectorySpooler {
    pub fn new(config: DirectorySpoolerConfig) -> Result<Self, SpoolerError> {
        let pattern = compile_pattern(&config.file_pattern)?;
        Ok(Self {
            config,
            pattern,
            initial_file: None,
            last_offered: None,
            current: None,
            shutdown: CancellationToken::new(),
        })
    }

    /// Cancel waits through `token`
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Start the spool at `initial_file`. Files sorting before it are skipped.
    pub fn init(&mut self, initial_file: Option<&str>) -> Result<(), SpoolerError> {
        if !self.config.dir.is_dir() {
            return Err(SpoolerError::io(
                &self.config.dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "spool directory does not exist"),
            ));
        }
        self.initial_file = initial_file.filter(|f| !f.is_empty()).map(str::to_string);
        info!(
            dir = %self.config.dir.display(),
            pattern = %self.config.file_pattern,
            initial_file = ?self.initial_file,
            "Spooler initialized"
        );
        Ok(())
    }

    /// Matching files after the last offered one, sorted
    async fn pending_files(&self) -> Result<Vec<String>, SpoolerError> {
        let dir = &self.config.dir;
        let mut entries = tokio::fs::read_dir(dir).await.map_err(|e| SpoolerError::io(dir, e))?;
        let mut files = Vec::new();

        while let Some(entry) = entries.next_entry().await.map_err(|e| SpoolerError::io(dir, e))? {
            let file_type = entry.file_type().await.map_err(|e| SpoolerError::io(entry.path(), e))?;
            if !file_type.is_file() {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if !self.pattern.is_match(&name) {
                continue;
            }
            if self.initial_file.as_deref().is_some_and(|initial| name.as_str() < initial) {
                continue;
            }
            if self.last_offered.as_deref().is_some_and(|last| name.as_str() <= last) {
                continue;
            }
            files.push(name);
        }

        files.sort();
        Ok(files)
    }

    async fn post_process(&self, path: &Path) -> Result<(), SpoolerError> {
        match self.config.post_processing {
            PostProcessing::None => Ok(()),
            PostProcessing::Delete => {
                debug!(file = %path.display(), "Deleting consumed spool file");
                match tokio::fs::remove_file(path).await {
                    Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(SpoolerError::io(path, e)),
                    _ => Ok(()),
                }
            }
            PostProcessing::Archive => match &self.config.archive_dir {
                Some(archive_dir) => {
                    debug!(file = %path.display(), archive = %archive_dir.display(), "Archiving consumed spool file");
                    move_into(path, archive_dir).await
                }
                None => {
                    warn!(file = %path.display(), "No archive directory configured, leaving file in place");
                    Ok(())
                }
            },
        }
    }

    /// Remove archived files older than the retention. Failures are logged.
    async fn purge_archive(&self) {
        let (Some(archive_dir), Some(retention)) = (&self.config.archive_dir, self.config.archive_retention) else {
            return;
        };
        let Some(cutoff) = SystemTime::now().checked_sub(retention) else {
            return;
        };
        let mut entries = match tokio::fs::read_dir(archive_dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(archive = %archive_dir.display(), error = %e, "Archive directory not readable");
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let expired = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified < cutoff,
                Err(_) => false,
            };
            if expired {
                if let Err(e) = tokio::fs::remove_file(entry.path()).await {
                    warn!(file = %entry.path().display(), error = %e, "Failed to purge archived file");
                } else {
                    debug!(file = %entry.path().display(), "Purged archived file");
                }
            }
        }
    }
}

#[async_trait]
impl Spooler for DirectorySpooler {
    async fn poll_for_file(&mut self, timeout: Duration) -> Result<Option<PathBuf>, SpoolerError> {
        let deadline = Instant::now() + timeout;

        loop {
            self.purge_archive().await;

            let pending = self.pending_files().await?;
            if pending.len() > self.config.max_spool_files {
                return Err(SpoolerError::TooManyFiles {
                    count: pending.len(),
                    max: self.config.max_spool_files,
                });
            }

            if let Some(next) = pending.into_iter().next() {
                if let Some(previous) = self.current.take() {
                    self.post_process(&previous).await?;
                }
                let path = self.config.dir.join(&next);
                debug!(file = %next, "Offering spool file");
                self.last_offered = Some(next);
                self.current = Some(path.clone());
                return Ok(Some(path));
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            let wait = self.config.poll_interval.min(deadline - now);

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    debug!("Spool poll cancelled");
                    return Err(SpoolerError::Interrupted);
                }
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    async fn handle_current_file_as_error(&mut self) -> Result<(), SpoolerError> {
        let Some(path) = self.current.take() else {
            return Ok(());
        };
        match &self.config.error_archive_dir {
            Some(error_dir) => {
                error!(file = %path.display(), error_dir = %error_dir.display(), "Moving bad spool file to error directory");
                move_into(&path, error_dir).await
            }
            None => {
                error!(file = %path.display(), "Bad spool file left in place, no error directory configured");
                Ok(())
            }
        }
    }
}

/// Move `path` into `dir`, copying when a rename across devices fails
async fn move_into(path: &Path, dir: &Path) -> Result<(), SpoolerError> {
    tokio::fs::create_dir_all(dir).await.map_err(|e| SpoolerError::io(dir, e))?;
    let Some(name) = path.file_name() else {
        return Err(SpoolerError::io(
            path,
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        ));
    };
    let target = dir.join(name);

    if tokio::fs::rename(path, &target).await.is_ok() {
        return Ok(());
    }
    tokio::fs::copy(path, &target).await.map_err(|e| SpoolerError::io(path, e))?;
    tokio::fs::remove_file(path).await.map_err(|e| SpoolerError::io(path, e))
}
