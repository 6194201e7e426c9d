//! Durable checkpoint storage

use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Stores the opaque offset string in a single file.
///
/// Writes go to a sibling temp file that is then renamed over the target, so
/// a crash leaves either the old or the new checkpoint.
#[derive(Debug, Clone)]
pub struct FileCheckpointStore {
    path: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last committed offset, `None` when nothing was committed yet
    pub fn load(&self) -> io::Result<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => {
                let offset = content.trim_end_matches(['\n', '\r']);
                Ok((!offset.is_empty()).then(|| offset.to_string()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Persist `offset`. `None` clears the checkpoint.
    pub fn commit(&self, offset: Option<&str>) -> io::Result<()> {
        let Some(offset) = offset else {
            return match std::fs::remove_file(&self.path) {
                Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
                _ => Ok(()),
            };
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, format!("{offset}\n"))?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(offset = %offset, path = %self.path.display(), "Checkpoint committed");
        Ok(())
    }
}
