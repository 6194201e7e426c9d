//! Spool-list collaborator
//!
//! A spooler hands out the files of a spool in ascending name order and owns
//! their lifecycle once read. [`DirectorySpooler`] implements it over a local
//! directory.

mod directory;

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;

use crate::error::SpoolerError;

pub use directory::{DirectorySpooler, DirectorySpoolerConfig};

/// Source of spool files
#[async_trait]
pub trait Spooler: Send {
    /// Wait up to `timeout` for the next file.
    ///
    /// Returns `Ok(None)` when nothing arrived in time and
    /// [`SpoolerError::Interrupted`] when the wait was cancelled.
    async fn poll_for_file(&mut self, timeout: Duration) -> Result<Option<PathBuf>, SpoolerError>;

    /// Quarantine the file most recently handed out.
    async fn handle_current_file_as_error(&mut self) -> Result<(), SpoolerError>;
}

/// Prefix selecting a raw regular expression instead of a glob
pub const REGEX_PATTERN_PREFIX: &str = "regex:";

/// Compile a file-name pattern.
///
/// Globs support `*` and `?`; everything else matches literally. A pattern
/// starting with `regex:` is used as a regular expression as is.
pub fn compile_pattern(pattern: &str) -> Result<Regex, SpoolerError> {
    let source = match pattern.strip_prefix(REGEX_PATTERN_PREFIX) {
        Some(regex) => regex.to_string(),
        None => glob_to_regex(pattern),
    };
    Regex::new(&source).map_err(|error| SpoolerError::Pattern {
        pattern: pattern.to_string(),
        error,
    })
}

fn glob_to_regex(glob: &str) -> String {
    let mut regex = String::with_capacity(glob.len() + 8);
    regex.push('^');
    for c in glob.chars() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            c => regex.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    regex.push('$');
    regex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_patterns() {
        let pattern = compile_pattern("records-??????.json").unwrap();
        assert!(pattern.is_match("records-000001.json"));
        assert!(!pattern.is_match("records-1.json"));
        assert!(!pattern.is_match("records-000001xjson"));

        let pattern = compile_pattern("*.log").unwrap();
        assert!(pattern.is_match("app.log"));
        assert!(!pattern.is_match("app.log.gz"));
    }

    #[test]
    fn test_regex_patterns() {
        let pattern = compile_pattern(r"regex:^part-\d+$").unwrap();
        assert!(pattern.is_match("part-12"));
        assert!(matches!(
            compile_pattern("regex:(").unwrap_err(),
            SpoolerError::Pattern { .. }
        ));
    }
}
