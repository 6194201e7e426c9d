//! Which spool file to read next
//!
//! Files are consumed in ascending lexicographic order of their names. Given
//! the checkpoint `(file, position)`, these two predicates decide when to ask
//! the spooler for another file and whether an offered file may be read.

use spool_common::Position;

/// Whether the orchestrator must obtain a new file before producing.
///
/// True when nothing is open, when there is no checkpoint file, when the open
/// file sorts before the checkpoint file, or when the checkpoint file is
/// exhausted.
pub fn needs_new_source(current: Option<&str>, checkpoint_file: Option<&str>, position: Position) -> bool {
    match (current, checkpoint_file) {
        (None, _) | (_, None) => true,
        (Some(current), Some(checkpoint)) => current < checkpoint || position.is_exhausted(),
    }
}

/// Whether an offered file may be read given the checkpoint.
///
/// An absent offer is trivially eligible. A file equal to the checkpoint file
/// is eligible only while it still has data; earlier files are stale.
pub fn is_eligible(offered: Option<&str>, checkpoint_file: Option<&str>, position: Position) -> bool {
    match (offered, checkpoint_file) {
        (None, _) | (_, None) => true,
        (Some(offered), Some(checkpoint)) => {
            (offered == checkpoint && !position.is_exhausted()) || offered > checkpoint
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AT: Position = Position::At(10);
    const DONE: Position = Position::Exhausted;

    #[test]
    fn test_needs_new_source() {
        assert!(needs_new_source(None, Some("b"), AT));
        assert!(needs_new_source(Some("b"), None, AT));
        assert!(needs_new_source(Some("a"), Some("b"), AT));
        assert!(needs_new_source(Some("b"), Some("b"), DONE));
        assert!(!needs_new_source(Some("b"), Some("b"), AT));
        assert!(!needs_new_source(Some("c"), Some("b"), AT));
    }

    #[test]
    fn test_is_eligible() {
        assert!(is_eligible(None, Some("b"), AT));
        assert!(is_eligible(Some("a"), None, DONE));
        assert!(is_eligible(Some("b"), Some("b"), AT));
        assert!(!is_eligible(Some("b"), Some("b"), DONE));
        assert!(is_eligible(Some("c"), Some("b"), DONE));
        assert!(!is_eligible(Some("a"), Some("b"), AT));
    }

    #[test]
    fn test_ordering_is_bytewise() {
        assert!(is_eligible(Some("file-10"), Some("file-09"), DONE));
        assert!(!is_eligible(Some("File-b"), Some("file-a"), AT));
    }
}
