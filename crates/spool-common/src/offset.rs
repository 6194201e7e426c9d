//! Resumable source offsets
//!
//! A checkpoint is an opaque string of the form `<source>::<position>`, or no
//! string at all when the stream has not started yet. The position `-1` is the
//! only negative value allowed and means the source has been fully drained.
//!
//! ```
//! use spool_common::offset::{decode, encode, Position};
//!
//! let offset = encode(Some("file-0001.log"), Position::At(42));
//! assert_eq!(offset.as_deref(), Some("file-0001.log::42"));
//!
//! let decoded = decode(offset.as_deref()).unwrap();
//! assert_eq!(decoded.source.as_deref(), Some("file-0001.log"));
//! assert_eq!(decoded.position, Position::At(42));
//! ```

use std::fmt;

use crate::error::{Result, SpoolError};

/// Token between the source identifier and the position.
///
/// Decoding splits on the last occurrence, so identifiers that contain the
/// token still round-trip as long as a position is always encoded.
pub const OFFSET_SEPARATOR: &str = "::";

/// Raw value persisted for [`Position::Exhausted`].
pub const EXHAUSTED_RAW: i64 = -1;

/// Byte position within a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Position {
    /// Resume at this byte
    At(u64),
    /// Source fully consumed, advance to the next one
    Exhausted,
}

impl Position {
    /// Beginning of a source
    pub const START: Position = Position::At(0);

    /// Interpret a raw persisted position.
    pub fn from_raw(raw: i64) -> Result<Self> {
        match raw {
            EXHAUSTED_RAW => Ok(Position::Exhausted),
            n if n >= 0 => Ok(Position::At(n as u64)),
            n => Err(SpoolError::InvalidPosition(n)),
        }
    }

    pub fn as_raw(self) -> i64 {
        match self {
            Position::At(pos) => pos as i64,
            Position::Exhausted => EXHAUSTED_RAW,
        }
    }

    pub fn is_exhausted(self) -> bool {
        matches!(self, Position::Exhausted)
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::START
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_raw())
    }
}

/// Decoded checkpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOffset {
    /// Source the position refers to, `None` at stream start
    pub source: Option<String>,
    pub position: Position,
}

impl SourceOffset {
    pub fn new(source: impl Into<String>, position: Position) -> Self {
        Self {
            source: Some(source.into()),
            position,
        }
    }

    pub fn encode(&self) -> Option<String> {
        encode(self.source.as_deref(), self.position)
    }
}

/// Decode a checkpoint string.
///
/// `None` (or an empty string) yields `(None, 0)`. A string without a
/// separator names a source to be read from its start.
pub fn decode(offset: Option<&str>) -> Result<SourceOffset> {
    let Some(offset) = offset.filter(|o| !o.is_empty()) else {
        return Ok(SourceOffset::default());
    };

    let Some(idx) = offset.rfind(OFFSET_SEPARATOR) else {
        return Ok(SourceOffset::new(offset, Position::START));
    };

    let (source, raw) = (&offset[..idx], &offset[idx + OFFSET_SEPARATOR.len()..]);
    if source.is_empty() {
        return Err(SpoolError::InvalidOffset {
            offset: offset.to_string(),
            reason: "empty source identifier".to_string(),
        });
    }

    let raw: i64 = raw.parse().map_err(|e| SpoolError::InvalidOffset {
        offset: offset.to_string(),
        reason: format!("position is not an integer: {}", e),
    })?;

    Ok(SourceOffset::new(source, Position::from_raw(raw)?))
}

/// Encode a checkpoint string. No source means no checkpoint.
pub fn encode(source: Option<&str>, position: Position) -> Option<String> {
    source.map(|s| format!("{}{}{}", s, OFFSET_SEPARATOR, position))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_absent_is_stream_start() {
        let decoded = decode(None).unwrap();
        assert_eq!(decoded.source, None);
        assert_eq!(decoded.position, Position::At(0));

        assert_eq!(decode(Some("")).unwrap(), SourceOffset::default());
    }

    #[test]
    fn test_encode_without_source() {
        assert_eq!(encode(None, Position::At(10)), None);
        assert_eq!(encode(None, Position::Exhausted), None);
    }

    #[test]
    fn test_exhausted_sentinel() {
        let offset = encode(Some("a.json"), Position::Exhausted).unwrap();
        assert_eq!(offset, "a.json::-1");
        assert!(decode(Some(&offset)).unwrap().position.is_exhausted());
    }

    #[test]
    fn test_other_negative_positions_rejected() {
        assert!(matches!(
            decode(Some("a.json::-2")),
            Err(SpoolError::InvalidPosition(-2))
        ));
    }

    #[test]
    fn test_garbage_position_rejected() {
        assert!(matches!(
            decode(Some("a.json::abc")),
            Err(SpoolError::InvalidOffset { .. })
        ));
        assert!(decode(Some("::5")).is_err());
    }

    #[test]
    fn test_source_without_separator_starts_at_zero() {
        let decoded = decode(Some("legacy.log")).unwrap();
        assert_eq!(decoded.source.as_deref(), Some("legacy.log"));
        assert_eq!(decoded.position, Position::START);
    }

    #[test]
    fn test_separator_inside_source_name() {
        let offset = encode(Some("odd::name.txt"), Position::At(7)).unwrap();
        let decoded = decode(Some(&offset)).unwrap();
        assert_eq!(decoded.source.as_deref(), Some("odd::name.txt"));
        assert_eq!(decoded.position, Position::At(7));
    }

    proptest! {
        #[test]
        fn prop_offsets_survive_encoding(name in "[a-zA-Z0-9_.:-]{1,24}", pos in 0u64..u32::MAX as u64) {
            let offset = encode(Some(&name), Position::At(pos)).unwrap();
            let decoded = decode(Some(&offset)).unwrap();
            prop_assert_eq!(decoded.source.as_deref(), Some(name.as_str()));
            prop_assert_eq!(decoded.position, Position::At(pos));
        }
    }
}
