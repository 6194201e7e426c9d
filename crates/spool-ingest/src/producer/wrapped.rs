//! Wrapped-record producer
//!
//! Reads back records that an upstream pipeline wrote in the
//! `{"id": ..., "value": ...}` line encoding. Ids are preserved.

use std::path::Path;

use spool_common::{BatchMaker, Position, Record};

use super::{open_at, source_name, DataProducer, LineReader, ScanError};
use crate::error::{BadSourceError, ProducerError};

#[derive(Debug, Clone, Default)]
pub struct WrappedProducer;

impl WrappedProducer {
    pub fn new() -> Self {
        Self
    }
}

impl DataProducer for WrappedProducer {
    fn produce(
        &mut self,
        path: &Path,
        offset: u64,
        max_records: usize,
        batch: &mut BatchMaker,
    ) -> Result<Position, ProducerError> {
        let name = source_name(path);
        let mut lines = LineReader::new(open_at(path, offset)?, offset);
        let limit = max_records.min(batch.remaining());
        let mut produced = 0;

        while produced < limit {
            let Some((start, line)) = lines.next_line().map_err(|e| ProducerError::io(path, e))? else {
                return Ok(Position::Exhausted);
            };
            if is_blank(line) {
                continue;
            }
            let record = decode_line(line).map_err(|reason| BadSourceError::new(&name, start, reason))?;
            batch.add(record);
            produced += 1;
        }

        // Resume at the next record; blank lines alone leave nothing to read
        while let Some((start, line)) = lines.next_line().map_err(|e| ProducerError::io(path, e))? {
            if !is_blank(line) {
                return Ok(Position::At(start));
            }
        }
        Ok(Position::Exhausted)
    }
}

fn is_blank(line: &[u8]) -> bool {
    line.iter().all(u8::is_ascii_whitespace)
}

fn decode_line(line: &[u8]) -> Result<Record, String> {
    serde_json::from_slice(line).map_err(|e| format!("invalid wrapped record: {e}"))
}

/// Decode every non-blank line of a payload
pub(crate) fn parse_wrapped(payload: &[u8]) -> Result<Vec<Record>, ScanError> {
    let mut records = Vec::new();
    let mut position = 0;
    for line in payload.split_inclusive(|b| *b == b'\n') {
        let content = super::trim_line_ending(line);
        if !is_blank(content) {
            records.push(decode_line(content).map_err(|reason| ScanError::new(position, reason))?);
        }
        position += line.len();
    }
    Ok(records)
}
