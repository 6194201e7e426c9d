//! Line-text producer

use std::path::Path;

use serde_json::{Map, Value};
use spool_common::{BatchMaker, Position, Record};

use super::{open_at, source_name, DataProducer, LineReader};
use crate::error::ProducerError;

/// Key holding the line content
pub const TEXT_FIELD: &str = "text";

/// Key holding the truncation flag
pub const TRUNCATED_FIELD: &str = "truncated";

/// Produces one record per line.
///
/// Lines longer than the maximum are cut to the maximum length in bytes,
/// never splitting a UTF-8 character.
#[derive(Debug, Clone)]
pub struct TextProducer {
    max_line_length: usize,
    set_truncated: bool,
}

impl TextProducer {
    pub fn new(max_line_length: usize, set_truncated: bool) -> Self {
        Self {
            max_line_length,
            set_truncated,
        }
    }
}

impl DataProducer for TextProducer {
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

        for _ in 0..limit {
            let Some((start, line)) = lines.next_line().map_err(|e| ProducerError::io(path, e))? else {
                return Ok(Position::Exhausted);
            };
            let value = line_value(line, self.max_line_length, self.set_truncated);
            batch.add(Record::new(Record::file_id(&name, start), value));
        }

        if lines.at_eof().map_err(|e| ProducerError::io(path, e))? {
            Ok(Position::Exhausted)
        } else {
            Ok(Position::At(lines.position()))
        }
    }
}

/// Record value for one line
pub fn line_value(line: &[u8], max_len: usize, set_truncated: bool) -> Value {
    let (text, truncated) = truncate_text(line, max_len);
    let mut map = Map::new();
    map.insert(TEXT_FIELD.to_string(), Value::String(text));
    if set_truncated {
        map.insert(TRUNCATED_FIELD.to_string(), Value::Bool(truncated));
    }
    Value::Object(map)
}

/// Decode `bytes` lossily and cut the result to at most `max_len` bytes
pub fn truncate_text(bytes: &[u8], max_len: usize) -> (String, bool) {
    let mut text = String::from_utf8_lossy(bytes).into_owned();
    if text.len() <= max_len {
        return (text, false);
    }
    let mut end = max_len;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
    (text, true)
}
