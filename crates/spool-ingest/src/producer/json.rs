//! JSON producer
//!
//! Values are framed straight off the file reader: brackets and strings are
//! tracked byte by byte until the value closes, and only then handed to
//! `serde_json`. A value longer than the configured maximum stops the read
//! before the rest of it is buffered. In array mode the brackets and
//! separators between elements are consumed by hand so that a resume offset
//! always points just past an element.

use std::io::BufRead;
use std::path::Path;

use serde_json::Value;
use spool_common::{BatchMaker, Position, Record};

use super::{open_at, source_name, DataProducer, ReadError, ScanError};
use crate::config::JsonMode;
use crate::error::ProducerError;

/// Produces one record per JSON value.
#[derive(Debug, Clone)]
pub struct JsonProducer {
    mode: JsonMode,
    max_object_len: usize,
    /// Array mode only: emit the whole array as one list record
    single_record: bool,
}

impl JsonProducer {
    pub fn new(mode: JsonMode, max_object_len: usize, single_record: bool) -> Self {
        Self {
            mode,
            max_object_len,
            single_record,
        }
    }

    fn produce_array_record<R: BufRead>(
        &self,
        path: &Path,
        offset: u64,
        mut scanner: JsonScanner<R>,
        batch: &mut BatchMaker,
    ) -> Result<Position, ProducerError> {
        let name = source_name(path);
        let mut values = Vec::new();
        let mut first = None;
        while let Some((start, value)) = scanner
            .next_value()
            .map_err(|e| e.into_producer_error(path, &name, offset))?
        {
            first.get_or_insert(start);
            values.push(value);
        }

        if let Some(start) = first {
            let id = Record::file_id(&name, offset + start);
            batch.add(Record::new(id, Value::Array(values)));
        }
        Ok(Position::Exhausted)
    }
}

impl DataProducer for JsonProducer {
    fn produce(
        &mut self,
        path: &Path,
        offset: u64,
        max_records: usize,
        batch: &mut BatchMaker,
    ) -> Result<Position, ProducerError> {
        let name = source_name(path);
        let limit = max_records.min(batch.remaining());
        if limit == 0 {
            return Ok(Position::At(offset));
        }

        let reader = open_at(path, offset)?;
        let mut scanner = if offset == 0 {
            JsonScanner::new(reader, self.mode, self.max_object_len)
        } else {
            JsonScanner::resume(reader, self.mode, self.max_object_len)
        };

        if self.single_record && self.mode == JsonMode::ArrayObjects {
            return self.produce_array_record(path, offset, scanner, batch);
        }

        for _ in 0..limit {
            match scanner.next_value() {
                Ok(Some((start, value))) => {
                    batch.add(Record::new(Record::file_id(&name, offset + start), value));
                }
                Ok(None) => return Ok(Position::Exhausted),
                Err(e) => return Err(e.into_producer_error(path, &name, offset)),
            }
        }

        if scanner.has_more() {
            Ok(Position::At(offset + scanner.position()))
        } else {
            Ok(Position::Exhausted)
        }
    }
}

/// Parse every JSON value in a payload
pub(crate) fn parse_values(payload: &[u8], mode: JsonMode, max_len: usize) -> Result<Vec<Value>, ScanError> {
    let mut scanner = JsonScanner::new(payload, mode, max_len);
    let mut values = Vec::new();
    while let Some((_, value)) = scanner.next_value().map_err(ReadError::into_scan_error)? {
        values.push(value);
    }
    Ok(values)
}

/// Ends a bare scalar such as a number or `true`
fn ends_scalar(byte: u8) -> bool {
    byte.is_ascii_whitespace() || b",:[]{}\"".contains(&byte)
}

/// Cursor over the JSON values of a reader
pub(crate) struct JsonScanner<R> {
    reader: R,
    /// Bytes consumed from `reader`
    consumed: u64,
    /// Offset just past the last value returned
    pos: u64,
    mode: JsonMode,
    max_len: usize,
    /// Opening bracket already consumed (array mode)
    in_array: bool,
    done: bool,
    value: Vec<u8>,
}

impl<R: BufRead> JsonScanner<R> {
    /// Scan a reader from the start of a source
    pub fn new(reader: R, mode: JsonMode, max_len: usize) -> Self {
        Self {
            reader,
            consumed: 0,
            pos: 0,
            mode,
            max_len,
            in_array: false,
            done: false,
            value: Vec::new(),
        }
    }

    /// Scan a reader that starts just past a previously returned value
    pub fn resume(reader: R, mode: JsonMode, max_len: usize) -> Self {
        Self {
            in_array: mode == JsonMode::ArrayObjects,
            ..Self::new(reader, mode, max_len)
        }
    }

    /// Offset just past the last value returned
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Whether another value follows. Malformed or unreadable content counts
    /// as more data so that it is reported by the next read.
    pub fn has_more(&mut self) -> bool {
        if self.done {
            return false;
        }
        match (self.mode, self.skip_ws()) {
            (_, Err(_)) => true,
            (JsonMode::ArrayObjects, Ok(next)) => next != Some(b']'),
            (_, Ok(next)) => next.is_some(),
        }
    }

    /// Next value with the offset it starts at
    pub fn next_value(&mut self) -> Result<Option<(u64, Value)>, ReadError> {
        if self.done {
            return Ok(None);
        }
        match self.mode {
            JsonMode::SingleObject | JsonMode::MultipleObjects => {
                if self.skip_ws()?.is_none() {
                    self.finish();
                    return Ok(None);
                }
            }
            JsonMode::ArrayObjects => {
                if !self.next_element()? {
                    return Ok(None);
                }
            }
        }

        let start = self.consumed;
        self.frame_value(start)?;
        let value = serde_json::from_slice(&self.value)
            .map_err(|e| ScanError::new(start as usize, format!("invalid JSON: {e}")))?;

        self.pos = self.consumed;
        if self.mode == JsonMode::SingleObject {
            self.done = true;
        }
        Ok(Some((start, value)))
    }

    /// Copy the value starting at the current byte into `self.value`
    fn frame_value(&mut self, start: u64) -> Result<(), ReadError> {
        self.value.clear();
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;

        while let Some(byte) = self.peek()? {
            if !in_string && depth == 0 && !self.value.is_empty() && ends_scalar(byte) {
                return Ok(());
            }
            if self.value.len() == self.max_len {
                return Err(ScanError::new(
                    start as usize,
                    format!("JSON object exceeds the maximum of {} bytes", self.max_len),
                )
                .into());
            }
            self.value.push(byte);
            self.bump();

            if in_string {
                if escaped {
                    escaped = false;
                } else if byte == b'\\' {
                    escaped = true;
                } else if byte == b'"' {
                    in_string = false;
                    if depth == 0 {
                        return Ok(());
                    }
                }
                continue;
            }
            match byte {
                b'"' => in_string = true,
                b'{' | b'[' => depth += 1,
                b'}' | b']' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Ok(());
                    }
                }
                _ => {}
            }
        }

        if depth > 0 || in_string {
            return Err(ScanError::new(start as usize, "invalid JSON: unexpected end of input").into());
        }
        Ok(())
    }

    /// Consume the bracket or separator before the next array element.
    /// Returns `false` at the closing bracket or in an empty source.
    fn next_element(&mut self) -> Result<bool, ReadError> {
        let next = self.skip_ws()?;

        if !self.in_array {
            match next {
                None => {
                    self.finish();
                    return Ok(false);
                }
                Some(b'[') => self.bump(),
                Some(_) => return Err(self.malformed("expected a JSON array")),
            }
            self.in_array = true;
            return match self.skip_ws()? {
                Some(b']') => {
                    self.bump();
                    self.finish();
                    Ok(false)
                }
                Some(_) => Ok(true),
                None => Err(self.malformed("unterminated JSON array")),
            };
        }

        match next {
            Some(b',') => {
                self.bump();
                match self.skip_ws()? {
                    Some(_) => Ok(true),
                    None => Err(self.malformed("unterminated JSON array")),
                }
            }
            Some(b']') => {
                self.bump();
                self.finish();
                Ok(false)
            }
            None => Err(self.malformed("unterminated JSON array")),
            Some(_) => Err(self.malformed("expected ',' or ']' between array elements")),
        }
    }

    fn peek(&mut self) -> Result<Option<u8>, ReadError> {
        Ok(self.reader.fill_buf()?.first().copied())
    }

    fn bump(&mut self) {
        self.reader.consume(1);
        self.consumed += 1;
    }

    /// Skip whitespace and return the next byte without consuming it
    fn skip_ws(&mut self) -> Result<Option<u8>, ReadError> {
        while let Some(byte) = self.peek()? {
            if !byte.is_ascii_whitespace() {
                return Ok(Some(byte));
            }
            self.bump();
        }
        Ok(None)
    }

    fn malformed(&self, reason: &str) -> ReadError {
        ScanError::new(self.consumed as usize, reason).into()
    }

    fn finish(&mut self) {
        self.pos = self.consumed;
        self.done = true;
    }
}
