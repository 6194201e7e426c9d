//! XML producer
//!
//! Records are the elements named by the delimiter element, wherever they
//! appear. One reader streams the file from the resume offset. A resumed read
//! starts inside the enclosing elements, so their closing tags arrive without
//! a matching start and are skipped.

use std::io::{self, BufRead};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};
use spool_common::{BatchMaker, Position, Record};

use super::{open_at, source_name, DataProducer, ReadError, ScanError};
use crate::error::ProducerError;

/// Key holding element text content
pub const VALUE_FIELD: &str = "value";

/// Prefix for attribute keys
pub const ATTRIBUTE_PREFIX: &str = "@";

/// Produces one record per delimiter element.
#[derive(Debug, Clone)]
pub struct XmlProducer {
    /// `None` makes the document root the only record
    record_element: Option<String>,
    max_record_len: usize,
}

impl XmlProducer {
    pub fn new(record_element: Option<String>, max_record_len: usize) -> Self {
        Self {
            record_element,
            max_record_len,
        }
    }
}

impl DataProducer for XmlProducer {
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
        let mut scanner = XmlScanner::new(reader, self.record_element.as_deref(), self.max_record_len);

        for _ in 0..limit {
            match scanner.next_record() {
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

/// Parse every record element of a payload
pub(crate) fn parse_records(
    payload: &[u8],
    record_element: Option<&str>,
    max_len: usize,
) -> Result<Vec<Value>, ScanError> {
    let mut scanner = XmlScanner::new(payload, record_element, max_len);
    let mut records = Vec::new();
    while let Some((_, value)) = scanner.next_record().map_err(ReadError::into_scan_error)? {
        records.push(value);
    }
    Ok(records)
}

/// Cursor over the record elements of a reader
pub(crate) struct XmlScanner<'e, R> {
    reader: Reader<R>,
    buf: Vec<u8>,
    /// Offset just past the last record returned
    pos: u64,
    record_element: Option<&'e str>,
    max_len: u64,
}

impl<'e, R: BufRead> XmlScanner<'e, R> {
    pub fn new(input: R, record_element: Option<&'e str>, max_len: usize) -> Self {
        let mut reader = Reader::from_reader(input);
        let config = reader.config_mut();
        config.trim_text(true);
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        Self {
            reader,
            buf: Vec::new(),
            pos: 0,
            record_element,
            max_len: max_len as u64,
        }
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Whether another record element follows. Malformed or unreadable
    /// content counts as more data so that the next read reports it.
    pub fn has_more(&mut self) -> bool {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(ref element) | Event::Empty(ref element))
                    if is_record(self.record_element, element) =>
                {
                    return true
                }
                Ok(Event::Eof) => return false,
                Ok(_) => {}
                Err(_) => return true,
            }
        }
    }

    /// Next record with the offset of its start tag
    pub fn next_record(&mut self) -> Result<Option<(u64, Value)>, ReadError> {
        loop {
            self.buf.clear();
            let event = match self.reader.read_event_into(&mut self.buf) {
                Ok(event) => event,
                Err(e) => return Err(xml_error(e, self.reader.error_position())),
            };

            let (element, empty) = match event {
                Event::Start(element) if is_record(self.record_element, &element) => (element.into_owned(), false),
                Event::Empty(element) if is_record(self.record_element, &element) => (element.into_owned(), true),
                Event::Eof => {
                    self.pos = self.reader.buffer_position();
                    return Ok(None);
                }
                _ => continue,
            };

            // The tag spans `<`, its content and `>`; an empty tag adds `/`
            let tag_end = self.reader.buffer_position();
            let tag_len = element.len() as u64 + if empty { 3 } else { 2 };
            let limit = RecordLimit {
                start: tag_end - tag_len,
                max_len: self.max_len,
            };
            let value = if empty {
                limit.check(tag_end)?;
                Value::Object(attributes(&element).map_err(|reason| limit.error(reason))?)
            } else {
                element_value(&mut self.reader, &element, &limit)?
            };

            self.pos = self.reader.buffer_position();
            return Ok(Some((limit.start, record_value(value))));
        }
    }
}

fn is_record(record_element: Option<&str>, element: &BytesStart<'_>) -> bool {
    match record_element {
        Some(name) => element.name().as_ref() == name.as_bytes(),
        None => true,
    }
}

fn xml_error(error: quick_xml::Error, position: u64) -> ReadError {
    match error {
        quick_xml::Error::Io(e) => ReadError::Io(io::Error::new(e.kind(), e.to_string())),
        other => ScanError::new(position as usize, format!("invalid XML: {other}")).into(),
    }
}

/// Bounds one record: errors point at its start tag
struct RecordLimit {
    start: u64,
    max_len: u64,
}

impl RecordLimit {
    fn error(&self, reason: impl Into<String>) -> ReadError {
        ScanError::new(self.start as usize, reason).into()
    }

    fn check(&self, position: u64) -> Result<(), ReadError> {
        if position - self.start > self.max_len {
            return Err(self.error(format!(
                "XML record exceeds the maximum of {} bytes",
                self.max_len
            )));
        }
        Ok(())
    }
}

/// Records are always maps; bare text goes under `value`
fn record_value(value: Value) -> Value {
    match value {
        Value::Object(_) => value,
        other => {
            let mut map = Map::new();
            map.insert(VALUE_FIELD.to_string(), other);
            Value::Object(map)
        }
    }
}

/// Read the rest of an element whose start tag was just consumed
fn element_value<R: BufRead>(
    reader: &mut Reader<R>,
    element: &BytesStart<'_>,
    limit: &RecordLimit,
) -> Result<Value, ReadError> {
    let mut map = attributes(element).map_err(|reason| limit.error(reason))?;
    let mut text = String::new();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| xml_error(e, limit.start))?;
        limit.check(reader.buffer_position())?;

        match event {
            Event::Start(child) => {
                let child = child.into_owned();
                let value = element_value(reader, &child, limit)?;
                insert_child(&mut map, element_name(&child), value);
            }
            Event::Empty(child) => {
                let attrs = attributes(&child).map_err(|reason| limit.error(reason))?;
                let value = if attrs.is_empty() {
                    Value::String(String::new())
                } else {
                    Value::Object(attrs)
                };
                insert_child(&mut map, element_name(&child), value);
            }
            Event::Text(content) => {
                let content = content
                    .unescape()
                    .map_err(|e| limit.error(format!("invalid XML text: {e}")))?;
                text.push_str(&content);
            }
            Event::CData(content) => text.push_str(&String::from_utf8_lossy(&content.into_inner())),
            Event::End(_) => break,
            Event::Eof => {
                return Err(limit.error(format!(
                    "unexpected end of document inside <{}>",
                    element_name(element)
                )))
            }
            _ => {}
        }
    }

    if map.is_empty() {
        return Ok(Value::String(text));
    }
    if !text.is_empty() {
        map.insert(VALUE_FIELD.to_string(), Value::String(text));
    }
    Ok(Value::Object(map))
}

fn attributes(element: &BytesStart<'_>) -> Result<Map<String, Value>, String> {
    let mut map = Map::new();
    for attr in element.attributes() {
        let attr = attr.map_err(|e| format!("invalid XML attribute: {e}"))?;
        let key = format!("{ATTRIBUTE_PREFIX}{}", String::from_utf8_lossy(attr.key.as_ref()));
        let value = attr
            .unescape_value()
            .map_err(|e| format!("invalid XML attribute value: {e}"))?;
        map.insert(key, Value::String(value.into_owned()));
    }
    Ok(map)
}

fn element_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.name().as_ref()).into_owned()
}

/// Repeated child names collect into a list
fn insert_child(map: &mut Map<String, Value>, name: String, value: Value) {
    match map.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            map.insert(name, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const CATALOG: &str = r#"<?xml version="1.0"?>
<catalog>
  <book id="1"><title>Rust</title><tag>a</tag><tag>b</tag></book>
  <book id="2"><title>XML &amp; you</title></book>
</catalog>"#;

    #[test]
    fn test_records_by_element() {
        let records = parse_records(CATALOG.as_bytes(), Some("book"), 4096).unwrap();
        assert_eq!(
            records,
            vec![
                json!({"@id": "1", "title": "Rust", "tag": ["a", "b"]}),
                json!({"@id": "2", "title": "XML & you"}),
            ]
        );
    }

    #[test]
    fn test_resume_mid_document() {
        let buf = CATALOG.as_bytes();
        let mut scanner = XmlScanner::new(buf, Some("book"), 4096);
        let (start, _) = scanner.next_record().unwrap().unwrap();
        let start = start as usize;
        assert_eq!(&buf[start..start + 5], b"<book");
        let pos = scanner.position() as usize;
        assert_eq!(&buf[pos - 7..pos], b"</book>");
        assert!(scanner.has_more());

        // The closing </catalog> has no matching start once resumed
        let mut resumed = XmlScanner::new(&buf[pos..], Some("book"), 4096);
        let (start, value) = resumed.next_record().unwrap().unwrap();
        assert_eq!(&buf[pos + start as usize..pos + start as usize + 5], b"<book");
        assert_eq!(value["@id"], json!("2"));
        assert!(!resumed.has_more());
        assert!(resumed.next_record().unwrap().is_none());
    }

    #[test]
    fn test_empty_record_positions() {
        let buf = b"<rows><row id=\"1\"/> <row id=\"2\" /></rows>";
        let mut scanner = XmlScanner::new(&buf[..], Some("row"), 4096);
        let (start, _) = scanner.next_record().unwrap().unwrap();
        assert_eq!(start, 6);
        assert_eq!(scanner.position(), 19);
        let (start, value) = scanner.next_record().unwrap().unwrap();
        assert_eq!(start, 20);
        assert_eq!(value, json!({"@id": "2"}));
        assert!(!scanner.has_more());
    }

    #[test]
    fn test_root_record_without_element() {
        let records = parse_records(b"<msg level=\"warn\">disk full</msg>", None, 4096).unwrap();
        assert_eq!(records, vec![json!({"@level": "warn", "value": "disk full"})]);
    }

    #[test]
    fn test_text_only_record_is_wrapped() {
        let records = parse_records(b"<r><v>1</v><v>2</v></r>", Some("v"), 4096).unwrap();
        assert_eq!(records, vec![json!({"value": "1"}), json!({"value": "2"})]);
    }

    #[test]
    fn test_truncated_record_is_an_error() {
        let err = parse_records(b"<r><item><a>1</a>", Some("item"), 4096).unwrap_err();
        assert_eq!(err.position, 3);
    }

    #[test]
    fn test_max_length() {
        let err = parse_records(b"<item>0123456789</item>", Some("item"), 10).unwrap_err();
        assert!(err.reason.contains("exceeds"));
        assert_eq!(err.position, 0);
    }

    #[test]
    fn test_long_streamed_record_is_rejected() {
        use std::io::{BufReader, Read};

        // A megabyte of text inside one record
        let input = (&b"<r><item>"[..])
            .chain(io::repeat(b'a').take(1 << 20))
            .chain(&b"</item></r>"[..]);
        let mut scanner = XmlScanner::new(BufReader::new(input), Some("item"), 64);
        let err = scanner.next_record().map_err(ReadError::into_scan_error).unwrap_err();
        assert!(err.reason.contains("exceeds"));
        assert_eq!(err.position, 3);
    }
}
