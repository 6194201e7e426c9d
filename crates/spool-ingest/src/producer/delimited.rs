//! Delimited text producer (CSV, TSV and friends)

use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use serde_json::{Map, Value};
use spool_common::{BatchMaker, Position, Record};

use super::{open_at, source_name, DataProducer, ScanError};
use crate::config::{CsvMode, HeaderLine};
use crate::error::{BadSourceError, ProducerError};

/// Produces one record per delimited row.
///
/// Header names are re-read from the start of the file on every call, so a
/// resumed read yields the same keys as the first one.
#[derive(Debug, Clone)]
pub struct DelimitedProducer {
    mode: CsvMode,
    header_line: HeaderLine,
    convert_to_map: bool,
}

impl DelimitedProducer {
    pub fn new(mode: CsvMode, header_line: HeaderLine, convert_to_map: bool) -> Self {
        Self {
            mode,
            header_line,
            convert_to_map,
        }
    }

    /// Header names (if used) and the byte offset of the first data row
    fn read_header(&self, path: &Path, name: &str) -> Result<(Option<Vec<String>>, u64), ProducerError> {
        if self.header_line == HeaderLine::NoHeader {
            return Ok((None, 0));
        }

        let mut reader = reader_builder(self.mode).from_reader(open_at(path, 0)?);
        let mut header = StringRecord::new();
        match reader.read_record(&mut header) {
            Ok(true) => {
                let names = (self.header_line == HeaderLine::WithHeader)
                    .then(|| header.iter().map(str::to_string).collect());
                Ok((names, reader.position().byte()))
            }
            Ok(false) => Ok((None, 0)),
            Err(e) => Err(csv_error(path, name, 0, "malformed header line", e)),
        }
    }
}

impl DataProducer for DelimitedProducer {
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

        let (headers, data_start) = self.read_header(path, &name)?;
        let start = offset.max(data_start);
        let mut reader = reader_builder(self.mode).from_reader(open_at(path, start)?);
        let mut row = StringRecord::new();

        for _ in 0..limit {
            let row_start = start + reader.position().byte();
            match reader.read_record(&mut row) {
                Ok(true) => {}
                Ok(false) => return Ok(Position::Exhausted),
                Err(e) => return Err(csv_error(path, &name, row_start, "malformed delimited record", e)),
            }
            let value = row_value(&row, headers.as_deref(), self.convert_to_map);
            batch.add(Record::new(Record::file_id(&name, row_start), value));
        }

        let end = start + reader.position().byte();
        match reader.read_record(&mut row) {
            Ok(false) => Ok(Position::Exhausted),
            _ => Ok(Position::At(end)),
        }
    }
}

/// Reader settings for a dialect. Header handling is done by the caller.
pub(crate) fn reader_builder(mode: CsvMode) -> ReaderBuilder {
    let mut builder = ReaderBuilder::new();
    builder.has_headers(false);
    match mode {
        CsvMode::Csv | CsvMode::Excel => {
            builder.flexible(true);
        }
        CsvMode::Rfc4180 => {
            builder.flexible(false);
        }
        CsvMode::Mysql => {
            builder.delimiter(b'\t').quoting(false).flexible(true);
        }
        CsvMode::Tdf => {
            builder.delimiter(b'\t').flexible(true);
        }
    }
    builder
}

/// Map keyed by header (or column index), or a plain list of fields
pub(crate) fn row_value(row: &StringRecord, headers: Option<&[String]>, convert_to_map: bool) -> Value {
    if !convert_to_map {
        return Value::Array(row.iter().map(|f| Value::String(f.to_string())).collect());
    }

    let mut map = Map::new();
    for (index, field) in row.iter().enumerate() {
        let key = headers
            .and_then(|h| h.get(index))
            .cloned()
            .unwrap_or_else(|| index.to_string());
        map.insert(key, Value::String(field.to_string()));
    }
    Value::Object(map)
}

/// Parse every row of an in-memory payload with positional column names
pub(crate) fn parse_rows(payload: &[u8], mode: CsvMode, convert_to_map: bool) -> Result<Vec<Value>, ScanError> {
    let mut reader = reader_builder(mode).from_reader(payload);
    let mut rows = Vec::new();
    let mut row = StringRecord::new();
    loop {
        let row_start = reader.position().byte() as usize;
        match reader.read_record(&mut row) {
            Ok(true) => rows.push(row_value(&row, None, convert_to_map)),
            Ok(false) => return Ok(rows),
            Err(e) => return Err(ScanError::new(row_start, format!("malformed delimited record: {e}"))),
        }
    }
}

fn csv_error(path: &Path, name: &str, position: u64, context: &str, error: csv::Error) -> ProducerError {
    if error.is_io_error() {
        if let csv::ErrorKind::Io(io) = error.into_kind() {
            return ProducerError::io(path, io);
        }
        return ProducerError::io(path, std::io::Error::other("delimited reader I/O failure"));
    }
    BadSourceError::new(name, position, format!("{context}: {error}")).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn spool_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn produce_all(producer: &mut DelimitedProducer, file: &NamedTempFile) -> Vec<Value> {
        let mut batch = BatchMaker::new(100);
        let position = producer.produce(file.path(), 0, 100, &mut batch).unwrap();
        assert_eq!(position, Position::Exhausted);
        batch.into_parts().0.into_iter().map(|r| r.value).collect()
    }

    #[test]
    fn test_header_map() {
        let file = spool_file("a,b\n1,2\n3,4");
        let mut producer = DelimitedProducer::new(CsvMode::Csv, HeaderLine::WithHeader, true);
        assert_eq!(
            produce_all(&mut producer, &file),
            vec![json!({"a": "1", "b": "2"}), json!({"a": "3", "b": "4"})]
        );
    }

    #[test]
    fn test_ignore_header_synthesizes_names() {
        let file = spool_file("a,b\n1,2\n");
        let mut producer = DelimitedProducer::new(CsvMode::Csv, HeaderLine::IgnoreHeader, true);
        assert_eq!(produce_all(&mut producer, &file), vec![json!({"0": "1", "1": "2"})]);
    }

    #[test]
    fn test_list_values_without_header() {
        let file = spool_file("x\ty\n");
        let mut producer = DelimitedProducer::new(CsvMode::Tdf, HeaderLine::NoHeader, false);
        assert_eq!(produce_all(&mut producer, &file), vec![json!(["x", "y"])]);
    }

    #[test]
    fn test_resume_rereads_header() {
        let file = spool_file("a,b\n1,2\n3,4\n5,6\n");
        let mut producer = DelimitedProducer::new(CsvMode::Csv, HeaderLine::WithHeader, true);

        let mut batch = BatchMaker::new(100);
        let position = producer.produce(file.path(), 0, 1, &mut batch).unwrap();
        assert_eq!(position, Position::At(8));
        assert_eq!(batch.records()[0].id, Record::file_id(&source_name(file.path()), 4));

        let mut batch = BatchMaker::new(100);
        let position = producer.produce(file.path(), 8, 1, &mut batch).unwrap();
        assert_eq!(position, Position::At(12));
        assert_eq!(batch.records()[0].value, json!({"a": "3", "b": "4"}));
    }

    #[test]
    fn test_rfc4180_rejects_ragged_rows() {
        let file = spool_file("a,b\n1,2\n3\n");
        let mut producer = DelimitedProducer::new(CsvMode::Rfc4180, HeaderLine::NoHeader, true);
        let mut batch = BatchMaker::new(100);
        let err = producer.produce(file.path(), 0, 100, &mut batch).unwrap_err();
        assert!(matches!(err, ProducerError::BadSource(ref e) if e.position == 8));
    }

    #[test]
    fn test_extra_columns_get_positional_names() {
        let row = StringRecord::from(vec!["1", "2", "3"]);
        let headers = vec!["a".to_string()];
        assert_eq!(
            row_value(&row, Some(&headers), true),
            json!({"a": "1", "1": "2", "2": "3"})
        );
    }

    #[test]
    fn test_parse_rows() {
        let rows = parse_rows(b"1,2\n3,4\n", CsvMode::Csv, false).unwrap();
        assert_eq!(rows, vec![json!(["1", "2"]), json!(["3", "4"])]);
    }
}
