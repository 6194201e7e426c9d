//! Format producers
//!
//! A producer reads records from one spool file starting at a byte offset and
//! reports where the next read should resume. Each format module also exposes
//! the payload-level parsing that the transport record creators reuse, so a
//! file and a message with the same bytes yield the same values.
//!
//! Positions are byte offsets into the file. [`Position::Exhausted`] is
//! returned when the last consumed record ends at end-of-file; a producer that
//! stops because the batch bound was reached peeks ahead so that a file whose
//! records fit the bound exactly is still reported as exhausted.

pub mod delimited;
pub mod json;
pub mod text;
pub mod wrapped;
pub mod xml;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use spool_common::{BatchMaker, Position};

use crate::config::{DataFormat, FormatConfig};
use crate::error::{BadSourceError, ProducerError};

pub use delimited::DelimitedProducer;
pub use json::JsonProducer;
pub use text::TextProducer;
pub use wrapped::WrappedProducer;
pub use xml::XmlProducer;

/// Parses records out of a spool file.
pub trait DataProducer: Send {
    /// Add at most `max_records` records from `path`, starting at byte
    /// `offset`, to `batch`.
    ///
    /// Returns the position to resume at, or [`Position::Exhausted`] when the
    /// file has no more data. Unparseable content is a
    /// [`ProducerError::BadSource`].
    fn produce(
        &mut self,
        path: &Path,
        offset: u64,
        max_records: usize,
        batch: &mut BatchMaker,
    ) -> Result<Position, ProducerError>;
}

/// Build the producer for the configured format
pub fn build_producer(format: &FormatConfig) -> Box<dyn DataProducer> {
    match format.data_format {
        DataFormat::Text => Box::new(TextProducer::new(format.max_line_length, format.set_truncated)),
        DataFormat::Json => Box::new(JsonProducer::new(
            format.json_content,
            format.max_json_object_len,
            format.json_single_record,
        )),
        DataFormat::Delimited => Box::new(DelimitedProducer::new(
            format.csv_mode,
            format.header_line,
            format.convert_to_map,
        )),
        DataFormat::Xml => Box::new(XmlProducer::new(
            format.xml_record_element.clone(),
            format.max_xml_object_len,
        )),
        DataFormat::Wrapped => Box::new(WrappedProducer::new()),
    }
}

/// Name used for record ids and error reports
pub(crate) fn source_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Open `path` positioned at `offset`
pub(crate) fn open_at(path: &Path, offset: u64) -> Result<BufReader<File>, ProducerError> {
    let mut file = File::open(path).map_err(|e| ProducerError::io(path, e))?;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| ProducerError::io(path, e))?;
    Ok(BufReader::new(file))
}

/// A parse failure inside an in-memory payload.
///
/// `position` is relative to the start of the payload; callers rebase it onto
/// the file offset or message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ScanError {
    pub position: usize,
    pub reason: String,
}

impl ScanError {
    pub fn new(position: usize, reason: impl Into<String>) -> Self {
        Self {
            position,
            reason: reason.into(),
        }
    }

    pub fn into_bad_source(self, source_id: &str, base: u64) -> BadSourceError {
        BadSourceError::new(source_id, base + self.position as u64, self.reason)
    }
}

/// Failure of a streaming scanner: bad content, or the reader itself failed.
#[derive(Debug)]
pub(crate) enum ReadError {
    Malformed(ScanError),
    Io(io::Error),
}

impl ReadError {
    pub fn into_producer_error(self, path: &Path, source_id: &str, base: u64) -> ProducerError {
        match self {
            ReadError::Malformed(e) => e.into_bad_source(source_id, base).into(),
            ReadError::Io(e) => ProducerError::io(path, e),
        }
    }

    /// For in-memory payloads, where reads cannot fail
    pub fn into_scan_error(self) -> ScanError {
        match self {
            ReadError::Malformed(e) => e,
            ReadError::Io(e) => ScanError::new(0, format!("read failed: {e}")),
        }
    }
}

impl From<ScanError> for ReadError {
    fn from(error: ScanError) -> Self {
        ReadError::Malformed(error)
    }
}

impl From<io::Error> for ReadError {
    fn from(error: io::Error) -> Self {
        ReadError::Io(error)
    }
}

/// Reads newline-terminated lines while tracking the byte position.
pub(crate) struct LineReader<R> {
    inner: R,
    position: u64,
    buf: Vec<u8>,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R, position: u64) -> Self {
        Self {
            inner,
            position,
            buf: Vec::new(),
        }
    }

    /// Next line without its terminator, with the position it started at
    pub fn next_line(&mut self) -> io::Result<Option<(u64, &[u8])>> {
        self.buf.clear();
        let read = self.inner.read_until(b'\n', &mut self.buf)?;
        if read == 0 {
            return Ok(None);
        }
        let start = self.position;
        self.position += read as u64;
        Ok(Some((start, trim_line_ending(&self.buf))))
    }

    /// Position just past the last line returned
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn at_eof(&mut self) -> io::Result<bool> {
        Ok(self.inner.fill_buf()?.is_empty())
    }
}

pub(crate) fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_line_reader_positions() {
        let mut reader = LineReader::new(Cursor::new(b"ab\r\ncd\nef".to_vec()), 100);

        let (start, line) = reader.next_line().unwrap().unwrap();
        assert_eq!((start, line), (100, &b"ab"[..]));
        let (start, line) = reader.next_line().unwrap().unwrap();
        assert_eq!((start, line), (104, &b"cd"[..]));
        assert!(!reader.at_eof().unwrap());
        let (start, line) = reader.next_line().unwrap().unwrap();
        assert_eq!((start, line), (107, &b"ef"[..]));
        assert_eq!(reader.position(), 109);
        assert!(reader.at_eof().unwrap());
        assert!(reader.next_line().unwrap().is_none());
    }

    #[test]
    fn test_source_name_is_file_name() {
        assert_eq!(source_name(Path::new("/spool/in/a-001.log")), "a-001.log");
    }

    #[test]
    fn test_scan_error_rebases_position() {
        let err = ScanError::new(7, "broken").into_bad_source("f.json", 100);
        assert_eq!(err.position, 107);
        assert_eq!(err.source_id, "f.json");
    }

    #[test]
    fn test_read_error_kinds() {
        let path = Path::new("/spool/in/f.json");
        let err = ReadError::from(ScanError::new(3, "broken")).into_producer_error(path, "f.json", 10);
        assert!(matches!(err, ProducerError::BadSource(ref bad) if bad.position == 13));

        let io = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err = ReadError::from(io).into_producer_error(path, "f.json", 10);
        assert!(matches!(err, ProducerError::Io { .. }));
    }
}
