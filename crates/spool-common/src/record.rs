//! Structured records and the per-cycle batch collector

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::offset::OFFSET_SEPARATOR;

/// A structured unit of output data.
///
/// This is also the wrapped-record encoding: one JSON object per line with
/// `id` and `value` keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique id derived from the source descriptor and position
    pub id: String,
    /// Scalar, map or list value
    pub value: Value,
}

impl Record {
    pub fn new(id: impl Into<String>, value: Value) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }

    /// Id for a record parsed from a file starting at `position`.
    pub fn file_id(source: &str, position: u64) -> String {
        format!("{}{}{}", source, OFFSET_SEPARATOR, position)
    }

    /// Id for the `index`-th record parsed from one transport message.
    pub fn transport_id(topic: &str, partition: i32, offset: i64, index: usize) -> String {
        format!(
            "{topic}{sep}{partition}{sep}{offset}{sep}{index}",
            sep = OFFSET_SEPARATOR
        )
    }
}

/// Pipeline-level error surfaced alongside a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    /// Offending source (file name or transport message key)
    pub source: String,
    /// Byte position or message offset the error refers to
    pub position: i64,
    pub message: String,
    pub reported_at: DateTime<Utc>,
}

/// Append-only collector for one produce cycle.
///
/// Capped at the cycle's batch bound; producers ask for [`remaining`] before
/// parsing so the cap is never exceeded.
///
/// [`remaining`]: BatchMaker::remaining
#[derive(Debug)]
pub struct BatchMaker {
    limit: usize,
    records: Vec<Record>,
    errors: Vec<ErrorReport>,
}

impl BatchMaker {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            records: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn remaining(&self) -> usize {
        self.limit.saturating_sub(self.records.len())
    }

    pub fn is_full(&self) -> bool {
        self.remaining() == 0
    }

    pub fn add(&mut self, record: Record) {
        debug_assert!(!self.is_full(), "batch bound exceeded");
        self.records.push(record);
    }

    pub fn report_error(&mut self, source: impl Into<String>, position: i64, message: impl Into<String>) {
        self.errors.push(ErrorReport {
            source: source.into(),
            position,
            message: message.into(),
            reported_at: Utc::now(),
        });
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn errors(&self) -> &[ErrorReport] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Consume the collector, returning records and error reports.
    pub fn into_parts(self) -> (Vec<Record>, Vec<ErrorReport>) {
        (self.records, self.errors)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_ids() {
        assert_eq!(Record::file_id("f-01.log", 128), "f-01.log::128");
        assert_eq!(Record::transport_id("events", 3, 42, 1), "events::3::42::1");
    }

    #[test]
    fn test_wrapped_encoding() {
        let record = Record::new("a::0", json!({"x": 1}));
        let line = serde_json::to_string(&record).unwrap();
        assert_eq!(line, r#"{"id":"a::0","value":{"x":1}}"#);
        assert_eq!(serde_json::from_str::<Record>(&line).unwrap(), record);
    }

    #[test]
    fn test_batch_maker_bound() {
        let mut batch = BatchMaker::new(2);
        assert_eq!(batch.remaining(), 2);
        batch.add(Record::new("1", json!(1)));
        batch.add(Record::new("2", json!(2)));
        assert!(batch.is_full());
        assert_eq!(batch.len(), 2);

        batch.report_error("f", 10, "bad bytes");
        let (records, errors) = batch.into_parts();
        assert_eq!(records.len(), 2);
        assert_eq!(errors[0].position, 10);
    }

    #[test]
    fn test_zero_limit_batch_is_full() {
        assert!(BatchMaker::new(0).is_full());
    }
}
