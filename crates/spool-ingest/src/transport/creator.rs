//! Record creators: transport payload to records
//!
//! Creators reuse the payload parsers of the file producers so that the same
//! bytes yield the same values whichever way they arrive.

use serde_json::Value;
use spool_common::Record;

use super::TransportMessage;
use crate::config::{CsvMode, DataFormat, FormatConfig, JsonMode};
use crate::error::CreatorError;
use crate::producer::{delimited, json, text, wrapped, xml, ScanError};

/// Turns one transport message into zero or more records
pub trait RecordCreator: Send + Sync {
    fn create_records(&self, message: &TransportMessage) -> Result<Vec<Record>, CreatorError>;
}

/// Build the creator for the configured format
pub fn build_creator(format: &FormatConfig, produce_single_record: bool) -> Box<dyn RecordCreator> {
    match format.data_format {
        DataFormat::Text => Box::new(TextRecordCreator {
            max_line_length: format.max_line_length,
        }),
        DataFormat::Json => Box::new(JsonRecordCreator {
            mode: format.json_content,
            max_object_len: format.max_json_object_len,
            produce_single_record,
        }),
        DataFormat::Delimited => Box::new(DelimitedRecordCreator {
            mode: format.csv_mode,
            convert_to_map: format.convert_to_map,
            produce_single_record,
        }),
        DataFormat::Xml => Box::new(XmlRecordCreator {
            record_element: format.xml_record_element.clone(),
            max_record_len: format.max_xml_object_len,
            produce_single_record,
        }),
        DataFormat::Wrapped => Box::new(WrappedRecordCreator),
    }
}

/// One string record per message
#[derive(Debug, Clone)]
pub struct TextRecordCreator {
    pub max_line_length: usize,
}

impl RecordCreator for TextRecordCreator {
    fn create_records(&self, message: &TransportMessage) -> Result<Vec<Record>, CreatorError> {
        let (text, _) = text::truncate_text(&message.payload, self.max_line_length);
        Ok(vec![Record::new(message.record_id(0), Value::String(text))])
    }
}

#[derive(Debug, Clone)]
pub struct JsonRecordCreator {
    pub mode: JsonMode,
    pub max_object_len: usize,
    pub produce_single_record: bool,
}

impl RecordCreator for JsonRecordCreator {
    fn create_records(&self, message: &TransportMessage) -> Result<Vec<Record>, CreatorError> {
        let values = json::parse_values(&message.payload, self.mode, self.max_object_len)
            .map_err(|e| creator_error(message, e))?;
        Ok(into_records(message, values, self.produce_single_record))
    }
}

/// One record per line, with positional column names
#[derive(Debug, Clone)]
pub struct DelimitedRecordCreator {
    pub mode: CsvMode,
    pub convert_to_map: bool,
    pub produce_single_record: bool,
}

impl RecordCreator for DelimitedRecordCreator {
    fn create_records(&self, message: &TransportMessage) -> Result<Vec<Record>, CreatorError> {
        let rows = delimited::parse_rows(&message.payload, self.mode, self.convert_to_map)
            .map_err(|e| creator_error(message, e))?;
        Ok(into_records(message, rows, self.produce_single_record))
    }
}

/// The whole document, or each delimiter element, as records
#[derive(Debug, Clone)]
pub struct XmlRecordCreator {
    pub record_element: Option<String>,
    pub max_record_len: usize,
    pub produce_single_record: bool,
}

impl RecordCreator for XmlRecordCreator {
    fn create_records(&self, message: &TransportMessage) -> Result<Vec<Record>, CreatorError> {
        let values = xml::parse_records(&message.payload, self.record_element.as_deref(), self.max_record_len)
            .map_err(|e| creator_error(message, e))?;
        Ok(into_records(message, values, self.produce_single_record))
    }
}

/// Wrapped records keep their stored ids
#[derive(Debug, Clone, Default)]
pub struct WrappedRecordCreator;

impl RecordCreator for WrappedRecordCreator {
    fn create_records(&self, message: &TransportMessage) -> Result<Vec<Record>, CreatorError> {
        wrapped::parse_wrapped(&message.payload).map_err(|e| creator_error(message, e))
    }
}

/// Apply the single-record policy: several items collapse into one list
/// record, a lone item stays as it is.
fn into_records(message: &TransportMessage, mut values: Vec<Value>, single: bool) -> Vec<Record> {
    if single && values.len() > 1 {
        return vec![Record::new(message.record_id(0), Value::Array(values))];
    }
    if single && values.len() == 1 {
        let value = values.remove(0);
        return vec![Record::new(message.record_id(0), value)];
    }
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| Record::new(message.record_id(index), value))
        .collect()
}

fn creator_error(message: &TransportMessage, error: ScanError) -> CreatorError {
    CreatorError {
        topic: message.topic.clone(),
        partition: message.partition,
        offset: message.offset,
        reason: format!("{} (byte {})", error.reason, error.position),
    }
}
