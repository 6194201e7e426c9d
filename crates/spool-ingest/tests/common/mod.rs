// Shared helpers for spool ingest integration tests

#![allow(dead_code)]

use std::ops::Range;
use std::path::Path;
use std::time::Duration;

use spool_common::{BatchMaker, ErrorReport, Record};
use spool_ingest::config::{DataFormat, FormatConfig, HeaderLine, PostProcessing};
use spool_ingest::producer::DataProducer;
use spool_ingest::source::SpoolSource;
use spool_ingest::spooler::{DirectorySpooler, DirectorySpoolerConfig};
use tempfile::TempDir;

/// Short poll so empty cycles return quickly
pub const POLL_TIMEOUT: Duration = Duration::from_millis(20);

/// Create a spool directory holding `files`
pub fn spool_dir(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("Failed to create spool dir");
    for (name, content) in files {
        std::fs::write(dir.path().join(name), content).expect("Failed to write spool file");
    }
    dir
}

pub fn spooler_config(dir: &Path) -> DirectorySpoolerConfig {
    DirectorySpoolerConfig {
        dir: dir.to_path_buf(),
        file_pattern: "*".to_string(),
        max_spool_files: 100,
        post_processing: PostProcessing::None,
        archive_dir: None,
        archive_retention: None,
        error_archive_dir: None,
        poll_interval: Duration::from_millis(5),
    }
}

pub fn spool_source(
    config: DirectorySpoolerConfig,
    producer: Box<dyn DataProducer>,
    batch_size: usize,
) -> SpoolSource<DirectorySpooler> {
    let mut spooler = DirectorySpooler::new(config).expect("Failed to create spooler");
    spooler.init(None).expect("Failed to init spooler");
    SpoolSource::new(spooler, producer, batch_size, POLL_TIMEOUT)
}

/// Output of one produce cycle
pub struct Cycle {
    pub records: Vec<Record>,
    pub errors: Vec<ErrorReport>,
    pub offset: Option<String>,
}

pub async fn cycle(
    source: &mut SpoolSource<DirectorySpooler>,
    offset: Option<&str>,
    max_batch_size: usize,
) -> Cycle {
    let mut batch = BatchMaker::new(max_batch_size);
    let offset = source
        .produce(offset, max_batch_size, &mut batch)
        .await
        .expect("Produce cycle failed");
    let (records, errors) = batch.into_parts();
    Cycle {
        records,
        errors,
        offset,
    }
}

/// Run cycles until one produces nothing and leaves the checkpoint unchanged
pub async fn drain(
    source: &mut SpoolSource<DirectorySpooler>,
    mut offset: Option<String>,
    max_batch_size: usize,
) -> (Vec<Record>, Vec<ErrorReport>, Option<String>) {
    let mut records = Vec::new();
    let mut errors = Vec::new();
    for _ in 0..1000 {
        let next = cycle(source, offset.as_deref(), max_batch_size).await;
        let idle = next.records.is_empty() && next.errors.is_empty() && next.offset == offset;
        records.extend(next.records);
        errors.extend(next.errors);
        offset = next.offset;
        if idle {
            return (records, errors, offset);
        }
    }
    panic!("Spool source did not settle");
}

pub fn ids(records: &[Record]) -> Vec<String> {
    records.iter().map(|r| r.id.clone()).collect()
}

pub fn lines(count: usize) -> String {
    (0..count).map(|i| format!("line {i}\n")).collect()
}

pub const ALL_FORMATS: [DataFormat; 5] = [
    DataFormat::Text,
    DataFormat::Json,
    DataFormat::Delimited,
    DataFormat::Xml,
    DataFormat::Wrapped,
];

/// Settings that read the files written by [`format_content`]
pub fn format_for(data_format: DataFormat) -> FormatConfig {
    FormatConfig {
        data_format,
        header_line: HeaderLine::NoHeader,
        xml_record_element: Some("row".to_string()),
        ..FormatConfig::default()
    }
}

/// A file holding one record per index in `indexes`
pub fn format_content(data_format: DataFormat, indexes: Range<usize>) -> String {
    let body: String = indexes
        .map(|i| match data_format {
            DataFormat::Text => format!("row {i}\n"),
            DataFormat::Json => format!("{{\"i\":{i}}}\n"),
            DataFormat::Delimited => format!("{i},x\n"),
            DataFormat::Xml => format!("  <row i=\"{i}\"><v>{i}</v></row>\n"),
            DataFormat::Wrapped => format!("{{\"id\":\"w{i}\",\"value\":{i}}}\n"),
        })
        .collect();
    match data_format {
        DataFormat::Xml => format!("<?xml version=\"1.0\"?>\n<rows>\n{body}</rows>\n"),
        _ => body,
    }
}
