//! Configuration management
//!
//! Settings are read from a TOML file with four sections:
//!
//! ```toml
//! [spool]
//! spool_dir = "/var/spool/ingest"
//! file_pattern = "*.log"
//!
//! [format]
//! data_format = "text"
//!
//! [post_processing]
//! action = "archive"
//! archive_dir = "/var/spool/archive"
//!
//! [transport]
//! max_batch_size = 500
//! ```
//!
//! Every field has a default, so sections may be omitted. Call
//! [`IngestConfig::normalize`] before [`IngestConfig::validate`]: some formats
//! override the spool settings.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ============================================================================
// Spool Configuration Constants
// ============================================================================

/// Default number of records per produce cycle.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default wait for a new spool file, in seconds.
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 600;

/// Poll timeout used in preview mode, in seconds.
pub const PREVIEW_POLL_TIMEOUT_SECS: u64 = 1;

/// Default interval between directory scans, in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default maximum number of files waiting in the spool directory.
pub const DEFAULT_MAX_SPOOL_FILES: usize = 10;

/// File pattern forced for the wrapped-record format.
pub const WRAPPED_FILE_PATTERN: &str = "records-??????.json";

/// Maximum spool files forced for the wrapped-record format.
pub const WRAPPED_MAX_SPOOL_FILES: usize = 10000;

// ============================================================================
// Format Configuration Constants
// ============================================================================

/// Default maximum line length for line-text, in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 1024;

/// Default maximum JSON object length, in bytes.
pub const DEFAULT_MAX_JSON_OBJECT_LEN: usize = 4096;

/// Default maximum XML record length, in bytes.
pub const DEFAULT_MAX_XML_OBJECT_LEN: usize = 4096;

// ============================================================================
// Transport Configuration Constants
// ============================================================================

/// Default number of records per transport cycle.
pub const DEFAULT_TRANSPORT_BATCH_SIZE: usize = 1000;

/// Default wait for a transport batch to fill, in milliseconds.
pub const DEFAULT_TRANSPORT_MAX_WAIT_MS: u64 = 2000;

/// Supported data formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    /// One record per line
    #[default]
    Text,
    Json,
    /// Delimited text such as CSV or TSV
    Delimited,
    Xml,
    /// Records written by an upstream pipeline as `{id, value}` JSON lines
    Wrapped,
}

/// How JSON content is laid out in a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JsonMode {
    /// The whole source is one JSON value
    SingleObject,
    /// Concatenated JSON values
    #[default]
    MultipleObjects,
    /// One top-level array whose elements are records
    ArrayObjects,
}

/// Delimited dialect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CsvMode {
    #[default]
    Csv,
    Excel,
    Mysql,
    Rfc4180,
    /// Tab-delimited
    Tdf,
}

/// Treatment of the first line of a delimited source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HeaderLine {
    #[default]
    WithHeader,
    IgnoreHeader,
    NoHeader,
}

/// What happens to a spool file once the next one is handed out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PostProcessing {
    #[default]
    None,
    Delete,
    Archive,
}

/// Top-level ingestion configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub spool: SpoolConfig,
    pub format: FormatConfig,
    pub post_processing: PostProcessingConfig,
    pub transport: TransportConfig,
}

/// Spool directory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpoolConfig {
    pub spool_dir: PathBuf,
    /// Glob over file names (`*`, `?`)
    pub file_pattern: String,
    pub batch_size: usize,
    pub poll_timeout_secs: u64,
    pub poll_interval_ms: u64,
    pub max_spool_files: usize,
    /// Files sorting before this one are never offered
    pub initial_file: String,
    /// Destination for files that failed to parse
    pub error_archive_dir: Option<PathBuf>,
    pub preview: bool,
}

impl Default for SpoolConfig {
    fn default() -> Self {
        Self {
            spool_dir: PathBuf::new(),
            file_pattern: String::new(),
            batch_size: DEFAULT_BATCH_SIZE,
            poll_timeout_secs: DEFAULT_POLL_TIMEOUT_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_spool_files: DEFAULT_MAX_SPOOL_FILES,
            initial_file: String::new(),
            error_archive_dir: None,
            preview: false,
        }
    }
}

impl SpoolConfig {
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// `None` when no initial file is configured
    pub fn initial_file(&self) -> Option<&str> {
        Some(self.initial_file.as_str()).filter(|f| !f.is_empty())
    }
}

/// Parsing options shared by file producers and transport record creators
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatConfig {
    pub data_format: DataFormat,

    // Line-text
    pub max_line_length: usize,
    /// Add a `truncated` flag to every line-text record
    pub set_truncated: bool,

    // JSON
    pub json_content: JsonMode,
    pub max_json_object_len: usize,
    /// In array mode, emit the whole array as one list record
    pub json_single_record: bool,

    // Delimited
    pub csv_mode: CsvMode,
    pub header_line: HeaderLine,
    /// Produce maps keyed by column name instead of lists
    pub convert_to_map: bool,

    // XML
    pub xml_record_element: Option<String>,
    pub max_xml_object_len: usize,
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            data_format: DataFormat::default(),
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            set_truncated: false,
            json_content: JsonMode::default(),
            max_json_object_len: DEFAULT_MAX_JSON_OBJECT_LEN,
            json_single_record: false,
            csv_mode: CsvMode::default(),
            header_line: HeaderLine::default(),
            convert_to_map: true,
            xml_record_element: None,
            max_xml_object_len: DEFAULT_MAX_XML_OBJECT_LEN,
        }
    }
}

/// Post-processing of consumed spool files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostProcessingConfig {
    pub action: PostProcessing,
    pub archive_dir: Option<PathBuf>,
    /// Minutes archived files are kept, 0 keeps them forever
    pub retention_mins: u64,
}

impl PostProcessingConfig {
    pub fn retention(&self) -> Option<Duration> {
        (self.retention_mins > 0).then(|| Duration::from_secs(self.retention_mins * 60))
    }
}

/// Transport source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub max_batch_size: usize,
    pub max_wait_ms: u64,
    /// Collapse the records parsed from one message into one record
    pub produce_single_record: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_batch_size: DEFAULT_TRANSPORT_BATCH_SIZE,
            max_wait_ms: DEFAULT_TRANSPORT_MAX_WAIT_MS,
            produce_single_record: false,
        }
    }
}

impl TransportConfig {
    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

impl IngestConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.to_path_buf(),
            error,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Apply format-driven overrides
    pub fn normalize(mut self) -> Self {
        if self.format.data_format == DataFormat::Wrapped {
            self.spool.file_pattern = WRAPPED_FILE_PATTERN.to_string();
            self.spool.initial_file.clear();
            self.spool.max_spool_files = WRAPPED_MAX_SPOOL_FILES;
        }
        if self.spool.preview {
            self.spool.poll_timeout_secs = PREVIEW_POLL_TIMEOUT_SECS;
        }
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Spool settings
        if self.spool.spool_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("spool.spool_dir cannot be empty".into()));
        }
        if self.spool.file_pattern.trim().is_empty() {
            return Err(ConfigError::Invalid("spool.file_pattern cannot be empty".into()));
        }
        if self.spool.batch_size == 0 {
            return Err(ConfigError::Invalid("spool.batch_size must be greater than 0".into()));
        }
        if self.spool.max_spool_files == 0 {
            return Err(ConfigError::Invalid(
                "spool.max_spool_files must be greater than 0".into(),
            ));
        }
        if self.spool.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "spool.poll_interval_ms must be greater than 0".into(),
            ));
        }

        // Format settings
        if self.format.data_format == DataFormat::Xml
            && self
                .format
                .xml_record_element
                .as_deref()
                .is_none_or(|e| e.trim().is_empty())
        {
            return Err(ConfigError::Invalid(
                "format.xml_record_element is required for the xml format".into(),
            ));
        }
        if self.format.max_line_length == 0
            || self.format.max_json_object_len == 0
            || self.format.max_xml_object_len == 0
        {
            return Err(ConfigError::Invalid("format length limits must be greater than 0".into()));
        }

        // Post-processing
        if self.post_processing.action == PostProcessing::Archive
            && self.post_processing.archive_dir.is_none()
        {
            return Err(ConfigError::Invalid(
                "post_processing.archive_dir is required when action is archive".into(),
            ));
        }

        // Transport
        if self.transport.max_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "transport.max_batch_size must be greater than 0".into(),
            ));
        }

        Ok(())
    }
}
