//! Message transport ingestion
//!
//! Messages from a partitioned transport are turned into records by a
//! [`RecordCreator`] and collected into bounded batches by a
//! [`TransportSource`]. The transport tracks its own positions, so no
//! checkpoint is produced here.

mod consumer;
mod creator;
mod source;

use bytes::Bytes;
use spool_common::Record;

pub use consumer::{ChannelConsumer, MessageConsumer};
pub use creator::{
    build_creator, DelimitedRecordCreator, JsonRecordCreator, RecordCreator, TextRecordCreator,
    WrappedRecordCreator, XmlRecordCreator,
};
pub use source::TransportSource;

/// A message with its transport coordinates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportMessage {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Bytes,
}

impl TransportMessage {
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64, payload: impl Into<Bytes>) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
            payload: payload.into(),
        }
    }

    /// Id of the `index`-th record parsed from this message
    pub fn record_id(&self, index: usize) -> String {
        Record::transport_id(&self.topic, self.partition, self.offset, index)
    }
}
