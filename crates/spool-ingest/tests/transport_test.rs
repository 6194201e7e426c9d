// Transport source with record creators

use std::time::Duration;

use serde_json::json;
use spool_common::BatchMaker;
use spool_ingest::config::{CsvMode, DataFormat, FormatConfig, JsonMode};
use spool_ingest::transport::{
    build_creator, ChannelConsumer, DelimitedRecordCreator, RecordCreator, TransportMessage, TransportSource,
    XmlRecordCreator,
};

#[test]
fn test_json_array_single_record_policy() {
    let format = FormatConfig {
        data_format: DataFormat::Json,
        json_content: JsonMode::ArrayObjects,
        ..FormatConfig::default()
    };
    let message = TransportMessage::new("orders", 0, 5, r#"[{"a":1},{"a":2}]"#);

    let records = build_creator(&format, false).create_records(&message).unwrap();
    assert_eq!(records.len(), 2);

    let records = build_creator(&format, true).create_records(&message).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value, json!([{"a": 1}, {"a": 2}]));
    assert_eq!(records[0].id, "orders::0::5::0");
}

#[test]
fn test_delimited_lines() {
    let creator = DelimitedRecordCreator {
        mode: CsvMode::Csv,
        convert_to_map: false,
        produce_single_record: false,
    };
    let records = creator
        .create_records(&TransportMessage::new("t", 3, 9, "a,b\nc,d\n"))
        .unwrap();
    assert_eq!(records[0].value, json!(["a", "b"]));
    assert_eq!(records[1].id, "t::3::9::1");
}

#[test]
fn test_xml_records_inside_a_root_element() {
    let creator = XmlRecordCreator {
        record_element: Some("row".to_string()),
        max_record_len: 4096,
        produce_single_record: false,
    };
    let message = TransportMessage::new("xml", 1, 7, r#"<rows><row id="1"/><row id="2"><v>x</v></row></rows>"#);

    let records = creator.create_records(&message).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].value, json!({"@id": "1"}));
    assert_eq!(records[1].value, json!({"@id": "2", "v": "x"}));
    assert_eq!(records[1].id, "xml::1::7::1");
}

#[tokio::test]
async fn test_batches_across_partitions() {
    let format = FormatConfig {
        data_format: DataFormat::Text,
        ..FormatConfig::default()
    };
    let (sender, consumer) = ChannelConsumer::channel(16);
    for (partition, offset) in [(0, 1), (1, 1), (0, 2)] {
        sender
            .send(TransportMessage::new("logs", partition, offset, format!("p{partition} o{offset}")))
            .await
            .unwrap();
    }
    drop(sender);

    let mut source = TransportSource::new(consumer, build_creator(&format, false), 2, Duration::from_millis(100));

    let mut batch = BatchMaker::new(10);
    let offset = source.produce(None, 10, &mut batch).await.unwrap();
    assert_eq!(offset, None);
    assert_eq!(batch.len(), 2);

    let mut batch = BatchMaker::new(10);
    source.produce(None, 10, &mut batch).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch.records()[0].value, json!("p0 o2"));
    assert_eq!(batch.records()[0].id, "logs::0::2::0");
}
