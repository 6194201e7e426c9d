// End-to-end run loop: JSON lines output and checkpoint commits

mod common;

use common::*;
use serde_json::json;
use spool_common::Record;
use spool_ingest::runner::{run_spool, RunOptions};
use spool_ingest::{FileCheckpointStore, IngestConfig};
use tokio_util::sync::CancellationToken;

fn config_for(dir: &std::path::Path) -> IngestConfig {
    let mut config = IngestConfig::default();
    config.spool.spool_dir = dir.to_path_buf();
    config.spool.file_pattern = "*.log".to_string();
    config.spool.poll_timeout_secs = 1;
    config.spool.poll_interval_ms = 10;
    config.normalize()
}

fn read_output(output: &[u8]) -> Vec<Record> {
    serde_jsonlines::JsonLinesReader::new(output)
        .read_all::<Record>()
        .collect::<Result<_, _>>()
        .expect("Output is not valid JSON lines")
}

#[tokio::test]
async fn test_single_cycle_writes_records_and_commits() {
    let dir = spool_dir(&[("a.log", "alpha\nbeta\n")]);
    let state = tempfile::TempDir::new().unwrap();
    let store = FileCheckpointStore::new(state.path().join("offset"));
    let config = config_for(dir.path());
    config.validate().unwrap();

    let mut output = Vec::new();
    let options = RunOptions {
        max_batch_size: 10,
        once: true,
    };
    let stats = run_spool(&config, &store, &mut output, options, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(stats.records, 2);
    let records = read_output(&output);
    assert_eq!(records[0], Record::new("a.log::0", json!({"text": "alpha"})));
    assert_eq!(records[1].id, "a.log::6");
    assert_eq!(store.load().unwrap().as_deref(), Some("a.log::-1"));
}

#[tokio::test]
async fn test_restart_continues_from_checkpoint() {
    let dir = spool_dir(&[("a.log", "1\n2\n3\n"), ("b.log", "4\n")]);
    let state = tempfile::TempDir::new().unwrap();
    let store = FileCheckpointStore::new(state.path().join("offset"));
    let config = config_for(dir.path());

    let mut output = Vec::new();
    for _ in 0..3 {
        let options = RunOptions {
            max_batch_size: 2,
            once: true,
        };
        run_spool(&config, &store, &mut output, options, CancellationToken::new())
            .await
            .unwrap();
    }

    let values: Vec<_> = read_output(&output).into_iter().map(|r| r.value["text"].clone()).collect();
    assert_eq!(values, vec![json!("1"), json!("2"), json!("3"), json!("4")]);
    assert_eq!(store.load().unwrap().as_deref(), Some("b.log::-1"));
}

#[tokio::test]
async fn test_cancelled_run_stops_after_cycle() {
    let dir = spool_dir(&[("a.log", "x\n")]);
    let state = tempfile::TempDir::new().unwrap();
    let store = FileCheckpointStore::new(state.path().join("offset"));
    let config = config_for(dir.path());

    let shutdown = CancellationToken::new();
    shutdown.cancel();
    let options = RunOptions {
        max_batch_size: 10,
        once: false,
    };
    let stats = run_spool(&config, &store, std::io::sink(), options, shutdown)
        .await
        .unwrap();
    assert_eq!(stats.cycles, 1);
    assert_eq!(stats.records, 1);
}
