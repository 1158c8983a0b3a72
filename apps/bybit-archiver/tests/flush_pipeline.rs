//! Flush Pipeline Integration Tests
//!
//! Exercises the drain-write cycle end to end: records buffered for a key
//! are drained once, land in a single date-named Parquet file, and read
//! back identical.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;
use std::fs::File;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use bybit_archiver::{
    BatchWriter, FlushSchedule, FlushScheduler, InstrumentCatalog, RecordBuffer,
    RetentionEnforcer, StreamKey,
};

fn catalog(instrument: &str, category: &str) -> Arc<InstrumentCatalog> {
    let mut instruments = BTreeMap::new();
    instruments.insert(instrument.to_string(), vec![category.to_string()]);
    Arc::new(InstrumentCatalog::new(instruments).unwrap())
}

fn scheduler(
    buffer: Arc<RecordBuffer>,
    root: &std::path::Path,
    quota_bytes: u64,
) -> FlushScheduler {
    let schedule = FlushSchedule::new(
        NaiveTime::parse_from_str("00:00", "%H:%M").unwrap(),
        "UTC".parse::<Tz>().unwrap(),
    );
    FlushScheduler::new(
        schedule,
        buffer,
        BatchWriter::new(root),
        RetentionEnforcer::new(root, quota_bytes),
        CancellationToken::new(),
    )
}

/// Read every row of a Parquet file back as JSON values.
fn read_rows(path: &std::path::Path) -> Vec<Value> {
    let file = File::open(path).unwrap();
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .unwrap()
        .build()
        .unwrap();
    let batches: Vec<_> = reader.collect::<Result<Vec<_>, _>>().unwrap();

    let mut buf = Vec::new();
    {
        let mut writer = arrow::json::LineDelimitedWriter::new(&mut buf);
        writer
            .write_batches(&batches.iter().collect::<Vec<_>>())
            .unwrap();
        writer.finish().unwrap();
    }

    String::from_utf8(buf)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn three_buffered_trades_flush_to_one_dated_file() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog("BTCUSD", "trade");
    let buffer = Arc::new(RecordBuffer::new(&catalog));
    let key = StreamKey::new("BTCUSD", "trade");

    let records = vec![
        json!({"topic": "trade.BTCUSD", "price": "42000.5", "qty": 1, "side": "Buy"}),
        json!({"topic": "trade.BTCUSD", "price": "42001.0", "qty": 2, "side": "Sell"}),
        json!({"topic": "trade.BTCUSD", "price": "42002.5", "qty": 3, "side": "Buy"}),
    ];
    for record in &records {
        buffer.append(&key, record.clone()).unwrap();
    }

    let scheduler = scheduler(Arc::clone(&buffer), dir.path(), u64::MAX);
    let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let summary = scheduler.flush_once(date);

    assert_eq!(summary.batches_written, 1);
    assert_eq!(summary.records_written, 3);
    assert_eq!(summary.batches_failed, 0);

    // The buffer for that key is empty immediately after.
    assert_eq!(buffer.len(&key), Some(0));

    // Exactly one file, at the expected path.
    let path = dir.path().join("BTCUSD/trade/2024-01-02.parquet");
    assert!(path.exists());

    let rows = read_rows(&path);
    assert_eq!(rows, records, "round-trip preserves fields and values");
}

#[test]
fn empty_batches_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog("BTCUSD", "trade");
    let buffer = Arc::new(RecordBuffer::new(&catalog));

    let scheduler = scheduler(buffer, dir.path(), u64::MAX);
    let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let summary = scheduler.flush_once(date);

    assert_eq!(summary.batches_written, 0);
    assert_eq!(summary.batches_failed, 0);
    assert!(!dir.path().join("BTCUSD").exists());
}

#[test]
fn second_flush_writes_only_new_records() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog("BTCUSD", "trade");
    let buffer = Arc::new(RecordBuffer::new(&catalog));
    let key = StreamKey::new("BTCUSD", "trade");

    let scheduler = scheduler(Arc::clone(&buffer), dir.path(), u64::MAX);

    buffer.append(&key, json!({"seq": 1})).unwrap();
    buffer.append(&key, json!({"seq": 2})).unwrap();
    let first = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    scheduler.flush_once(first);

    buffer.append(&key, json!({"seq": 3})).unwrap();
    let second = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
    scheduler.flush_once(second);

    let rows = read_rows(&dir.path().join("BTCUSD/trade/2024-01-03.parquet"));
    assert_eq!(rows, vec![json!({"seq": 3})]);
}

#[test]
fn failed_batch_does_not_stop_other_keys() {
    let dir = tempfile::tempdir().unwrap();

    let mut instruments = BTreeMap::new();
    instruments.insert("BTCUSD".to_string(), vec!["trade".to_string()]);
    instruments.insert("ETHUSD".to_string(), vec!["trade".to_string()]);
    let catalog = Arc::new(InstrumentCatalog::new(instruments).unwrap());
    let buffer = Arc::new(RecordBuffer::new(&catalog));

    let good = StreamKey::new("BTCUSD", "trade");
    let bad = StreamKey::new("ETHUSD", "trade");
    buffer.append(&good, json!({"seq": 1})).unwrap();
    // A non-object record makes this batch unserializable.
    buffer.append(&bad, json!(["not", "an", "object"])).unwrap();

    let scheduler = scheduler(buffer, dir.path(), u64::MAX);
    let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let summary = scheduler.flush_once(date);

    assert_eq!(summary.batches_written, 1);
    assert_eq!(summary.batches_failed, 1);
    assert!(dir.path().join("BTCUSD/trade/2024-01-02.parquet").exists());
    assert!(!dir.path().join("ETHUSD/trade/2024-01-02.parquet").exists());
}

#[test]
fn flush_runs_retention_after_writes() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = catalog("BTCUSD", "trade");
    let buffer = Arc::new(RecordBuffer::new(&catalog));
    let key = StreamKey::new("BTCUSD", "trade");
    buffer.append(&key, json!({"seq": 1})).unwrap();

    // Quota of one byte: the freshly written file is the only (newest) file,
    // so it survives even though it alone exceeds the quota.
    let scheduler = scheduler(buffer, dir.path(), 1);
    let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    let summary = scheduler.flush_once(date);

    assert_eq!(summary.batches_written, 1);
    assert!(summary.retention.total_bytes_before > 1);
    assert_eq!(summary.retention.deleted_files, 0);
    assert!(dir.path().join("BTCUSD/trade/2024-01-02.parquet").exists());
}
