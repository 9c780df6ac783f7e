//! Exercises serialize -> compress -> upload (steps 5-7 of the Window
//! Processor) against the Local archive adapter, without a record store.

use log_archive_engine::archive::{ArchiveAdapter, LocalAdapter};
use log_archive_engine::compression::maybe_compress;
use log_archive_engine::config::{CompressionConfig, CompressionFormat, FileFormat};
use log_archive_engine::serialize::serialize_records;
use serde_json::json;
use std::collections::HashMap;

#[tokio::test]
async fn s1_empty_and_populated_batches_round_trip_through_local_archive() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = LocalAdapter::new(dir.path());

    let records = vec![
        json!({"method": "GET", "path": "/x", "response_status": 200, "request_time": "2025-08-25T14:10:00Z"}),
        json!({"method": "GET", "path": "/x", "response_status": 200, "request_time": "2025-08-25T14:30:00Z"}),
        json!({"method": "GET", "path": "/x", "response_status": 200, "request_time": "2025-08-25T14:59:00Z"}),
    ];
    let serialized = serialize_records(&records, FileFormat::Json).unwrap();
    let location = adapter
        .put("2025/08/25/api-logs_2025-08-25_14-15.json", serialized, "application/json", HashMap::new())
        .await
        .unwrap();

    let bytes = adapter.get("2025/08/25/api-logs_2025-08-25_14-15.json").await.unwrap();
    let parsed: Vec<serde_json::Value> = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(parsed.len(), 3);
    assert!(location.ends_with("14-15.json"));
}

#[tokio::test]
async fn s2_empty_window_produces_empty_array_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = LocalAdapter::new(dir.path());

    let serialized = serialize_records(&[], FileFormat::Json).unwrap();
    adapter
        .put("2025/08/25/api-logs_2025-08-25_15-16.json", serialized, "application/json", HashMap::new())
        .await
        .unwrap();

    let bytes = adapter.get("2025/08/25/api-logs_2025-08-25_15-16.json").await.unwrap();
    assert_eq!(bytes, b"[]");
}

#[tokio::test]
async fn compression_round_trips_through_upload_and_download() {
    let dir = tempfile::tempdir().unwrap();
    let adapter = LocalAdapter::new(dir.path());

    let records: Vec<_> = (0..50).map(|i| json!({"i": i, "payload": "x".repeat(40)})).collect();
    let serialized = serialize_records(&records, FileFormat::Json).unwrap();
    let compression = CompressionConfig {
        enabled: true,
        format: CompressionFormat::Gzip,
        level: 6,
        file_size: 0,
    };
    let compressed = maybe_compress(&serialized, &compression).unwrap();
    assert_ne!(compressed, serialized);

    adapter
        .put("2025/08/25/api-logs_2025-08-25_16-17.json.gz", compressed, "application/octet-stream", HashMap::new())
        .await
        .unwrap();

    let downloaded = adapter.get("2025/08/25/api-logs_2025-08-25_16-17.json.gz").await.unwrap();
    let mut decoder = flate2::read::GzDecoder::new(&downloaded[..]);
    let mut decompressed = Vec::new();
    std::io::Read::read_to_end(&mut decoder, &mut decompressed).unwrap();
    assert_eq!(decompressed, serialized);
}
