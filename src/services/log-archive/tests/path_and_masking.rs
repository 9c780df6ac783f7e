//! Cross-module tests for Path Builder + Masking Engine composition,
//! exercised the way the Window Processor composes them.

use chrono::NaiveDate;
use log_archive_engine::config::{CompressionConfig, CompressionFormat, FolderStructureConfig, MaskingConfig};
use log_archive_engine::path::build_key;
use log_archive_engine::types::SlotStatus;
use serde_json::json;

#[test]
fn s1_happy_path_key_matches_expected_layout() {
    let date = NaiveDate::from_ymd_opt(2025, 8, 25).unwrap();
    let folder = FolderStructureConfig::default();
    let compression = CompressionConfig { enabled: false, ..CompressionConfig::default() };
    let key = build_key(date, 14, SlotStatus::Success, &folder, "json", &compression);
    assert_eq!(key, "2025/08/25/api-logs_2025-08-25_14-15.json");
}

#[test]
fn s3_masking_redacts_configured_field_preserving_others() {
    let config = MaskingConfig {
        enabled: true,
        masking_char: '*',
        preserve_length: true,
        show_last_chars: 0,
        mask_emails: false,
        mask_ips: false,
        mask_connection_strings: false,
        custom_fields: vec!["password".to_string()],
        exempt_fields: Vec::new(),
        custom_patterns: Default::default(),
    };
    let record = json!({"user": "a", "password": "abcdef"});
    let masked = log_archive_engine::masking::mask_value(&record, &config);
    assert_eq!(masked["user"], "a");
    assert_eq!(masked["password"], "******");
}
