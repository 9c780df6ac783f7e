//! Property tests for the Masking Engine's idempotence and the Path
//! Builder's injectivity across hours, per spec.md §8 properties 2 and 6.

use chrono::NaiveDate;
use log_archive_engine::config::{CompressionConfig, FolderStructureConfig, MaskingConfig};
use log_archive_engine::masking::mask_value;
use log_archive_engine::path::build_key;
use log_archive_engine::types::SlotStatus;
use proptest::prelude::*;
use std::collections::HashMap;

fn arb_masking_config() -> impl Strategy<Value = MaskingConfig> {
    (
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        0u32..8,
        prop::collection::vec("[a-z]{1,6}", 0..3),
    )
        .prop_map(|(preserve_length, mask_emails, mask_ips, mask_connection_strings, show_last_chars, custom_fields)| {
            MaskingConfig {
                enabled: true,
                masking_char: '*',
                preserve_length,
                show_last_chars,
                mask_emails,
                mask_ips,
                mask_connection_strings,
                custom_fields,
                exempt_fields: Vec::new(),
                custom_patterns: HashMap::new(),
            }
        })
}

fn arb_json_value() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i32>().prop_map(serde_json::Value::from),
        "[a-zA-Z0-9@._:/-]{0,24}".prop_map(serde_json::Value::from),
    ];
    leaf.prop_recursive(3, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(serde_json::Value::Array),
            prop::collection::hash_map("[a-z]{1,8}", inner, 0..4).prop_map(|m| {
                serde_json::Value::Object(m.into_iter().collect())
            }),
        ]
    })
}

proptest! {
    /// Masking twice must equal masking once: the redaction marker itself
    /// never re-matches a sensitive field or pattern.
    #[test]
    fn masking_is_idempotent_for_arbitrary_documents(
        config in arb_masking_config(),
        value in arb_json_value(),
    ) {
        let once = mask_value(&value, &config);
        let twice = mask_value(&once, &config);
        prop_assert_eq!(once, twice);
    }

    /// Distinct hours of the same day never collide on the object key, for
    /// any folder configuration (the path is otherwise identical).
    #[test]
    fn build_key_is_injective_across_hours(
        year in 2000i32..2100,
        month in 1u32..=12,
        day in 1u32..=28,
        h1 in 0u8..23,
        h2 in 0u8..23,
    ) {
        prop_assume!(h1 != h2);
        let date = NaiveDate::from_ymd_opt(year, month, day).unwrap();
        let folder = FolderStructureConfig::default();
        let compression = CompressionConfig { enabled: false, ..CompressionConfig::default() };
        let k1 = build_key(date, h1, SlotStatus::Success, &folder, "json", &compression);
        let k2 = build_key(date, h2, SlotStatus::Success, &folder, "json", &compression);
        prop_assert_ne!(k1, k2);
    }
}
