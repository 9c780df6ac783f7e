//! Artifact serializers: JSON (top-level array) and CSV (stable header),
//! per spec.md §6.

use serde_json::Value;
use std::collections::BTreeSet;

use crate::config::FileFormat;
use crate::error::Result;

pub fn serialize_records(records: &[Value], format: FileFormat) -> Result<Vec<u8>> {
    match format {
        FileFormat::Json => serialize_json(records),
        FileFormat::Csv => serialize_csv(records),
    }
}

fn serialize_json(records: &[Value]) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(records)?)
}

/// Header row is the union of all scalar keys across the batch, in stable
/// (lexicographic) order; nested object/array fields are stringified.
fn serialize_csv(records: &[Value]) -> Result<Vec<u8>> {
    let mut keys: BTreeSet<String> = BTreeSet::new();
    for record in records {
        if let Value::Object(map) = record {
            keys.extend(map.keys().cloned());
        }
    }
    let headers: Vec<String> = keys.into_iter().collect();

    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(&headers)?;

    for record in records {
        let empty = serde_json::Map::new();
        let map = record.as_object().unwrap_or(&empty);
        let row: Vec<String> = headers
            .iter()
            .map(|key| match map.get(key) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string(),
            })
            .collect();
        writer.write_record(&row)?;
    }

    Ok(writer.into_inner().map_err(|e| crate::error::EngineError::serialization(e.to_string()))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_serializes_as_top_level_array() {
        let records = vec![json!({"a": 1}), json!({"a": 2})];
        let bytes = serialize_records(&records, FileFormat::Json).unwrap();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(parsed.is_array());
        assert_eq!(parsed.as_array().unwrap().len(), 2);
    }

    #[test]
    fn json_empty_batch_is_empty_array() {
        let bytes = serialize_records(&[], FileFormat::Json).unwrap();
        let parsed: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed, json!([]));
    }

    #[test]
    fn csv_header_is_union_of_keys_stable_sorted() {
        let records = vec![json!({"b": 1, "a": "x"}), json!({"a": "y", "c": 2})];
        let bytes = serialize_records(&records, FileFormat::Csv).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let first_line = text.lines().next().unwrap();
        assert_eq!(first_line, "a,b,c");
    }

    #[test]
    fn csv_nested_fields_are_stringified() {
        let records = vec![json!({"nested": {"x": 1}})];
        let bytes = serialize_records(&records, FileFormat::Csv).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.contains("\"x\":1") || text.contains("x"));
    }
}
