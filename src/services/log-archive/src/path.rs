//! Path Builder: a pure, deterministic function mapping
//! `(date, hour, status, config)` to a folder/file key, per spec.md §4.3.
//!
//! No I/O happens here; the archive adapter takes the resulting path as-is.

use chrono::NaiveDate;

use crate::config::{CompressionConfig, CompressionFormat, FolderStructureConfig, FolderType};
use crate::types::{hour_range_string, SlotStatus};

/// Build the folder portion of a key, e.g. `2025/08/25` for `Daily`. Per
/// spec.md §4.3, `naming.prefix`/`naming.suffix` wrap the date token with
/// `_` separators: `{prefix?}_{date-token}{_suffix?}`.
pub fn build_folder(date: NaiveDate, folder: &FolderStructureConfig, _status: SlotStatus) -> String {
    let date_token = if let Some(pattern) = &folder.pattern {
        apply_date_pattern(pattern, date)
    } else {
        match folder.r#type {
            FolderType::Daily => format!(
                "{:04}/{:02}/{:02}",
                date.format("%Y").to_string().parse::<i32>().unwrap_or(0),
                date.format("%m").to_string().parse::<u32>().unwrap_or(0),
                date.format("%d").to_string().parse::<u32>().unwrap_or(0)
            ),
            FolderType::Monthly => format!("{}", date.format("%Y/%m")),
            FolderType::Yearly => format!("{}", date.format("%Y")),
        }
    };

    let mut parts = Vec::new();
    if let Some(prefix) = &folder.naming.prefix {
        parts.push(prefix.clone());
    }
    parts.push(date_token);
    if let Some(suffix) = &folder.naming.suffix {
        parts.push(suffix.clone());
    }
    parts.join("_")
}

fn apply_date_pattern(pattern: &str, date: NaiveDate) -> String {
    pattern
        .replace("YYYY", &date.format("%Y").to_string())
        .replace("MM", &date.format("%m").to_string())
        .replace("DD", &date.format("%d").to_string())
}

/// Build the ordered sub-folder segments: `hour-HH-HH`, then `{status}`,
/// then any configured custom segments, in that fixed precedence order.
pub fn build_sub_folders(folder: &FolderStructureConfig, hour: u8, status: SlotStatus) -> Vec<String> {
    let mut segments = Vec::new();
    if !folder.sub_folders.enabled {
        return segments;
    }
    if folder.sub_folders.by_hour {
        segments.push(format!("hour-{}", hour_range_string(hour)));
    }
    if folder.sub_folders.by_status {
        segments.push(format!("{}", status));
    }
    segments.extend(folder.sub_folders.custom.iter().cloned());
    segments
}

/// Build the file name: always the literal `api-logs_{date}_{HH-HH}.{ext}`
/// per spec.md §4.3 — `naming.prefix`/`naming.suffix` apply to the folder's
/// date token, not to the file name.
pub fn build_file_name(date: NaiveDate, hour: u8, extension: &str, compression: &CompressionConfig) -> String {
    let mut name = format!("api-logs_{}_{}.{}", date.format("%Y-%m-%d"), hour_range_string(hour), extension);
    if compression.enabled {
        name.push('.');
        name.push_str(compression_extension(compression.format));
    }
    name
}

pub fn compression_extension(format: CompressionFormat) -> &'static str {
    match format {
        CompressionFormat::Gzip => "gz",
        CompressionFormat::Brotli => "br",
        CompressionFormat::Zip => "zip",
    }
}

/// Compose the full object key: folder / sub-folders / file name.
pub fn build_key(
    date: NaiveDate,
    hour: u8,
    status: SlotStatus,
    folder: &FolderStructureConfig,
    extension: &str,
    compression: &CompressionConfig,
) -> String {
    let mut segments = vec![build_folder(date, folder, status)];
    segments.extend(build_sub_folders(folder, hour, status));
    let mut key = segments.join("/");
    key.push('/');
    key.push_str(&build_file_name(date, hour, extension, compression));
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{NamingConfig, SubFoldersConfig};

    fn folder(r#type: FolderType) -> FolderStructureConfig {
        FolderStructureConfig {
            r#type,
            pattern: None,
            sub_folders: SubFoldersConfig::default(),
            naming: NamingConfig::default(),
        }
    }

    #[test]
    fn daily_folder_is_year_month_day() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 25).unwrap();
        assert_eq!(build_folder(date, &folder(FolderType::Daily), SlotStatus::Success), "2025/08/25");
    }

    #[test]
    fn monthly_and_yearly_drop_lower_precision() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 25).unwrap();
        assert_eq!(build_folder(date, &folder(FolderType::Monthly), SlotStatus::Success), "2025/08");
        assert_eq!(build_folder(date, &folder(FolderType::Yearly), SlotStatus::Success), "2025");
    }

    #[test]
    fn custom_pattern_overrides_type() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 25).unwrap();
        let mut f = folder(FolderType::Daily);
        f.pattern = Some("YYYY-MM-DD".to_string());
        assert_eq!(build_folder(date, &f, SlotStatus::Success), "2025-08-25");
    }

    #[test]
    fn sub_folders_ordered_hour_then_status_then_custom() {
        let mut f = folder(FolderType::Daily);
        f.sub_folders = SubFoldersConfig {
            enabled: true,
            by_hour: true,
            by_status: true,
            custom: vec!["team-a".to_string()],
        };
        let segs = build_sub_folders(&f, 14, SlotStatus::Success);
        assert_eq!(segs, vec!["hour-14-15".to_string(), "success".to_string(), "team-a".to_string()]);
    }

    #[test]
    fn file_name_includes_compression_extension() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 25).unwrap();
        let c = CompressionConfig {
            enabled: true,
            format: CompressionFormat::Gzip,
            level: 6,
            file_size: 0,
        };
        let name = build_file_name(date, 14, "json", &c);
        assert_eq!(name, "api-logs_2025-08-25_14-15.json.gz");
    }

    #[test]
    fn file_name_ignores_naming_prefix_and_suffix() {
        // naming.prefix/suffix wrap the folder's date token, not the file name.
        let date = NaiveDate::from_ymd_opt(2025, 8, 25).unwrap();
        let c = CompressionConfig { enabled: false, ..CompressionConfig::default() };
        assert_eq!(build_file_name(date, 14, "json", &c), "api-logs_2025-08-25_14-15.json");
    }

    #[test]
    fn folder_naming_prefix_and_suffix_wrap_the_date_token() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 25).unwrap();
        let mut f = folder(FolderType::Yearly);
        f.naming = NamingConfig {
            prefix: Some("team-a".to_string()),
            suffix: Some("archive".to_string()),
        };
        assert_eq!(build_folder(date, &f, SlotStatus::Success), "team-a_2025_archive");
    }

    #[test]
    fn build_key_is_deterministic_and_injective_across_hours() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 25).unwrap();
        let f = folder(FolderType::Daily);
        let c = CompressionConfig {
            enabled: false,
            format: CompressionFormat::Gzip,
            level: 6,
            file_size: 0,
        };
        let k1 = build_key(date, 1, SlotStatus::Success, &f, "json", &c);
        let k2 = build_key(date, 2, SlotStatus::Success, &f, "json", &c);
        assert_ne!(k1, k2);
        // Same inputs, same output.
        assert_eq!(k1, build_key(date, 1, SlotStatus::Success, &f, "json", &c));
    }
}
