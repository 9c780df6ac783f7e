//! Configuration for the log archival engine, per spec.md §6.
//!
//! A single `Config` value is assembled once at `init` time (defaults, then
//! environment overrides via the `LOG_ARCHIVE__` prefix, then an optional
//! config file) and validated into an immutable snapshot. Unknown keys are
//! rejected in `strict` mode and only warned about otherwise.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{EngineError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadProvider {
    Local,
    S3,
    Gcs,
    Azure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Json,
    Csv,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Json => "json",
            FileFormat::Csv => "csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            FileFormat::Json => "application/json",
            FileFormat::Csv => "text/csv",
        }
    }
}

/// Top-level configuration, mirroring spec.md §6's option groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub db_uri: String,
    pub upload_provider: UploadProvider,
    pub file_format: FileFormat,
    pub output_directory: String,
    pub daily_cron: String,
    pub hourly_cron: String,
    pub timezone: String,
    pub retry_attempts: u32,
    pub strict: bool,

    pub collections: CollectionsConfig,
    pub api_logs: ApiLogsConfig,
    pub s3: Option<S3Config>,
    pub gcs: Option<GcsConfig>,
    pub azure: Option<AzureConfig>,
    pub folder_structure: FolderStructureConfig,
    pub compression: CompressionConfig,
    pub data_masking: MaskingConfig,
    pub retention: RetentionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionsConfig {
    pub jobs_collection_name: String,
    pub logs_collection_name: String,
    pub api_logs_collection_name: String,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            jobs_collection_name: "jobs".to_string(),
            logs_collection_name: "logs".to_string(),
            api_logs_collection_name: "apilogs".to_string(),
        }
    }
}

/// Read-only consumer mode: point the engine at an existing collection
/// instead of one it owns the schema of.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingCollectionConfig {
    pub name: String,
    pub timestamp_field: String,
    #[serde(default)]
    pub required_fields: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiLogsConfig {
    /// The single configured timestamp field windowed queries key off.
    pub timestamp_field: String,
    /// Gated legacy behavior (spec.md DESIGN NOTE): OR across
    /// `timestamp`/`request_time`/`createdAt`/`created_at` when set.
    #[serde(default)]
    pub legacy_timestamp_fallback: bool,
    #[serde(default)]
    pub existing_collection: Option<ExistingCollectionConfig>,
}

impl Default for ApiLogsConfig {
    fn default() -> Self {
        Self {
            timestamp_field: "request_time".to_string(),
            legacy_timestamp_fallback: false,
            existing_collection: None,
        }
    }
}

/// Legacy fallback candidate fields, in fixed precedence order.
pub const LEGACY_TIMESTAMP_FIELDS: &[&str] =
    &["timestamp", "request_time", "createdAt", "created_at"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcsConfig {
    pub bucket: String,
    pub service_account_key_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConfig {
    pub account: String,
    pub container: String,
    pub access_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FolderType {
    Daily,
    Monthly,
    Yearly,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubFoldersConfig {
    pub enabled: bool,
    pub by_hour: bool,
    pub by_status: bool,
    #[serde(default)]
    pub custom: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamingConfig {
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FolderStructureConfig {
    pub r#type: FolderType,
    /// Literal date template (`YYYY`/`MM`/`DD`) overriding `type` when set.
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub sub_folders: SubFoldersConfig,
    #[serde(default)]
    pub naming: NamingConfig,
}

impl Default for FolderStructureConfig {
    fn default() -> Self {
        Self {
            r#type: FolderType::Daily,
            pattern: None,
            sub_folders: SubFoldersConfig::default(),
            naming: NamingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionFormat {
    Gzip,
    Brotli,
    Zip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    pub enabled: bool,
    pub format: CompressionFormat,
    pub level: u8,
    /// Minimum uncompressed byte count before compression kicks in.
    pub file_size: u64,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            format: CompressionFormat::Gzip,
            level: 6,
            file_size: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskingConfig {
    pub enabled: bool,
    pub masking_char: char,
    pub preserve_length: bool,
    pub show_last_chars: u32,
    pub mask_emails: bool,
    pub mask_ips: bool,
    pub mask_connection_strings: bool,
    #[serde(default)]
    pub custom_fields: Vec<String>,
    #[serde(default)]
    pub exempt_fields: Vec<String>,
    #[serde(default)]
    pub custom_patterns: HashMap<String, String>,
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            masking_char: '*',
            preserve_length: false,
            show_last_chars: 0,
            mask_emails: false,
            mask_ips: false,
            mask_connection_strings: false,
            custom_fields: Vec::new(),
            exempt_fields: Vec::new(),
            custom_patterns: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseRetentionConfig {
    pub api_logs_days: u32,
    pub jobs_days: u32,
    pub logs_days: u32,
    pub auto_cleanup: bool,
    pub cleanup_cron: String,
}

impl Default for DatabaseRetentionConfig {
    fn default() -> Self {
        Self {
            api_logs_days: 90,
            jobs_days: 90,
            logs_days: 30,
            auto_cleanup: true,
            cleanup_cron: "0 3 * * *".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3LifecycleConfig {
    #[serde(default)]
    pub transition_to_ia_days: Option<u32>,
    #[serde(default)]
    pub transition_to_glacier_days: Option<u32>,
    #[serde(default)]
    pub transition_to_deep_archive_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageRetentionConfig {
    pub files_days: u32,
    pub auto_cleanup: bool,
    pub cleanup_cron: String,
    #[serde(default)]
    pub s3_lifecycle: Option<S3LifecycleConfig>,
}

impl Default for StorageRetentionConfig {
    fn default() -> Self {
        Self {
            files_days: 180,
            auto_cleanup: true,
            cleanup_cron: "0 2 * * *".to_string(),
            s3_lifecycle: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionConfig {
    pub database: DatabaseRetentionConfig,
    pub storage: StorageRetentionConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub enable_console: bool,
    pub enable_file: bool,
    #[serde(default)]
    pub log_file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            enable_console: true,
            enable_file: false,
            log_file_path: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_uri: "mongodb://localhost:27017/logarchive".to_string(),
            upload_provider: UploadProvider::Local,
            file_format: FileFormat::Json,
            output_directory: "logs".to_string(),
            daily_cron: "0 0 * * *".to_string(),
            hourly_cron: "0 * * * *".to_string(),
            timezone: "UTC".to_string(),
            retry_attempts: 3,
            strict: false,
            collections: CollectionsConfig::default(),
            api_logs: ApiLogsConfig::default(),
            s3: None,
            gcs: None,
            azure: None,
            folder_structure: FolderStructureConfig::default(),
            compression: CompressionConfig::default(),
            data_masking: MaskingConfig::default(),
            retention: RetentionConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Structured validation report, per spec.md §4.9.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl Config {
    /// Load configuration: defaults, then `LOG_ARCHIVE__`-prefixed
    /// environment variables, then an optional file named by
    /// `LOG_ARCHIVE_CONFIG_FILE`.
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?);

        if let Ok(path) = std::env::var("LOG_ARCHIVE_CONFIG_FILE") {
            builder = builder.add_source(config::File::with_name(&path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("LOG_ARCHIVE")
                .separator("__")
                .try_parsing(true),
        );

        let raw = builder.build()?;
        let cfg: Config = raw.try_deserialize()?;
        Ok(cfg)
    }

    /// Collect every validation error rather than failing on the first, per
    /// spec.md §4.9 `validateConfig`.
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();

        if self.retry_attempts == 0 {
            errors.push("retryAttempts must be at least 1".to_string());
        }

        if self.timezone.parse::<chrono_tz::Tz>().is_err() {
            errors.push(format!("timezone '{}' is not a recognized IANA zone", self.timezone));
        }

        match self.upload_provider {
            UploadProvider::S3 if self.s3.is_none() => {
                errors.push("s3 configuration is required when uploadProvider=s3".to_string());
            }
            UploadProvider::Gcs if self.gcs.is_none() => {
                errors.push("gcs configuration is required when uploadProvider=gcs".to_string());
            }
            UploadProvider::Azure if self.azure.is_none() => {
                errors
                    .push("azure configuration is required when uploadProvider=azure".to_string());
            }
            _ => {}
        }

        self.data_masking.validate_into(&mut errors);

        if self.compression.level == 0 || self.compression.level > 9 {
            errors.push("compression.level must be between 1 and 9".to_string());
        }

        ValidationReport {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    /// Validate and convert to a hard error, for use at `init` time.
    pub fn validate_or_err(&self) -> Result<()> {
        let report = self.validate();
        if report.is_valid {
            Ok(())
        } else {
            Err(EngineError::Validation(report.errors.join("; ")))
        }
    }

    /// The configured IANA zone, governing hour-slot boundaries per spec.md
    /// §3. `validate()` rejects an unparsable `timezone` before `init` ever
    /// constructs the engine, so the UTC fallback here only guards a config
    /// that bypassed validation (e.g. in a unit test).
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

impl MaskingConfig {
    // `maskingChar` is typed as `char`, a single Unicode scalar value, so the
    // "multi-character maskingChar" rejection rule from spec.md §4.2 is
    // enforced by the type system rather than at validation time.
    fn validate_into(&self, errors: &mut Vec<String>) {
        for field in &self.custom_fields {
            let lname = field.to_lowercase();
            if self
                .exempt_fields
                .iter()
                .any(|e| e.to_lowercase() == lname)
            {
                tracing::warn!(field = %field, "field listed in both customFields and exemptFields; exempt wins");
            }
        }

        for (label, pattern) in &self.custom_patterns {
            if let Err(e) = regex::Regex::new(pattern) {
                errors.push(format!("customPatterns.{} is not a valid regex: {}", label, e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = Config::default();
        let report = cfg.validate();
        assert!(report.is_valid, "errors: {:?}", report.errors);
    }

    #[test]
    fn s3_provider_without_s3_config_is_invalid() {
        let mut cfg = Config::default();
        cfg.upload_provider = UploadProvider::S3;
        let report = cfg.validate();
        assert!(!report.is_valid);
        assert!(report.errors.iter().any(|e| e.contains("s3 configuration")));
    }

    #[test]
    fn zero_retry_attempts_is_invalid() {
        let mut cfg = Config::default();
        cfg.retry_attempts = 0;
        assert!(!cfg.validate().is_valid);
    }

    #[test]
    fn bad_timezone_is_invalid() {
        let mut cfg = Config::default();
        cfg.timezone = "Not/AZone".to_string();
        assert!(!cfg.validate().is_valid);
    }

    #[test]
    fn invalid_custom_pattern_regex_is_rejected() {
        let mut cfg = Config::default();
        cfg.data_masking
            .custom_patterns
            .insert("bad".to_string(), "(unclosed".to_string());
        assert!(!cfg.validate().is_valid);
    }

    // `Config::load` reads process-global environment state, so this test is
    // `#[serial]` to avoid racing other tests that set `LOG_ARCHIVE__*` vars.
    #[test]
    #[serial_test::serial]
    fn load_applies_env_override_over_defaults() {
        std::env::set_var("LOG_ARCHIVE__RETRY_ATTEMPTS", "7");
        std::env::set_var("LOG_ARCHIVE__TIMEZONE", "America/New_York");
        let cfg = Config::load().expect("env-backed config should load");
        std::env::remove_var("LOG_ARCHIVE__RETRY_ATTEMPTS");
        std::env::remove_var("LOG_ARCHIVE__TIMEZONE");
        assert_eq!(cfg.retry_attempts, 7);
        assert_eq!(cfg.timezone, "America/New_York");
    }
}
