//! Archive Adapter: a uniform put/list/get/delete/setLifecycle surface over
//! {Local, S3, GCS, Azure}, per spec.md §4.1.
//!
//! Composition, not inheritance: `Adapter` is a trait object selected once
//! at `init` from `UploadProvider`; every caller downstream only ever talks
//! to `dyn ArchiveAdapter`.

mod azure;
mod gcs;
mod local;
mod s3;

pub use azure::AzureAdapter;
pub use gcs::GcsAdapter;
pub use local::LocalAdapter;
pub use s3::S3Adapter;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::config::{AzureConfig, Config, GcsConfig, S3Config, UploadProvider};
use crate::error::Result;

/// One object observed by `list`.
#[derive(Debug, Clone)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: DateTime<Utc>,
}

/// Declarative storage-class transition / expiration policy, forwarded to
/// providers that support it (S3); others no-op.
#[derive(Debug, Clone, Default)]
pub struct LifecycleRules {
    pub transition_to_ia_days: Option<u32>,
    pub transition_to_glacier_days: Option<u32>,
    pub transition_to_deep_archive_days: Option<u32>,
    pub expiration_days: Option<u32>,
}

/// Per-key outcome of a bulk `delete`.
#[derive(Debug, Clone)]
pub struct DeleteOutcome {
    pub key: String,
    pub deleted: bool,
    pub error: Option<String>,
}

#[async_trait]
pub trait ArchiveAdapter: Send + Sync {
    /// Upload `bytes` under `key`, returning the backend's canonical
    /// location (path or URL). Last-write-wins on an existing key.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String>;

    /// Lazily list objects under `prefix`, optionally only those modified
    /// since `since`.
    async fn list(&self, prefix: &str, since: Option<DateTime<Utc>>) -> Result<Vec<ObjectSummary>>;

    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Bulk delete; never fails the whole call for a single missing key.
    async fn delete(&self, keys: &[String]) -> Result<Vec<DeleteOutcome>>;

    /// Push a declarative lifecycle policy. Backends without native support
    /// return `Ok(())` (no-op); the in-process retention sweep remains the
    /// enforcement path for them.
    async fn set_lifecycle(&self, rules: &LifecycleRules) -> Result<()> {
        let _ = rules;
        Ok(())
    }
}

/// Build the adapter selected by `config.upload_provider`.
pub async fn build_adapter(config: &Config) -> Result<Box<dyn ArchiveAdapter>> {
    match config.upload_provider {
        UploadProvider::Local => Ok(Box::new(LocalAdapter::new(&config.output_directory))),
        UploadProvider::S3 => {
            let s3_config: &S3Config = config
                .s3
                .as_ref()
                .ok_or_else(|| crate::error::EngineError::Validation("s3 config missing".into()))?;
            Ok(Box::new(S3Adapter::new(s3_config).await?))
        }
        UploadProvider::Gcs => {
            let gcs_config: &GcsConfig = config
                .gcs
                .as_ref()
                .ok_or_else(|| crate::error::EngineError::Validation("gcs config missing".into()))?;
            Ok(Box::new(GcsAdapter::new(gcs_config).await?))
        }
        UploadProvider::Azure => {
            let azure_config: &AzureConfig = config
                .azure
                .as_ref()
                .ok_or_else(|| crate::error::EngineError::Validation("azure config missing".into()))?;
            Ok(Box::new(AzureAdapter::new(azure_config).await?))
        }
    }
}
