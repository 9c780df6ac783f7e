//! Retention Engine: two independently scheduled sweepers (record store TTL,
//! archive TTL), dry-run support, usage statistics, per spec.md §4.8.

use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::archive::{ArchiveAdapter, LifecycleRules};
use crate::config::Config;
use crate::error::Result;
use crate::store::RecordStore;

#[derive(Debug, Clone, Serialize, Default)]
pub struct DbCollectionStats {
    pub total: u64,
    pub over_age: u64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct StorageStats {
    pub files: u64,
    pub size: u64,
    pub over_age_files: u64,
    pub over_age_size: u64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct RetentionStats {
    pub db: HashMap<String, DbCollectionStats>,
    pub storage: StorageStats,
}

#[derive(Debug, Clone, Default)]
pub struct ManualCleanupOptions {
    pub db: bool,
    pub storage: bool,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct CleanupCounts {
    pub jobs_deleted: u64,
    pub logs_deleted: u64,
    pub api_records_deleted: u64,
    pub archive_keys_deleted: u64,
}

pub struct RetentionEngine {
    config: Arc<Config>,
    store: Arc<dyn RecordStore>,
    archive: Arc<dyn ArchiveAdapter>,
}

impl RetentionEngine {
    pub fn new(config: Arc<Config>, store: Arc<dyn RecordStore>, archive: Arc<dyn ArchiveAdapter>) -> Self {
        Self { config, store, archive }
    }

    pub async fn stats(&self) -> Result<RetentionStats> {
        let now = Utc::now();
        let jobs_cutoff = (now - ChronoDuration::days(self.config.retention.database.jobs_days as i64)).date_naive();

        let total_jobs = self.store.count_jobs().await?;
        let over_age_jobs = self.store.delete_jobs_older_than(jobs_cutoff, true).await?;

        let total_records = self.store.count_api_records().await?;
        let api_logs_cutoff = now - ChronoDuration::days(self.config.retention.database.api_logs_days as i64);
        let over_age_records = self.store.delete_records_older_than(api_logs_cutoff, true).await?;

        let mut db = HashMap::new();
        db.insert(
            self.config.collections.jobs_collection_name.clone(),
            DbCollectionStats { total: total_jobs, over_age: over_age_jobs },
        );
        db.insert(
            self.config.collections.api_logs_collection_name.clone(),
            DbCollectionStats { total: total_records, over_age: over_age_records },
        );

        let storage_cutoff = now - ChronoDuration::days(self.config.retention.storage.files_days as i64);
        let objects = self.archive.list(&self.config.output_directory, None).await?;
        let over_age: Vec<_> = objects.iter().filter(|o| o.last_modified < storage_cutoff).collect();

        let storage = StorageStats {
            files: objects.len() as u64,
            size: objects.iter().map(|o| o.size).sum(),
            over_age_files: over_age.len() as u64,
            over_age_size: over_age.iter().map(|o| o.size).sum(),
        };

        Ok(RetentionStats { db, storage })
    }

    /// Sweep records and/or archive keys past their configured TTLs.
    /// `dry_run` reports counts without mutating anything (spec.md §8
    /// property 7). Pending jobs are never deleted regardless of age.
    pub async fn run_manual_cleanup(&self, opts: &ManualCleanupOptions) -> Result<CleanupCounts> {
        let mut counts = CleanupCounts::default();
        let now = Utc::now();

        if opts.db {
            let jobs_cutoff = (now - ChronoDuration::days(self.config.retention.database.jobs_days as i64)).date_naive();
            counts.jobs_deleted = self.store.delete_jobs_older_than(jobs_cutoff, opts.dry_run).await?;

            let logs_cutoff = now - ChronoDuration::days(self.config.retention.database.logs_days as i64);
            counts.logs_deleted = self.store.delete_logs_older_than(logs_cutoff, opts.dry_run).await?;

            let api_logs_cutoff = now - ChronoDuration::days(self.config.retention.database.api_logs_days as i64);
            counts.api_records_deleted = self.store.delete_records_older_than(api_logs_cutoff, opts.dry_run).await?;
        }

        if opts.storage {
            let storage_cutoff = now - ChronoDuration::days(self.config.retention.storage.files_days as i64);
            let objects = self.archive.list(&self.config.output_directory, None).await?;
            let stale: Vec<String> = objects
                .into_iter()
                .filter(|o| o.last_modified < storage_cutoff)
                .map(|o| o.key)
                .collect();

            if opts.dry_run {
                counts.archive_keys_deleted = stale.len() as u64;
            } else if !stale.is_empty() {
                let outcomes = self.archive.delete(&stale).await?;
                counts.archive_keys_deleted = outcomes.iter().filter(|o| o.deleted).count() as u64;
            }
        }

        info!(
            dry_run = opts.dry_run,
            jobs_deleted = counts.jobs_deleted,
            logs_deleted = counts.logs_deleted,
            api_records_deleted = counts.api_records_deleted,
            archive_keys_deleted = counts.archive_keys_deleted,
            "retention sweep complete"
        );
        Ok(counts)
    }

    /// Idempotent; safe to call on every boot. Backends without native
    /// lifecycle support (Local, GCS, Azure here) simply no-op.
    pub async fn setup_lifecycle(&self) -> Result<()> {
        let s3_lifecycle = self.config.retention.storage.s3_lifecycle.as_ref();
        let rules = LifecycleRules {
            transition_to_ia_days: s3_lifecycle.and_then(|s| s.transition_to_ia_days),
            transition_to_glacier_days: s3_lifecycle.and_then(|s| s.transition_to_glacier_days),
            transition_to_deep_archive_days: s3_lifecycle.and_then(|s| s.transition_to_deep_archive_days),
            expiration_days: Some(self.config.retention.storage.files_days),
        };
        self.archive.set_lifecycle(&rules).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cleanup_counts_default_to_zero() {
        let counts = CleanupCounts::default();
        assert_eq!(counts.jobs_deleted, 0);
        assert_eq!(counts.archive_keys_deleted, 0);
    }

    #[test]
    fn jobs_cutoff_date_arithmetic_is_stable() {
        let now = Utc::now();
        let cutoff = (now - ChronoDuration::days(90)).date_naive();
        let expected: NaiveDate = (now - ChronoDuration::days(90)).date_naive();
        assert_eq!(cutoff, expected);
    }
}
