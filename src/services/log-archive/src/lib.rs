//! Time-windowed log batching and archival engine.
//!
//! [`Engine`] is the stable public surface (spec.md §4.9): construct it from
//! a validated [`Config`], then drive ingestion, on-demand processing, and
//! retention through its methods. The scheduler and its background triggers
//! are an implementation detail behind `init`/`shutdown`.

pub mod archive;
pub mod compression;
pub mod config;
pub mod error;
pub mod job;
pub mod masking;
pub mod path;
pub mod processor;
pub mod retention;
pub mod scheduler;
pub mod serialize;
pub mod store;
pub mod testing;
pub mod types;

use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;

pub use config::{Config, ValidationReport};
pub use error::{EngineError, Result};
pub use types::{ApiRecord, Job, ProcessingLogEntry, SlotResult, SlotStatus};

use archive::ArchiveAdapter;
use processor::WindowProcessor;
use retention::{CleanupCounts, ManualCleanupOptions, RetentionEngine, RetentionStats};
use scheduler::Scheduler;
use store::{RecordFilter, RecordStore, RecordStoreGateway};

/// The fully wired engine: record store, archive, processor, scheduler, and
/// retention, all sharing one immutable configuration snapshot.
pub struct Engine {
    config: Arc<Config>,
    store: Arc<dyn RecordStore>,
    processor: Arc<WindowProcessor>,
    scheduler: Scheduler,
    retention: RetentionEngine,
}

impl Engine {
    /// Validate `config`, connect the record store gateway, build the
    /// archive adapter, and register the scheduler's triggers. A
    /// configuration that fails validation aborts before any I/O.
    pub async fn init(config: Config) -> Result<Self> {
        config.validate_or_err()?;
        let config = Arc::new(config);

        let gateway = RecordStoreGateway::connect(&config.db_uri, &config.collections, &config.api_logs).await?;
        let store: Arc<dyn RecordStore> = Arc::new(gateway);
        let archive: Arc<dyn ArchiveAdapter> = Arc::from(archive::build_adapter(&config).await?);
        let processor = Arc::new(WindowProcessor::new(config.clone(), store.clone(), archive.clone()));
        let retention = RetentionEngine::new(config.clone(), store.clone(), archive.clone());
        let scheduler = Scheduler::new(config.clone(), store.clone(), processor.clone());
        scheduler.start().await?;

        if config.retention.database.auto_cleanup || config.retention.storage.auto_cleanup {
            retention.setup_lifecycle().await?;
        }

        info!("engine initialized");
        Ok(Self {
            config,
            store,
            processor,
            scheduler,
            retention,
        })
    }

    /// Validate a configuration without constructing an engine, per
    /// spec.md §4.9 `validateConfig`.
    pub fn validate_config(config: &Config) -> ValidationReport {
        config.validate()
    }

    pub async fn save_record(&self, mut record: ApiRecord) -> Result<String> {
        if self.config.data_masking.enabled {
            let masked = masking::mask_value(&serde_json::to_value(&record)?, &self.config.data_masking);
            record = serde_json::from_value(masked)?;
        }
        self.store.save_record(&record).await
    }

    pub async fn find_records(&self, filter: RecordFilter) -> Result<Vec<ApiRecord>> {
        self.store.find_records(&filter).await
    }

    pub async fn find_records_in_window(&self, date: NaiveDate, hour: u8) -> Result<Vec<ApiRecord>> {
        self.store.find_records_in_window(date, hour, self.config.tz()).await
    }

    pub async fn create_daily_jobs(&self, date: Option<NaiveDate>) -> Result<Job> {
        let date = date.unwrap_or_else(|| chrono::Utc::now().with_timezone(&self.config.tz()).date_naive());
        self.store.upsert_job(date).await
    }

    pub async fn run_hourly_job(&self) -> Result<SlotResult> {
        self.scheduler.run_hourly_job().await
    }

    pub async fn process_specific_hour(&self, date: NaiveDate, hour: u8) -> Result<SlotResult> {
        self.processor.process(date, hour).await
    }

    pub async fn retry_failed_jobs(&self) -> Result<usize> {
        self.scheduler.retry_failed_jobs().await
    }

    pub async fn get_job_status(&self, date: NaiveDate) -> Result<Option<Job>> {
        self.store.load_job(date).await
    }

    pub async fn get_processing_logs(
        &self,
        date: Option<NaiveDate>,
        hour_range: Option<&str>,
    ) -> Result<Vec<ProcessingLogEntry>> {
        self.store.find_processing_logs(date, hour_range).await
    }

    pub fn retention(&self) -> &RetentionEngine {
        &self.retention
    }

    pub async fn retention_stats(&self) -> Result<RetentionStats> {
        self.retention.stats().await
    }

    pub async fn retention_run_manual_cleanup(&self, opts: ManualCleanupOptions) -> Result<CleanupCounts> {
        self.retention.run_manual_cleanup(&opts).await
    }

    pub async fn retention_setup_lifecycle(&self) -> Result<()> {
        self.retention.setup_lifecycle().await
    }

    /// Drain triggers, then release the gateway handle.
    pub async fn shutdown(&self) -> Result<()> {
        self.scheduler.shutdown().await
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// An invalid config must fail `init` before any connection attempt, so
    /// this never touches the network despite running under a real runtime.
    #[test]
    fn init_rejects_invalid_config_without_connecting() {
        let mut config = Config::default();
        config.retry_attempts = 0;
        let result = tokio_test::block_on(Engine::init(config));
        assert!(result.is_err());
    }
}
