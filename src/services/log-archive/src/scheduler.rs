//! Scheduler: daily-seed and hourly-process cron triggers plus a retry
//! sweep, running cooperatively in one process, per spec.md §4.7.

use chrono::{NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::job;
use crate::processor::WindowProcessor;
use crate::store::RecordStore;
use crate::types::SlotStatus;

/// How many trailing days the retry sweep scans, bounding its cost to
/// `O(K * 24)` per spec.md §4.7.
const RETRY_SWEEP_WINDOW_DAYS: i64 = 7;

pub struct Scheduler {
    config: Arc<Config>,
    store: Arc<dyn RecordStore>,
    processor: Arc<WindowProcessor>,
    timezone: Tz,
    inner: Arc<RwLock<Option<JobScheduler>>>,
    shutdown_tx: Arc<RwLock<Option<mpsc::Sender<()>>>>,
}

impl Scheduler {
    pub fn new(config: Arc<Config>, store: Arc<dyn RecordStore>, processor: Arc<WindowProcessor>) -> Self {
        let timezone = config.tz();
        Self {
            config,
            store,
            processor,
            timezone,
            inner: Arc::new(RwLock::new(None)),
            shutdown_tx: Arc::new(RwLock::new(None)),
        }
    }

    /// Register both cron triggers and start the scheduler. A configuration
    /// that failed `validateConfig` must never reach this call.
    pub async fn start(&self) -> Result<()> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| crate::error::EngineError::internal(format!("failed to create cron scheduler: {e}")))?;

        let daily_store = self.store.clone();
        let daily_tz = self.timezone;
        let daily_job = CronJob::new_async(self.config.daily_cron.as_str(), move |_uuid, _l| {
            let store = daily_store.clone();
            Box::pin(async move {
                if let Err(e) = create_daily_jobs(store.as_ref(), None, daily_tz).await {
                    error!(error = %e, "daily trigger failed");
                }
            })
        })
        .map_err(|e| crate::error::EngineError::Validation(format!("invalid dailyCron: {e}")))?;
        scheduler
            .add(daily_job)
            .await
            .map_err(|e| crate::error::EngineError::internal(e.to_string()))?;

        let hourly_processor = self.processor.clone();
        let hourly_store = self.store.clone();
        let max_retries = self.config.retry_attempts;
        let hourly_tz = self.timezone;
        let hourly_job = CronJob::new_async(self.config.hourly_cron.as_str(), move |_uuid, _l| {
            let processor = hourly_processor.clone();
            let store = hourly_store.clone();
            Box::pin(async move {
                if let Err(e) = retry_sweep(store.as_ref(), &processor, max_retries, RETRY_SWEEP_WINDOW_DAYS).await {
                    error!(error = %e, "retry sweep failed");
                }
                if let Err(e) = run_hourly_job(&processor, hourly_tz).await {
                    error!(error = %e, "hourly trigger failed");
                }
            })
        })
        .map_err(|e| crate::error::EngineError::Validation(format!("invalid hourlyCron: {e}")))?;
        scheduler
            .add(hourly_job)
            .await
            .map_err(|e| crate::error::EngineError::internal(e.to_string()))?;

        scheduler
            .start()
            .await
            .map_err(|e| crate::error::EngineError::internal(format!("failed to start cron scheduler: {e}")))?;

        *self.inner.write().await = Some(scheduler);
        let (tx, _rx) = mpsc::channel(1);
        *self.shutdown_tx.write().await = Some(tx);
        info!(daily_cron = %self.config.daily_cron, hourly_cron = %self.config.hourly_cron, "scheduler started");
        Ok(())
    }

    /// Stop accepting new triggers; best-effort drain of whatever is
    /// in-flight happens at the caller's discretion via the drain timeout.
    pub async fn shutdown(&self) -> Result<()> {
        if let Some(scheduler) = self.inner.write().await.take() {
            scheduler
                .shutdown()
                .await
                .map_err(|e| crate::error::EngineError::internal(e.to_string()))?;
        }
        self.shutdown_tx.write().await.take();
        info!("scheduler shut down");
        Ok(())
    }

    pub async fn retry_failed_jobs(&self) -> Result<usize> {
        retry_sweep(self.store.as_ref(), &self.processor, self.config.retry_attempts, RETRY_SWEEP_WINDOW_DAYS).await
    }

    pub async fn run_hourly_job(&self) -> Result<crate::types::SlotResult> {
        run_hourly_job(&self.processor, self.timezone).await
    }
}

async fn create_daily_jobs(store: &dyn RecordStore, date: Option<NaiveDate>, tz: Tz) -> Result<()> {
    let date = date.unwrap_or_else(|| Utc::now().with_timezone(&tz).date_naive());
    store.upsert_job(date).await?;
    info!(date = %date, "daily job ensured");
    Ok(())
}

/// Identify the immediately preceding clock hour, in the configured
/// timezone, and process it.
async fn run_hourly_job(processor: &WindowProcessor, tz: Tz) -> Result<crate::types::SlotResult> {
    let now = Utc::now().with_timezone(&tz);
    let previous = now - chrono::Duration::hours(1);
    let date = previous.date_naive();
    let hour = previous.hour() as u8;
    processor.process(date, hour).await
}

/// Scan the last `window_days` days of jobs for `failed` slots with
/// `retries < max_retries`; reset to `pending`, then reprocess immediately.
async fn retry_sweep(
    store: &dyn RecordStore,
    processor: &WindowProcessor,
    max_retries: u32,
    window_days: i64,
) -> Result<usize> {
    let since = (Utc::now() - chrono::Duration::days(window_days)).date_naive();
    let jobs = store.list_recent_jobs(since).await?;
    let mut reset_count = 0;

    for j in jobs {
        if j.status != SlotStatus::Failed {
            continue;
        }
        for slot in &j.hours {
            if slot.status != SlotStatus::Failed || slot.retries >= max_retries {
                continue;
            }
            let hour: u8 = slot.hour_range.split('-').next().and_then(|h| h.parse().ok()).unwrap_or(0);
            let reset = store
                .update_slot(j.date, hour, Box::new(move |s| {
                    job::reset_for_retry(s, max_retries);
                }))
                .await;
            match reset {
                Ok(_) => {
                    reset_count += 1;
                    if let Err(e) = processor.process(j.date, hour).await {
                        warn!(date = %j.date, hour, error = %e, "retry attempt failed");
                    }
                }
                Err(e) => warn!(date = %j.date, hour, error = %e, "failed to reset slot for retry"),
            }
        }
    }
    Ok(reset_count)
}
