//! In-memory `RecordStore` double, used to exercise the Window Processor,
//! Scheduler, and Retention Engine in tests without live MongoDB.
//!
//! Not `#[cfg(test)]`-gated: the separate `tests/` integration crate needs
//! to reach it as `log_archive_engine::testing::InMemoryStore`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::{EngineError, Result};
use crate::store::{window_bounds, RecordFilter, RecordStore};
use crate::types::{ApiRecord, HourSlot, Job, ProcessingLogEntry, SlotStatus};

#[derive(Default)]
pub struct InMemoryStore {
    records: Mutex<Vec<ApiRecord>>,
    jobs: Mutex<HashMap<NaiveDate, Job>>,
    logs: Mutex<Vec<ProcessingLogEntry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed records directly, bypassing `save_record`'s masking caller.
    pub fn seed_records(&self, records: Vec<ApiRecord>) {
        self.records.lock().extend(records);
    }

    pub fn seed_job(&self, job: Job) {
        self.jobs.lock().insert(job.date, job);
    }

    pub fn processing_logs(&self) -> Vec<ProcessingLogEntry> {
        self.logs.lock().clone()
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn save_record(&self, record: &ApiRecord) -> Result<String> {
        self.records.lock().push(record.clone());
        Ok(record.id.clone())
    }

    async fn find_records(&self, filter: &RecordFilter) -> Result<Vec<ApiRecord>> {
        let records = self.records.lock();
        let mut matched: Vec<ApiRecord> = records
            .iter()
            .filter(|r| filter.from.map(|from| r.request_time >= from).unwrap_or(true))
            .filter(|r| filter.to.map(|to| r.request_time < to).unwrap_or(true))
            .filter(|r| filter.method.as_ref().map(|m| &r.method == m).unwrap_or(true))
            .filter(|r| filter.min_status.map(|min| r.response_status >= min).unwrap_or(true))
            .filter(|r| filter.max_status.map(|max| r.response_status <= max).unwrap_or(true))
            .cloned()
            .collect();
        matched.sort_by_key(|r| r.request_time);
        if let Some(offset) = filter.offset {
            matched = matched.into_iter().skip(offset as usize).collect();
        }
        if let Some(limit) = filter.limit {
            matched.truncate(limit.max(0) as usize);
        }
        Ok(matched)
    }

    async fn find_records_in_window(&self, date: NaiveDate, hour: u8, tz: Tz) -> Result<Vec<ApiRecord>> {
        let (start, end) = window_bounds(date, hour, tz)?;
        let mut matched: Vec<ApiRecord> = self
            .records
            .lock()
            .iter()
            .filter(|r| r.request_time >= start && r.request_time < end)
            .cloned()
            .collect();
        matched.sort_by_key(|r| r.request_time);
        Ok(matched)
    }

    async fn upsert_job(&self, date: NaiveDate) -> Result<Job> {
        let mut jobs = self.jobs.lock();
        if let Some(job) = jobs.get(&date) {
            return Ok(job.clone());
        }
        let job = crate::job::new_pending_job(date);
        jobs.insert(date, job.clone());
        Ok(job)
    }

    async fn load_job(&self, date: NaiveDate) -> Result<Option<Job>> {
        Ok(self.jobs.lock().get(&date).cloned())
    }

    async fn update_slot(
        &self,
        date: NaiveDate,
        hour: u8,
        mutator: Box<dyn FnOnce(&mut HourSlot) + Send>,
    ) -> Result<Job> {
        let mut jobs = self.jobs.lock();
        let job = jobs
            .get_mut(&date)
            .ok_or_else(|| EngineError::not_found(format!("job {date}")))?;
        {
            let slot = job
                .slot_mut(hour)
                .ok_or_else(|| EngineError::not_found(format!("slot {date} hour {hour}")))?;
            mutator(slot);
        }
        job.recompute_status();
        Ok(job.clone())
    }

    async fn list_recent_jobs(&self, since: NaiveDate) -> Result<Vec<Job>> {
        Ok(self.jobs.lock().values().filter(|j| j.date >= since).cloned().collect())
    }

    async fn delete_jobs_older_than(&self, cutoff: NaiveDate, dry_run: bool) -> Result<u64> {
        let mut jobs = self.jobs.lock();
        let stale: Vec<NaiveDate> = jobs
            .values()
            .filter(|j| j.date < cutoff && j.status != SlotStatus::Pending)
            .map(|j| j.date)
            .collect();
        if !dry_run {
            for date in &stale {
                jobs.remove(date);
            }
        }
        Ok(stale.len() as u64)
    }

    async fn append_processing_log(&self, entry: &ProcessingLogEntry) -> Result<()> {
        self.logs.lock().push(entry.clone());
        Ok(())
    }

    async fn find_processing_logs(
        &self,
        date: Option<NaiveDate>,
        hour_range: Option<&str>,
    ) -> Result<Vec<ProcessingLogEntry>> {
        let mut matched: Vec<ProcessingLogEntry> = self
            .logs
            .lock()
            .iter()
            .filter(|e| date.map(|d| e.date == d).unwrap_or(true))
            .filter(|e| hour_range.map(|hr| e.hour_range == hr).unwrap_or(true))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.attempted_at.cmp(&a.attempted_at));
        Ok(matched)
    }

    async fn delete_logs_older_than(&self, cutoff: DateTime<Utc>, dry_run: bool) -> Result<u64> {
        let mut logs = self.logs.lock();
        let count = logs.iter().filter(|e| e.attempted_at < cutoff).count() as u64;
        if !dry_run {
            logs.retain(|e| e.attempted_at >= cutoff);
        }
        Ok(count)
    }

    async fn delete_records_older_than(&self, cutoff: DateTime<Utc>, dry_run: bool) -> Result<u64> {
        let mut records = self.records.lock();
        let count = records.iter().filter(|r| r.request_time < cutoff).count() as u64;
        if !dry_run {
            records.retain(|r| r.request_time >= cutoff);
        }
        Ok(count)
    }

    async fn count_jobs(&self) -> Result<u64> {
        Ok(self.jobs.lock().len() as u64)
    }

    async fn count_api_records(&self) -> Result<u64> {
        Ok(self.records.lock().len() as u64)
    }
}
