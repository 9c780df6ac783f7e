//! Record Store Gateway: typed MongoDB access to the three logical
//! collections (`jobs`, `processing-logs`, `api-records`), per spec.md §4.4.
//!
//! Physical collection names are configurable; this module only ever reads
//! them from `CollectionsConfig`, never hardcodes them. Access goes through
//! the [`RecordStore`] trait so the Window Processor, Scheduler, and
//! Retention Engine can be driven against an in-memory stub in tests.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use futures::stream::TryStreamExt;
use mongodb::bson::{self, doc, Document};
use mongodb::options::{ClientOptions, FindOptions, UpdateOptions};
use mongodb::{Client, Collection, Database};
use tracing::{debug, info, warn};

use crate::config::{ApiLogsConfig, CollectionsConfig, LEGACY_TIMESTAMP_FIELDS};
use crate::error::{EngineError, Result};
use crate::types::{ApiRecord, HourSlot, Job, ProcessingLogEntry, SlotStatus};

/// Filter accepted by `find_records`.
#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub method: Option<String>,
    pub min_status: Option<u16>,
    pub max_status: Option<u16>,
    pub path_pattern: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<u64>,
}

/// The record store's full surface, as consumed by the Window Processor,
/// Scheduler, and Retention Engine. Implemented by [`RecordStoreGateway`]
/// against MongoDB, and by `testing::InMemoryStore` for tests that exercise
/// scheduling/retry/retention behavior without live infrastructure.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn save_record(&self, record: &ApiRecord) -> Result<String>;
    async fn find_records(&self, filter: &RecordFilter) -> Result<Vec<ApiRecord>>;
    async fn find_records_in_window(&self, date: NaiveDate, hour: u8, tz: Tz) -> Result<Vec<ApiRecord>>;
    async fn upsert_job(&self, date: NaiveDate) -> Result<Job>;
    async fn load_job(&self, date: NaiveDate) -> Result<Option<Job>>;
    async fn update_slot(
        &self,
        date: NaiveDate,
        hour: u8,
        mutator: Box<dyn FnOnce(&mut HourSlot) + Send>,
    ) -> Result<Job>;
    async fn list_recent_jobs(&self, since: NaiveDate) -> Result<Vec<Job>>;
    async fn delete_jobs_older_than(&self, cutoff: NaiveDate, dry_run: bool) -> Result<u64>;
    async fn append_processing_log(&self, entry: &ProcessingLogEntry) -> Result<()>;
    async fn find_processing_logs(
        &self,
        date: Option<NaiveDate>,
        hour_range: Option<&str>,
    ) -> Result<Vec<ProcessingLogEntry>>;
    async fn delete_logs_older_than(&self, cutoff: DateTime<Utc>, dry_run: bool) -> Result<u64>;
    /// Sweep `api-records` past the configured TTL (spec.md §4.8
    /// `retention.database.apiLogs`). Dry-run reports the count unchanged.
    async fn delete_records_older_than(&self, cutoff: DateTime<Utc>, dry_run: bool) -> Result<u64>;
    async fn count_jobs(&self) -> Result<u64>;
    async fn count_api_records(&self) -> Result<u64>;
}

#[derive(Clone)]
pub struct RecordStoreGateway {
    database: Database,
    jobs: Collection<Document>,
    logs: Collection<Document>,
    api_records: Collection<Document>,
    api_logs_config: ApiLogsConfig,
}

impl RecordStoreGateway {
    pub async fn connect(db_uri: &str, collections: &CollectionsConfig, api_logs: &ApiLogsConfig) -> Result<Self> {
        let client_options = ClientOptions::parse(db_uri)
            .await
            .map_err(|e| EngineError::Validation(format!("invalid dbUri: {e}")))?;
        let client = Client::with_options(client_options)?;
        let database = client.default_database().unwrap_or_else(|| client.database("logarchive"));

        match database.run_command(doc! {"ping": 1}, None).await {
            Ok(_) => info!("connected to record store"),
            Err(e) => warn!(error = %e, "record store ping failed; continuing"),
        }

        let api_collection_name = api_logs
            .existing_collection
            .as_ref()
            .map(|e| e.name.as_str())
            .unwrap_or(&collections.api_logs_collection_name);

        Ok(Self {
            jobs: database.collection(&collections.jobs_collection_name),
            logs: database.collection(&collections.logs_collection_name),
            api_records: database.collection(api_collection_name),
            api_logs_config: api_logs.clone(),
            database,
        })
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    fn timestamp_field(&self) -> &str {
        &self.api_logs_config.timestamp_field
    }

    fn window_query(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Document {
        let range = doc! {"$gte": bson::DateTime::from_chrono(start), "$lt": bson::DateTime::from_chrono(end)};
        if self.api_logs_config.legacy_timestamp_fallback {
            let clauses: Vec<Document> = LEGACY_TIMESTAMP_FIELDS
                .iter()
                .map(|field| doc! {*field: range.clone()})
                .collect();
            doc! {"$or": clauses}
        } else {
            doc! {self.timestamp_field(): range}
        }
    }

    async fn run_record_query(&self, query: Document, options: FindOptions) -> Result<Vec<ApiRecord>> {
        let mut cursor = self.api_records.find(query, options).await?;
        let mut records = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            let record: ApiRecord = bson::from_document(doc)?;
            records.push(record);
        }
        Ok(records)
    }
}

#[async_trait]
impl RecordStore for RecordStoreGateway {
    // ---- api-records ----------------------------------------------------

    async fn save_record(&self, record: &ApiRecord) -> Result<String> {
        let doc = bson::to_document(record)?;
        let result = self.api_records.insert_one(doc, None).await?;
        Ok(result
            .inserted_id
            .as_object_id()
            .map(|id| id.to_hex())
            .unwrap_or_else(|| record.id.clone()))
    }

    async fn find_records(&self, filter: &RecordFilter) -> Result<Vec<ApiRecord>> {
        let timestamp_field = self.timestamp_field();
        let mut query = Document::new();

        if filter.from.is_some() || filter.to.is_some() {
            let mut range = Document::new();
            if let Some(from) = filter.from {
                range.insert("$gte", bson::DateTime::from_chrono(from));
            }
            if let Some(to) = filter.to {
                range.insert("$lt", bson::DateTime::from_chrono(to));
            }
            query.insert(timestamp_field, range);
        }
        if let Some(method) = &filter.method {
            query.insert("method", method);
        }
        if filter.min_status.is_some() || filter.max_status.is_some() {
            let mut range = Document::new();
            if let Some(min) = filter.min_status {
                range.insert("$gte", min as i32);
            }
            if let Some(max) = filter.max_status {
                range.insert("$lte", max as i32);
            }
            query.insert("response_status", range);
        }
        if let Some(pattern) = &filter.path_pattern {
            query.insert("path", doc! {"$regex": pattern});
        }

        let mut options = FindOptions::builder().sort(doc! {timestamp_field: 1}).build();
        options.limit = filter.limit;
        options.skip = filter.offset;

        self.run_record_query(query, options).await
    }

    /// Windowed query over `[date Thh:00, date Thh+1:00)` in `tz`, per
    /// spec.md §4.4. When `legacyTimestampFallback` is set, OR across the
    /// documented candidate fields instead of the single configured one.
    async fn find_records_in_window(&self, date: NaiveDate, hour: u8, tz: Tz) -> Result<Vec<ApiRecord>> {
        let (start, end) = window_bounds(date, hour, tz)?;
        let query = self.window_query(start, end);
        let options = FindOptions::builder().sort(doc! {self.timestamp_field(): 1}).build();
        self.run_record_query(query, options).await
    }

    // ---- jobs -------------------------------------------------------------

    /// Idempotent: return the existing job for `date`, or create one with
    /// 24 pending slots.
    async fn upsert_job(&self, date: NaiveDate) -> Result<Job> {
        if let Some(job) = self.load_job(date).await? {
            return Ok(job);
        }
        let job = crate::job::new_pending_job(date);
        let doc = bson::to_document(&job)?;
        match self.jobs.insert_one(doc, None).await {
            Ok(_) => Ok(job),
            Err(e) => {
                // Another process raced us to create this date's job.
                if let Some(existing) = self.load_job(date).await? {
                    debug!(date = %date, "job creation raced; returning winner");
                    Ok(existing)
                } else {
                    Err(e.into())
                }
            }
        }
    }

    async fn load_job(&self, date: NaiveDate) -> Result<Option<Job>> {
        let filter = doc! {"date": date.to_string()};
        match self.jobs.find_one(filter, None).await? {
            Some(doc) => Ok(Some(bson::from_document(doc)?)),
            None => Ok(None),
        }
    }

    /// Serialized mutation of a single slot: load, mutate, recompute parent
    /// status, persist the whole document back.
    async fn update_slot(
        &self,
        date: NaiveDate,
        hour: u8,
        mutator: Box<dyn FnOnce(&mut HourSlot) + Send>,
    ) -> Result<Job> {
        let mut job = self
            .load_job(date)
            .await?
            .ok_or_else(|| EngineError::not_found(format!("job {date}")))?;

        {
            let slot = job
                .slot_mut(hour)
                .ok_or_else(|| EngineError::not_found(format!("slot {date} hour {hour}")))?;
            mutator(slot);
        }
        job.recompute_status();

        let filter = doc! {"date": date.to_string()};
        let update_doc = bson::to_document(&job)?;
        let update = doc! {"$set": update_doc};
        let options = UpdateOptions::builder().upsert(true).build();
        self.jobs.update_one(filter, update, options).await?;
        Ok(job)
    }

    async fn list_recent_jobs(&self, since: NaiveDate) -> Result<Vec<Job>> {
        let filter = doc! {"date": {"$gte": since.to_string()}};
        let mut cursor = self.jobs.find(filter, None).await?;
        let mut jobs = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            jobs.push(bson::from_document(doc)?);
        }
        Ok(jobs)
    }

    async fn delete_jobs_older_than(&self, cutoff: NaiveDate, dry_run: bool) -> Result<u64> {
        // Pending jobs are exempt from retention regardless of age (spec.md §4.8).
        let filter = doc! {
            "date": {"$lt": cutoff.to_string()},
            "status": {"$ne": SlotStatus::Pending.to_string()},
        };
        if dry_run {
            return Ok(self.jobs.count_documents(filter, None).await?);
        }
        let result = self.jobs.delete_many(filter, None).await?;
        Ok(result.deleted_count)
    }

    // ---- processing-logs ---------------------------------------------------

    async fn append_processing_log(&self, entry: &ProcessingLogEntry) -> Result<()> {
        let doc = bson::to_document(entry)?;
        self.logs.insert_one(doc, None).await?;
        Ok(())
    }

    async fn find_processing_logs(
        &self,
        date: Option<NaiveDate>,
        hour_range: Option<&str>,
    ) -> Result<Vec<ProcessingLogEntry>> {
        let mut query = Document::new();
        if let Some(date) = date {
            query.insert("date", date.to_string());
        }
        if let Some(hour_range) = hour_range {
            query.insert("hour_range", hour_range);
        }
        let options = FindOptions::builder().sort(doc! {"attempted_at": -1}).build();
        let mut cursor = self.logs.find(query, options).await?;
        let mut entries = Vec::new();
        while let Some(doc) = cursor.try_next().await? {
            entries.push(bson::from_document(doc)?);
        }
        Ok(entries)
    }

    async fn delete_logs_older_than(&self, cutoff: DateTime<Utc>, dry_run: bool) -> Result<u64> {
        let filter = doc! {"attempted_at": {"$lt": bson::DateTime::from_chrono(cutoff)}};
        if dry_run {
            return Ok(self.logs.count_documents(filter, None).await?);
        }
        let result = self.logs.delete_many(filter, None).await?;
        Ok(result.deleted_count)
    }

    async fn delete_records_older_than(&self, cutoff: DateTime<Utc>, dry_run: bool) -> Result<u64> {
        let filter = doc! {self.timestamp_field(): {"$lt": bson::DateTime::from_chrono(cutoff)}};
        if dry_run {
            return Ok(self.api_records.count_documents(filter, None).await?);
        }
        let result = self.api_records.delete_many(filter, None).await?;
        Ok(result.deleted_count)
    }

    async fn count_jobs(&self) -> Result<u64> {
        Ok(self.jobs.estimated_document_count(None).await?)
    }

    async fn count_api_records(&self) -> Result<u64> {
        Ok(self.api_records.estimated_document_count(None).await?)
    }
}

/// Compute `[date T hour:00, date T hour+1:00)` in `tz`, converted to UTC.
/// Spec.md §3's invariant ties slot boundaries to the configured timezone,
/// not to UTC wall-clock hours.
pub(crate) fn window_bounds(date: NaiveDate, hour: u8, tz: Tz) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start_naive = date
        .and_hms_opt(hour as u32, 0, 0)
        .ok_or_else(|| EngineError::internal(format!("invalid hour {hour}")))?;
    let start_local = tz
        .from_local_datetime(&start_naive)
        .single()
        .ok_or_else(|| EngineError::internal(format!("ambiguous or nonexistent local time {date} {hour}:00 in {tz}")))?;
    let start = start_local.with_timezone(&Utc);
    let end = start + chrono::Duration::hours(1);
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_bounds_are_left_closed_right_open() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 25).unwrap();
        let (start, end) = window_bounds(date, 14, chrono_tz::UTC).unwrap();
        assert_eq!(start.to_rfc3339(), "2025-08-25T14:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-08-25T15:00:00+00:00");
    }

    #[test]
    fn window_bounds_rejects_invalid_hour() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 25).unwrap();
        assert!(window_bounds(date, 25, chrono_tz::UTC).is_err());
    }

    #[test]
    fn window_bounds_honors_non_utc_timezone() {
        let date = NaiveDate::from_ymd_opt(2025, 8, 25).unwrap();
        // 14:00 local in America/New_York (EDT, UTC-4) is 18:00 UTC.
        let (start, end) = window_bounds(date, 14, chrono_tz::America::New_York).unwrap();
        assert_eq!(start.to_rfc3339(), "2025-08-25T18:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-08-25T19:00:00+00:00");
    }
}
