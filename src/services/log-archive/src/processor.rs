//! Window Processor: `process(date, hour)`, per spec.md §4.6.
//!
//! Each step between fetch and upload is isolated so a failure at any point
//! converts cleanly into a `failed` slot rather than propagating to the
//! scheduler.

use chrono::{NaiveDate, Utc};
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{info, warn};

use crate::archive::ArchiveAdapter;
use crate::config::Config;
use crate::error::{EngineError, Result};
use crate::job;
use crate::masking;
use crate::path;
use crate::serialize;
use crate::store::RecordStore;
use crate::types::{ProcessingLogEntry, SlotResult, SlotStatus};

/// Process-local advisory lock, one entry per in-flight or previously-seen
/// `(date, hour)` slot. Entries are never removed: the map stays bounded by
/// the retention window's worth of slots (a few thousand at most), which is
/// cheap enough not to warrant GC.
pub type SlotLockMap = DashMap<(NaiveDate, u8), Arc<AsyncMutex<()>>>;

pub struct WindowProcessor {
    config: Arc<Config>,
    store: Arc<dyn RecordStore>,
    archive: Arc<dyn ArchiveAdapter>,
    locks: Arc<SlotLockMap>,
}

impl WindowProcessor {
    pub fn new(config: Arc<Config>, store: Arc<dyn RecordStore>, archive: Arc<dyn ArchiveAdapter>) -> Self {
        Self {
            config,
            store,
            archive,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Per-attempt timeout: the whole pipeline (steps 3-7) must settle
    /// within this deadline or the attempt counts as `failed`.
    fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(300)
    }

    pub async fn process(&self, date: NaiveDate, hour: u8) -> Result<SlotResult> {
        // Step 1: resolve. Ensure the job exists, then short-circuit on an
        // already-successful slot (idempotence, spec.md §8 property 6).
        let job = self.store.upsert_job(date).await?;
        let slot = job
            .slot(hour)
            .ok_or_else(|| EngineError::internal(format!("hour {hour} out of range")))?;
        if slot.status == SlotStatus::Success {
            return Ok(SlotResult {
                date,
                hour,
                status: SlotStatus::Success,
                file_path: Some(slot.file_path.clone()),
                record_count: 0,
                no_op: true,
            });
        }

        // Step 2: acquire the advisory lock; never block waiting for it.
        let lock = self
            .locks
            .entry((date, hour))
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let _guard = lock.try_lock().map_err(|_| EngineError::SlotBusy {
            date: date.to_string(),
            hour_range: crate::types::hour_range_string(hour),
        })?;

        match tokio::time::timeout(self.attempt_timeout(), self.run_attempt(date, hour)).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => self.fail_slot(date, hour, e.to_string()).await,
            Err(_) => self.fail_slot(date, hour, "attempt exceeded per-attempt timeout".to_string()).await,
        }
    }

    async fn run_attempt(&self, date: NaiveDate, hour: u8) -> Result<SlotResult> {
        // Step 3: fetch. Window boundaries are computed in the configured
        // timezone, per spec.md §3.
        let records = self.store.find_records_in_window(date, hour, self.config.tz()).await?;
        let record_count = records.len();

        // Step 4: transform (mask) each record into a JSON value.
        let masked: Vec<serde_json::Value> = records
            .iter()
            .map(|record| {
                let value = serde_json::to_value(record).unwrap_or(serde_json::Value::Null);
                masking::mask_value(&value, &self.config.data_masking)
            })
            .collect();

        // Step 5: serialize.
        let serialized = serialize::serialize_records(&masked, self.config.file_format)?;

        // Content hash, computed pre-compression for stable audit identity.
        let content_hash = hex_sha256(&serialized);

        // Step 6: optionally compress.
        let payload = crate::compression::maybe_compress(&serialized, &self.config.compression)?;

        // Step 7: upload.
        let extension = self.config.file_format.extension();
        let key = path::build_key(
            date,
            hour,
            SlotStatus::Success,
            &self.config.folder_structure,
            extension,
            &self.config.compression,
        );
        let mut metadata = HashMap::new();
        metadata.insert("content-sha256".to_string(), content_hash.clone());
        metadata.insert("record-count".to_string(), record_count.to_string());

        let content_type = if self.config.compression.enabled && payload.len() != serialized.len() {
            "application/octet-stream"
        } else {
            self.config.file_format.content_type()
        };

        let location = self.archive.put(&key, payload, content_type, metadata).await?;

        // Step 8: commit.
        let success_location = location.clone();
        self.store
            .update_slot(date, hour, Box::new(move |slot| job::mark_success(slot, success_location)))
            .await?;
        self.store
            .append_processing_log(&ProcessingLogEntry {
                date,
                hour_range: crate::types::hour_range_string(hour),
                status: SlotStatus::Success,
                file_path: Some(location.clone()),
                error: None,
                content_hash: Some(content_hash),
                attempted_at: Utc::now(),
            })
            .await?;

        info!(date = %date, hour, record_count, location = %location, "window processed");

        Ok(SlotResult {
            date,
            hour,
            status: SlotStatus::Success,
            file_path: Some(location),
            record_count,
            no_op: false,
        })
    }

    /// Step 9: on any failure between fetch and upload, log it to the slot,
    /// bump retries, and append a failure row, regardless of cause.
    async fn fail_slot(&self, date: NaiveDate, hour: u8, error: String) -> Result<SlotResult> {
        warn!(date = %date, hour, error = %error, "window processing attempt failed");
        let max_retries = self.config.retry_attempts;
        let failure_error = error.clone();
        self.store
            .update_slot(date, hour, Box::new(move |slot| job::mark_failed(slot, failure_error, max_retries)))
            .await?;
        self.store
            .append_processing_log(&ProcessingLogEntry {
                date,
                hour_range: crate::types::hour_range_string(hour),
                status: SlotStatus::Failed,
                file_path: None,
                error: Some(error),
                content_hash: None,
                attempted_at: Utc::now(),
            })
            .await?;
        Ok(SlotResult {
            date,
            hour,
            status: SlotStatus::Failed,
            file_path: None,
            record_count: 0,
            no_op: false,
        })
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_sha256_is_deterministic() {
        let a = hex_sha256(b"hello");
        let b = hex_sha256(b"hello");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert_ne!(a, hex_sha256(b"world"));
    }
}
