//! Core data types: API records, jobs, hour slots, processing-log entries.
//!
//! Slot and job status are typed enums rather than strings, per the
//! "job+slot as sum types" design note — every match over them is exhaustive
//! at compile time.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of hour slots in a day. Invariant: every job has exactly this many.
pub const HOURS_PER_DAY: usize = 24;

/// Status of a single hour slot or of a job as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Pending,
    Success,
    Failed,
}

impl fmt::Display for SlotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotStatus::Pending => write!(f, "pending"),
            SlotStatus::Success => write!(f, "success"),
            SlotStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One captured request/response record from the primary record store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRecord {
    pub id: String,
    /// The configured primary timestamp field's value.
    pub request_time: DateTime<Utc>,
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_body: Option<serde_json::Value>,
    #[serde(default)]
    pub request_headers: serde_json::Value,
    pub response_status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<serde_json::Value>,
    #[serde(default)]
    pub query: serde_json::Value,
    #[serde(default)]
    pub path_params: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_timestamp: Option<DateTime<Utc>>,
    /// Arbitrary extra fields preserved verbatim on serialization.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A single entry in a slot's error log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotLogEntry {
    pub timestamp: DateTime<Utc>,
    pub error: String,
}

/// One of the 24 hour-slot children of a `Job`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourSlot {
    /// `"HH-HH"`, e.g. `"14-15"`.
    pub hour_range: String,
    pub file_name: String,
    /// Empty until the slot transitions to `Success`.
    #[serde(default)]
    pub file_path: String,
    pub status: SlotStatus,
    #[serde(default)]
    pub retries: u32,
    #[serde(default)]
    pub logs: Vec<SlotLogEntry>,
}

impl HourSlot {
    pub fn new(hour: u8, file_name: String) -> Self {
        Self {
            hour_range: hour_range_string(hour),
            file_name,
            file_path: String::new(),
            status: SlotStatus::Pending,
            retries: 0,
            logs: Vec::new(),
        }
    }
}

/// Format an hour as its canonical `"HH-HH"` range string.
pub fn hour_range_string(hour: u8) -> String {
    format!("{:02}-{:02}", hour, hour + 1)
}

/// The daily job document: 24 hour slots plus a derived overall status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub date: NaiveDate,
    pub status: SlotStatus,
    pub hours: Vec<HourSlot>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Derive the overall job status from its 24 slots, per spec.md §3:
    /// `success` iff every slot succeeded; `failed` iff any slot failed and
    /// none remain pending; otherwise `pending`.
    pub fn derive_status(hours: &[HourSlot]) -> SlotStatus {
        if hours.iter().all(|h| h.status == SlotStatus::Success) {
            SlotStatus::Success
        } else if hours.iter().any(|h| h.status == SlotStatus::Failed)
            && !hours.iter().any(|h| h.status == SlotStatus::Pending)
        {
            SlotStatus::Failed
        } else {
            SlotStatus::Pending
        }
    }

    pub fn recompute_status(&mut self) {
        self.status = Self::derive_status(&self.hours);
        self.updated_at = Utc::now();
    }

    pub fn slot(&self, hour: u8) -> Option<&HourSlot> {
        self.hours.get(hour as usize)
    }

    pub fn slot_mut(&mut self, hour: u8) -> Option<&mut HourSlot> {
        self.hours.get_mut(hour as usize)
    }
}

/// Outcome recorded in the append-only `processing-logs` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingLogEntry {
    pub date: NaiveDate,
    pub hour_range: String,
    pub status: SlotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// SHA-256 of the serialized, pre-compression artifact, so an audit can
    /// verify content identity without re-opening the archived object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    pub attempted_at: DateTime<Utc>,
}

/// Outcome of one `Engine::process_specific_hour` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotResult {
    pub date: NaiveDate,
    pub hour: u8,
    pub status: SlotStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    pub record_count: usize,
    /// Whether this call was a no-op because the slot was already successful.
    pub no_op: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_job() -> Job {
        let hours: Vec<HourSlot> = (0..HOURS_PER_DAY as u8)
            .map(|h| HourSlot::new(h, format!("api-logs_2025-08-25_{}.json", hour_range_string(h))))
            .collect();
        Job {
            date: NaiveDate::from_ymd_opt(2025, 8, 25).unwrap(),
            status: SlotStatus::Pending,
            hours,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn new_job_has_24_ordered_slots() {
        let job = pending_job();
        assert_eq!(job.hours.len(), HOURS_PER_DAY);
        for (i, slot) in job.hours.iter().enumerate() {
            assert_eq!(slot.hour_range, hour_range_string(i as u8));
        }
        assert_eq!(job.hours[0].hour_range, "00-01");
        assert_eq!(job.hours[23].hour_range, "23-24");
    }

    #[test]
    fn status_is_success_iff_all_slots_succeed() {
        let mut job = pending_job();
        for slot in job.hours.iter_mut() {
            slot.status = SlotStatus::Success;
        }
        job.recompute_status();
        assert_eq!(job.status, SlotStatus::Success);

        job.hours[10].status = SlotStatus::Pending;
        job.recompute_status();
        assert_eq!(job.status, SlotStatus::Pending);
    }

    #[test]
    fn status_is_failed_iff_any_failed_and_none_pending() {
        let mut job = pending_job();
        for slot in job.hours.iter_mut() {
            slot.status = SlotStatus::Success;
        }
        job.hours[5].status = SlotStatus::Failed;
        job.recompute_status();
        assert_eq!(job.status, SlotStatus::Failed);

        // One slot still pending alongside the failure keeps job pending.
        job.hours[6].status = SlotStatus::Pending;
        job.recompute_status();
        assert_eq!(job.status, SlotStatus::Pending);
    }
}
