//! Job Model: slot state machine transitions, per spec.md §4.5.
//!
//! The transitions here are pure — they take and return owned values rather
//! than mutating through a gateway — so they can be unit tested without a
//! database. `store::update_slot` applies them under the advisory lock.

use chrono::{NaiveDate, Utc};

use crate::types::{hour_range_string, HourSlot, Job, SlotLogEntry, SlotStatus};

/// Build a fresh job for `date` with 24 ordered, pending slots.
pub fn new_pending_job(date: NaiveDate) -> Job {
    let hours: Vec<HourSlot> = (0..crate::types::HOURS_PER_DAY as u8)
        .map(|hour| {
            let file_name = format!("api-logs_{}_{}.json", date.format("%Y-%m-%d"), hour_range_string(hour));
            HourSlot::new(hour, file_name)
        })
        .collect();
    let now = Utc::now();
    Job {
        date,
        status: SlotStatus::Pending,
        hours,
        created_at: now,
        updated_at: now,
    }
}

/// `pending -> success` (or `failed -> success` on a successful retry).
pub fn mark_success(slot: &mut HourSlot, file_path: String) {
    slot.file_path = file_path;
    slot.status = SlotStatus::Success;
}

/// `pending -> failed`, or `failed -> failed` with `retries` incremented,
/// capped at `max_retries`.
pub fn mark_failed(slot: &mut HourSlot, error: String, max_retries: u32) {
    slot.logs.push(SlotLogEntry {
        timestamp: Utc::now(),
        error,
    });
    if slot.retries < max_retries {
        slot.retries += 1;
    }
    slot.status = SlotStatus::Failed;
}

/// `failed -> pending`: retry sweeper resets an eligible slot.
///
/// Returns `false` without mutating if the slot is not eligible (not
/// `failed`, or its retry budget is already exhausted).
pub fn reset_for_retry(slot: &mut HourSlot, max_retries: u32) -> bool {
    if slot.status != SlotStatus::Failed || slot.retries >= max_retries {
        return false;
    }
    slot.status = SlotStatus::Pending;
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_job_has_monotone_hour_ranges() {
        let job = new_pending_job(NaiveDate::from_ymd_opt(2025, 8, 25).unwrap());
        assert_eq!(job.hours.len(), 24);
        assert_eq!(job.hours[0].hour_range, "00-01");
        assert_eq!(job.hours[23].hour_range, "23-24");
        assert!(job.hours.iter().all(|s| s.status == SlotStatus::Pending));
    }

    #[test]
    fn mark_success_sets_file_path_and_status() {
        let mut slot = HourSlot::new(14, "f.json".to_string());
        mark_success(&mut slot, "logs/2025-08-25/f.json".to_string());
        assert_eq!(slot.status, SlotStatus::Success);
        assert_eq!(slot.file_path, "logs/2025-08-25/f.json");
    }

    #[test]
    fn mark_failed_increments_retries_and_logs_error() {
        let mut slot = HourSlot::new(14, "f.json".to_string());
        mark_failed(&mut slot, "boom".to_string(), 3);
        assert_eq!(slot.status, SlotStatus::Failed);
        assert_eq!(slot.retries, 1);
        assert_eq!(slot.logs.len(), 1);
    }

    #[test]
    fn mark_failed_does_not_exceed_max_retries() {
        let mut slot = HourSlot::new(14, "f.json".to_string());
        for _ in 0..5 {
            mark_failed(&mut slot, "boom".to_string(), 2);
        }
        assert_eq!(slot.retries, 2);
        assert_eq!(slot.logs.len(), 5);
    }

    #[test]
    fn reset_for_retry_only_applies_to_eligible_failed_slots() {
        let mut slot = HourSlot::new(14, "f.json".to_string());
        assert!(!reset_for_retry(&mut slot, 3));

        mark_failed(&mut slot, "boom".to_string(), 3);
        assert!(reset_for_retry(&mut slot, 3));
        assert_eq!(slot.status, SlotStatus::Pending);

        mark_failed(&mut slot, "boom".to_string(), 1);
        mark_failed(&mut slot, "boom again".to_string(), 1);
        assert_eq!(slot.retries, 1);
        assert!(!reset_for_retry(&mut slot, 1));
    }

    #[test]
    fn retries_are_monotone_non_decreasing() {
        let mut slot = HourSlot::new(14, "f.json".to_string());
        let mut last = 0;
        for _ in 0..4 {
            mark_failed(&mut slot, "boom".to_string(), 10);
            assert!(slot.retries >= last);
            last = slot.retries;
            reset_for_retry(&mut slot, 10);
        }
    }
}
