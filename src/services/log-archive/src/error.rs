//! Error taxonomy for the log archival engine.
//!
//! One enum covers every failure surfaced by the record store gateway, the
//! archive adapter, the masking engine, and the scheduler. Each variant
//! carries enough context to decide both a CLI exit code and a slot retry
//! outcome from the same value, instead of keeping two parallel taxonomies.

use thiserror::Error;

/// Result type alias used throughout the engine.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine-wide error type.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Configuration failed `validate_config`; non-retriable, aborts init.
    #[error("configuration invalid: {0}")]
    Validation(String),

    /// Record store transport error (network, pool exhaustion).
    #[error("record store unavailable: {message}")]
    RecordStoreUnavailable { message: String },

    /// Record store rejected credentials.
    #[error("record store authentication failed: {message}")]
    RecordStoreAuth { message: String },

    /// Archive transport error.
    #[error("archive unavailable: {message}")]
    ArchiveUnavailable { message: String },

    /// Archive rejected credentials.
    #[error("archive authentication failed: {message}")]
    ArchiveAuth { message: String },

    /// Another attempt already holds the advisory lock for this slot.
    #[error("slot busy: {date} {hour_range}")]
    SlotBusy { date: String, hour_range: String },

    /// A per-attempt deadline elapsed.
    #[error("operation timed out: {operation}")]
    Timeout { operation: String },

    /// The attempt was cancelled by a shutdown signal.
    #[error("operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// A record failed to serialize (JSON/CSV) or failed masking.
    #[error("serialization error: {message}")]
    Serialization { message: String },

    /// Masking policy could not be applied to a record.
    #[error("masking error: {message}")]
    Masking { message: String },

    /// Requested job/slot/record does not exist.
    #[error("not found: {resource}")]
    NotFound { resource: String },

    /// Programming/internal invariant violation.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl EngineError {
    /// Whether the scheduler should treat this as a transient, retry-eligible
    /// outcome (maps to a `failed` slot with a future retry) versus a fatal
    /// abort of the current tick.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EngineError::RecordStoreUnavailable { .. }
                | EngineError::ArchiveUnavailable { .. }
                | EngineError::SlotBusy { .. }
                | EngineError::Timeout { .. }
                | EngineError::Cancelled { .. }
        )
    }

    /// CLI exit code per spec.md §6: `0` success, `2` validation error,
    /// `3` transient failure, `4` fatal.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Validation(_) => 2,
            EngineError::RecordStoreUnavailable { .. }
            | EngineError::ArchiveUnavailable { .. }
            | EngineError::SlotBusy { .. }
            | EngineError::Timeout { .. }
            | EngineError::Cancelled { .. } => 3,
            EngineError::RecordStoreAuth { .. }
            | EngineError::ArchiveAuth { .. }
            | EngineError::Serialization { .. }
            | EngineError::Masking { .. }
            | EngineError::NotFound { .. }
            | EngineError::Internal { .. } => 4,
        }
    }

    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn masking<S: Into<String>>(message: S) -> Self {
        Self::Masking {
            message: message.into(),
        }
    }

    pub fn serialization<S: Into<String>>(message: S) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }
}

impl From<mongodb::error::Error> for EngineError {
    fn from(err: mongodb::error::Error) -> Self {
        use mongodb::error::ErrorKind;
        match *err.kind {
            ErrorKind::Authentication { .. } => EngineError::RecordStoreAuth {
                message: err.to_string(),
            },
            _ => EngineError::RecordStoreUnavailable {
                message: err.to_string(),
            },
        }
    }
}

impl From<std::io::Error> for EngineError {
    fn from(err: std::io::Error) -> Self {
        EngineError::ArchiveUnavailable {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<csv::Error> for EngineError {
    fn from(err: csv::Error) -> Self {
        EngineError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Validation(err.to_string())
    }
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            EngineError::Timeout {
                operation: "HTTP request".to_string(),
            }
        } else {
            EngineError::ArchiveUnavailable {
                message: err.to_string(),
            }
        }
    }
}

impl From<tokio::time::error::Elapsed> for EngineError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        EngineError::Timeout {
            operation: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_are_not_retryable() {
        let err = EngineError::Validation("bad config".into());
        assert!(!err.is_retryable());
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn transient_errors_are_retryable_and_exit_3() {
        let err = EngineError::ArchiveUnavailable {
            message: "connection refused".into(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn slot_busy_is_retryable() {
        let err = EngineError::SlotBusy {
            date: "2025-08-25".into(),
            hour_range: "14-15".into(),
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn not_found_is_fatal() {
        let err = EngineError::not_found("job 2025-08-25");
        assert!(!err.is_retryable());
        assert_eq!(err.exit_code(), 4);
    }
}
