use thiserror::Error;

use crate::stats::SyncStats;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Record rejected (id {id:?}): {reason}")]
    RecordRejected { id: Option<i64>, reason: String },

    #[error("Batch {batch_index} ({records} records) failed to commit: {message}")]
    BatchCommitFailed {
        batch_index: usize,
        records: usize,
        message: String,
    },

    #[error("No arc covers episode {episode_id} and no fallback arc exists")]
    ArcUnresolved { episode_id: i64 },

    #[error("Sync timeout after {0} seconds")]
    Timeout(u64),

    #[error("Sync cancelled")]
    Cancelled,

    #[error("Invalid run ID: {0}")]
    InvalidRunId(String),

    #[error("Invalid sync status: {0}")]
    InvalidStatus(String),

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid sync configuration: {0}")]
    Config(String),
}

impl SyncError {
    /// Whether this error ends the run
    ///
    /// Rejected records, failed batches and unresolved arcs are absorbed into
    /// the run statistics and never abort it.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SyncError::RecordRejected { .. }
                | SyncError::BatchCommitFailed { .. }
                | SyncError::ArcUnresolved { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

/// A fatal error together with the statistics gathered before it happened
#[derive(Error, Debug)]
#[error("{error}")]
pub struct SyncFailure {
    #[source]
    pub error: SyncError,
    /// Finalized stats with partial counts
    pub stats: SyncStats,
}

impl SyncFailure {
    pub fn new(error: SyncError, stats: SyncStats) -> Self {
        Self { error, stats }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, SyncError::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(SyncError::StoreUnavailable("down".into()).is_fatal());
        assert!(SyncError::SourceUnavailable("404".into()).is_fatal());
        assert!(SyncError::Cancelled.is_fatal());
        assert!(SyncError::Timeout(5).is_fatal());

        assert!(!SyncError::RecordRejected {
            id: None,
            reason: "missing id".into()
        }
        .is_fatal());
        assert!(!SyncError::BatchCommitFailed {
            batch_index: 1,
            records: 100,
            message: "locked".into()
        }
        .is_fatal());
        assert!(!SyncError::ArcUnresolved { episode_id: 3 }.is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = SyncError::BatchCommitFailed {
            batch_index: 2,
            records: 100,
            message: "disk I/O error".into(),
        };
        assert_eq!(
            err.to_string(),
            "Batch 2 (100 records) failed to commit: disk I/O error"
        );
    }
}
