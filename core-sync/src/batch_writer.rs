//! Failure-isolated batch writes
//!
//! Records are split into contiguous batches committed in input order. Each
//! batch is one atomic upsert; a failed batch is counted and the writer moves
//! on to the next one.

use crate::{Result, SyncError};
use core_library::repositories::EpisodeRepository;
use core_library::PersistedRecord;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// What happened to a set of records handed to [`BatchWriter::commit`]
#[derive(Debug, Default)]
pub struct CommitOutcome {
    /// Records in batches that committed
    pub inserted: u64,
    /// Records in batches that failed
    pub failed: u64,
    /// One `BatchCommitFailed` per failed batch
    pub failures: Vec<SyncError>,
    /// Batches that ran before cancellation was observed
    pub batches_attempted: usize,
    /// Cancellation stopped the writer before every batch ran
    pub cancelled: bool,
}

/// Result of one batch, handed to the progress callback as it happens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchReport {
    pub batch_index: usize,
    pub records: usize,
    pub committed: bool,
}

pub struct BatchWriter {
    repo: Arc<dyn EpisodeRepository>,
    batch_size: usize,
}

impl BatchWriter {
    pub fn new(repo: Arc<dyn EpisodeRepository>) -> Self {
        Self {
            repo,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the batch size; zero is treated as one
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Commit `records` batch by batch
    ///
    /// Cancellation is checked between batches; committed batches stay
    /// committed.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StoreUnavailable`] only when the store cannot be
    /// reached before the first batch. Per-batch failures are reported in the
    /// outcome.
    pub async fn commit(
        &self,
        records: &[PersistedRecord],
        cancel: &CancellationToken,
    ) -> Result<CommitOutcome> {
        self.commit_with_progress(records, cancel, |_| Ok(())).await
    }

    /// Like [`commit`](Self::commit), calling `on_batch` after every batch
    ///
    /// An error from `on_batch` stops the writer and is returned as is.
    #[instrument(skip(self, records, cancel, on_batch), fields(records = records.len(), batch_size = self.batch_size))]
    pub async fn commit_with_progress<F>(
        &self,
        records: &[PersistedRecord],
        cancel: &CancellationToken,
        mut on_batch: F,
    ) -> Result<CommitOutcome>
    where
        F: FnMut(&BatchReport) -> Result<()> + Send,
    {
        let mut outcome = CommitOutcome::default();
        if records.is_empty() {
            debug!("Nothing to commit");
            return Ok(outcome);
        }

        self.repo.ping().await.map_err(|e| {
            error!(error = %e, "Store unreachable before first batch");
            SyncError::StoreUnavailable(format!("store connection failed: {}", e))
        })?;

        let total_batches = records.len().div_ceil(self.batch_size);

        for (batch_index, batch) in records.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                warn!(
                    batch_index,
                    remaining = total_batches - batch_index,
                    "Cancellation requested, stopping batch writes"
                );
                outcome.cancelled = true;
                break;
            }

            outcome.batches_attempted += 1;
            let committed = match self.repo.upsert_batch(batch).await {
                Ok(_) => {
                    outcome.inserted += batch.len() as u64;
                    debug!(
                        batch_index,
                        records = batch.len(),
                        "Batch {}/{} committed",
                        batch_index + 1,
                        total_batches
                    );
                    true
                }
                Err(e) => {
                    let failure = SyncError::BatchCommitFailed {
                        batch_index,
                        records: batch.len(),
                        message: e.to_string(),
                    };
                    error!(error = %failure, "Batch commit failed, continuing");
                    outcome.failed += batch.len() as u64;
                    outcome.failures.push(failure);
                    false
                }
            };

            on_batch(&BatchReport {
                batch_index,
                records: batch.len(),
                committed,
            })?;
        }

        info!(
            inserted = outcome.inserted,
            failed = outcome.failed,
            cancelled = outcome.cancelled,
            "Batch writes finished"
        );
        Ok(outcome)
    }
}
