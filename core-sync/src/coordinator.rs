//! # Sync Coordinator
//!
//! Runs one reconciliation pass from a source into the episode store.
//!
//! ## Workflow
//!
//! 1. Fetch every candidate from the `EpisodeSource`
//! 2. Validate candidates into `ValidatedCandidate`s
//! 3. Snapshot the persisted ids (`ExistingIdIndex`)
//! 4. Snapshot the arc table (`ArcRangeIndex`)
//! 5. Diff candidates against the id snapshot
//! 6. Attach an arc to each new record
//! 7. Write records in isolated batches
//!
//! Steps 1, 3, 4 and 7 suspend; each of them observes the cancellation token.
//! Both indexes are built before any write, so a store failure while reading
//! them leaves the store untouched.
//!
//! The coordinator owns the run's [`SyncStats`]. Every exit path finalizes it
//! exactly once: completed, failed or cancelled. Fatal errors come back as a
//! [`SyncFailure`] carrying the partial counts.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let coordinator = SyncCoordinator::new(source, episodes, arcs, Arc::new(SystemClock))
//!     .with_run_repository(runs)
//!     .with_config(SyncConfig::default());
//!
//! let stats = coordinator.run(CancellationToken::new()).await?;
//! println!("{} new, {} inserted", stats.new_found(), stats.inserted());
//! ```

use crate::arc_assigner::assign_all;
use crate::arc_index::ArcRangeIndex;
use crate::batch_writer::{BatchWriter, DEFAULT_BATCH_SIZE};
use crate::candidate::validate_candidates;
use crate::existing_ids::{ExistingIdIndex, DEFAULT_ID_PAGE_SIZE};
use crate::reconciler::diff;
use crate::repository::{SyncRun, SyncRunRepository};
use crate::stats::{RunOutcome, SyncStats};
use crate::{Result, SyncError, SyncFailure};
use bridge_traits::{Clock, EpisodeSource};
use core_library::repositories::{ArcRepository, EpisodeRepository};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Sync coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Records per upsert transaction
    pub batch_size: usize,

    /// Ids per page when scanning the store
    pub id_page_size: u32,

    /// Timeout for the entire run (seconds)
    pub sync_timeout_secs: u64,

    /// Write every valid candidate, not just the new ones
    pub force_update: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            id_page_size: DEFAULT_ID_PAGE_SIZE,
            sync_timeout_secs: 3600, // 1 hour
            force_update: false,
        }
    }
}

impl SyncConfig {
    /// Check the configuration is usable
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Config`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(SyncError::Config(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.id_page_size == 0 {
            return Err(SyncError::Config(
                "id_page_size must be greater than zero".to_string(),
            ));
        }
        if self.sync_timeout_secs == 0 {
            return Err(SyncError::Config(
                "sync_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Orchestrates a single sync run
pub struct SyncCoordinator {
    source: Arc<dyn EpisodeSource>,
    episodes: Arc<dyn EpisodeRepository>,
    arcs: Arc<dyn ArcRepository>,
    runs: Option<Arc<dyn SyncRunRepository>>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
}

impl SyncCoordinator {
    pub fn new(
        source: Arc<dyn EpisodeSource>,
        episodes: Arc<dyn EpisodeRepository>,
        arcs: Arc<dyn ArcRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            source,
            episodes,
            arcs,
            runs: None,
            clock,
            config: SyncConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Record every finalized run in `runs`
    pub fn with_run_repository(mut self, runs: Arc<dyn SyncRunRepository>) -> Self {
        self.runs = Some(runs);
        self
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one sync pass
    ///
    /// Completed runs return their stats even when batches failed or records
    /// were left without an arc; callers check
    /// [`SyncStats::is_degraded`] for that.
    ///
    /// # Errors
    ///
    /// Returns a [`SyncFailure`] for source and store outages, cancellation
    /// and timeout. Its stats are finalized with whatever was counted before
    /// the failure.
    #[instrument(skip(self, cancel), fields(source = %self.source.name(), force = self.config.force_update))]
    pub async fn run(&self, cancel: CancellationToken) -> std::result::Result<SyncStats, SyncFailure> {
        let mut stats = SyncStats::new(self.source.name());

        if let Err(e) = self.config.validate() {
            error!(error = %e, "Invalid sync configuration");
            return Err(self.fail(stats, e).await);
        }

        if let Err(e) = stats.start(self.clock.now()) {
            return Err(self.fail(stats, e).await);
        }
        info!(run_id = %stats.run_id, "Starting episode sync");

        let result = timeout(
            Duration::from_secs(self.config.sync_timeout_secs),
            self.execute(&mut stats, &cancel),
        )
        .await;

        match result {
            Ok(Ok(())) => {
                if let Err(e) = stats.finalize(self.clock.now(), RunOutcome::Completed, None) {
                    return Err(SyncFailure::new(e, stats));
                }
                self.record_run(&stats).await;
                log_summary(&stats);
                Ok(stats)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Sync run failed");
                Err(self.fail(stats, e).await)
            }
            Err(_) => {
                error!(
                    timeout_secs = self.config.sync_timeout_secs,
                    "Sync run timed out"
                );
                Err(self
                    .fail(stats, SyncError::Timeout(self.config.sync_timeout_secs))
                    .await)
            }
        }
    }

    /// Execute the pipeline, folding stage outcomes into `stats`
    async fn execute(&self, stats: &mut SyncStats, cancel: &CancellationToken) -> Result<()> {
        // Phase 1: Fetch
        info!("Phase 1: Fetching candidates from {}", self.source.name());
        let raw = until_cancelled(cancel, async {
            self.source.fetch_candidates().await.map_err(|e| {
                SyncError::SourceUnavailable(format!("{}: {}", self.source.name(), e))
            })
        })
        .await?;
        stats.record_seen(raw.len() as u64)?;
        info!("Fetched {} candidates", raw.len());

        // Phase 2: Validate
        info!("Phase 2: Validating candidates");
        let validation = validate_candidates(raw);
        stats.record_rejected(validation.rejected.len() as u64)?;
        if !validation.duplicate_ids.is_empty() {
            warn!(
                duplicates = validation.duplicate_ids.len(),
                "Source returned duplicate episode ids"
            );
        }
        if validation.accepted.is_empty() {
            warn!("No valid candidates to process");
            return Ok(());
        }

        // Phase 3: Snapshot the store
        info!("Phase 3: Loading existing ids and arc ranges");
        let existing = until_cancelled(
            cancel,
            ExistingIdIndex::load(self.episodes.as_ref(), self.config.id_page_size),
        )
        .await?;
        stats.record_existing(existing.len() as u64)?;
        debug!(
            existing = existing.len(),
            page_reads = existing.page_reads(),
            "Existing id snapshot taken"
        );

        let arc_index = until_cancelled(cancel, ArcRangeIndex::load(self.arcs.as_ref())).await?;
        if arc_index.fallback().is_none() {
            warn!("No fallback arc registered; unmatched episodes will have no arc");
        }

        // Phase 4: Reconcile
        let to_write = if self.config.force_update {
            info!("Phase 4: Force update enabled, writing all {} candidates", validation.accepted.len());
            validation.accepted
        } else {
            info!("Phase 4: Reconciling against the store");
            diff(validation.accepted, &existing)
        };
        stats.record_new(to_write.len() as u64)?;

        if to_write.is_empty() {
            info!("No new episodes found, store is up to date");
            return Ok(());
        }
        info!("Found {} episodes to write", to_write.len());

        // Phase 5: Assign arcs
        info!("Phase 5: Assigning arcs");
        let assignment = assign_all(to_write, &arc_index);
        for unresolved in &assignment.unresolved {
            warn!(error = %unresolved, "Writing episode without an arc");
        }
        stats.record_unassigned(assignment.unassigned())?;

        // Phase 6: Write
        info!(
            "Phase 6: Writing {} records in batches of {}",
            assignment.records.len(),
            self.config.batch_size
        );
        let writer = BatchWriter::new(Arc::clone(&self.episodes))
            .with_batch_size(self.config.batch_size);
        let outcome = until_cancelled(
            cancel,
            writer.commit_with_progress(&assignment.records, cancel, |report| {
                if report.committed {
                    stats.record_inserted(report.records as u64)
                } else {
                    stats.record_failed(report.records as u64)
                }
            }),
        )
        .await?;

        if outcome.cancelled {
            return Err(SyncError::Cancelled);
        }

        Ok(())
    }

    /// Finalize `stats` as failed or cancelled and wrap them with `error`
    async fn fail(&self, mut stats: SyncStats, error: SyncError) -> SyncFailure {
        let outcome = match error {
            SyncError::Cancelled => RunOutcome::Cancelled,
            _ => RunOutcome::Failed,
        };

        if stats.started_at().is_none() {
            // Failed before start; give the record a zero-length window.
            let now = self.clock.now();
            if let Err(e) = stats.start(now) {
                warn!(error = %e, "Could not start stats for failed run");
            }
        }

        match stats.finalize(self.clock.now(), outcome, Some(error.to_string())) {
            Ok(()) => self.record_run(&stats).await,
            Err(e) => warn!(error = %e, "Could not finalize stats for failed run"),
        }

        if outcome == RunOutcome::Cancelled {
            warn!(
                inserted = stats.inserted(),
                failed = stats.failed(),
                "Sync cancelled, committed batches are kept"
            );
        }

        SyncFailure::new(error, stats)
    }

    /// Store the run summary; a failure here never changes the run result
    async fn record_run(&self, stats: &SyncStats) {
        let Some(runs) = &self.runs else {
            return;
        };

        let result = match SyncRun::from_stats(stats) {
            Ok(run) => runs.insert(&run).await,
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            warn!(run_id = %stats.run_id, error = %e, "Failed to record sync run");
        }
    }
}

/// Race `fut` against cancellation
async fn until_cancelled<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SyncError::Cancelled),
        result = fut => result,
    }
}

fn log_summary(stats: &SyncStats) {
    let duration_ms = stats.duration().map(|d| d.num_milliseconds()).unwrap_or(0);
    info!(
        run_id = %stats.run_id,
        episodes_seen = stats.episodes_seen(),
        rejected = stats.rejected(),
        existing_in_store = stats.existing_in_store(),
        new_found = stats.new_found(),
        inserted = stats.inserted(),
        failed = stats.failed(),
        unassigned = stats.unassigned(),
        duration_ms,
        "Sync completed: {} inserted of {} new ({:.1}% success)",
        stats.inserted(),
        stats.new_found(),
        stats.success_rate() * 100.0
    );

    if stats.is_degraded() {
        warn!(
            failed = stats.failed(),
            unassigned = stats.unassigned(),
            "Sync completed with degraded results"
        );
    }
}

// ============================================================================
// Tests
// ============================================================================
