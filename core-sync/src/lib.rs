//! # Episode Sync Engine
//!
//! Reconciles the authoritative episode list from a source against the
//! persisted store and writes only what is new.
//!
//! ## Overview
//!
//! One run moves candidates through a typed pipeline:
//!
//! ```text
//! RawCandidate ─validate→ ValidatedCandidate ─diff→ new candidates ─assign→ PersistedRecord ─batch→ store
//! ```
//!
//! ## Components
//!
//! - **Existing Id Index** (`existing_ids`): Paged, all-or-nothing snapshot of persisted ids
//! - **Arc Range Index** (`arc_index`): Sorted arc ranges with a fallback bucket
//! - **Reconciler** (`reconciler`): Pure set difference over candidates
//! - **Arc Assigner** (`arc_assigner`): Attaches arcs and counts unassigned records
//! - **Batch Writer** (`batch_writer`): Failure-isolated batch upserts
//! - **Sync Stats** (`stats`): Run counters behind a small state machine
//! - **Repository** (`repository`): Persistence for finished run summaries
//! - **Sync Coordinator** (`coordinator`): Orchestrates a run end to end

pub mod arc_assigner;
pub mod arc_index;
pub mod batch_writer;
pub mod candidate;
pub mod coordinator;
pub mod error;
pub mod existing_ids;
pub mod reconciler;
pub mod repository;
pub mod stats;

#[cfg(test)]
pub(crate) mod test_support;

pub use arc_assigner::{assign, assign_all, AssignmentOutcome};
pub use arc_index::{ArcRangeIndex, Resolution};
pub use batch_writer::{BatchReport, BatchWriter, CommitOutcome, DEFAULT_BATCH_SIZE};
pub use candidate::{validate_candidates, ValidationOutcome};
pub use coordinator::{SyncConfig, SyncCoordinator};
pub use error::{Result, SyncError, SyncFailure};
pub use existing_ids::{ExistingIdIndex, DEFAULT_ID_PAGE_SIZE};
pub use reconciler::diff;
pub use repository::{SqliteSyncRunRepository, SyncRun, SyncRunRepository};
pub use stats::{RunOutcome, RunState, SyncRunId, SyncStats};
