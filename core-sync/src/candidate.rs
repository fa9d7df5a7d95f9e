//! Candidate validation
//!
//! Narrows `RawCandidate`s into `ValidatedCandidate`s. Rejections are
//! collected rather than raised; they never leave this stage.

use crate::SyncError;
use bridge_traits::RawCandidate;
use core_library::{LibraryError, ValidatedCandidate};
use std::collections::HashSet;
use tracing::warn;

/// Result of validating one fetched batch
#[derive(Debug, Default)]
pub struct ValidationOutcome {
    /// Accepted candidates in source order
    pub accepted: Vec<ValidatedCandidate>,
    /// One `RecordRejected` per dropped candidate
    pub rejected: Vec<SyncError>,
    /// Ids seen more than once; passed through untouched
    pub duplicate_ids: Vec<i64>,
}

/// Validate candidates in order
///
/// Duplicate ids are a fetcher bug. They are reported and logged but not
/// removed, so the store's upsert decides what the final row looks like.
pub fn validate_candidates(raw: Vec<RawCandidate>) -> ValidationOutcome {
    let mut outcome = ValidationOutcome {
        accepted: Vec::with_capacity(raw.len()),
        ..ValidationOutcome::default()
    };
    let mut seen = HashSet::with_capacity(raw.len());

    for candidate in raw {
        let raw_id = candidate.id;
        match ValidatedCandidate::try_from(candidate) {
            Ok(valid) => {
                if !seen.insert(valid.id) {
                    warn!(episode_id = valid.id, "Duplicate episode id from source");
                    outcome.duplicate_ids.push(valid.id);
                }
                outcome.accepted.push(valid);
            }
            Err(e) => {
                let reason = match e {
                    LibraryError::InvalidInput { field, message } => {
                        format!("{}: {}", field, message)
                    }
                    other => other.to_string(),
                };
                warn!(episode_id = ?raw_id, %reason, "Rejected candidate");
                outcome.rejected.push(SyncError::RecordRejected { id: raw_id, reason });
            }
        }
    }

    outcome
}
