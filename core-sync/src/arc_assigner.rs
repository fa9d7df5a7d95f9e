//! Arc assignment for new records

use crate::arc_index::{ArcRangeIndex, Resolution};
use crate::SyncError;
use core_library::{PersistedRecord, ValidatedCandidate};

/// Records ready to write, plus the ones that ended up without an arc
#[derive(Debug, Default)]
pub struct AssignmentOutcome {
    pub records: Vec<PersistedRecord>,
    /// One `ArcUnresolved` per record written without an arc
    pub unresolved: Vec<SyncError>,
}

impl AssignmentOutcome {
    pub fn unassigned(&self) -> u64 {
        self.unresolved.len() as u64
    }
}

/// Attach an arc to one candidate
///
/// An unresolved id still yields a record, with `arc_id = None`.
pub fn assign(candidate: ValidatedCandidate, index: &ArcRangeIndex) -> (PersistedRecord, Resolution) {
    let resolution = index.resolve(candidate.id);
    (
        PersistedRecord::from_candidate(candidate, resolution.arc_id()),
        resolution,
    )
}

/// Assign every candidate in order
pub fn assign_all(candidates: Vec<ValidatedCandidate>, index: &ArcRangeIndex) -> AssignmentOutcome {
    let mut outcome = AssignmentOutcome {
        records: Vec::with_capacity(candidates.len()),
        ..AssignmentOutcome::default()
    };

    for candidate in candidates {
        let (record, resolution) = assign(candidate, index);
        if resolution == Resolution::Unassigned {
            outcome
                .unresolved
                .push(SyncError::ArcUnresolved { episode_id: record.id });
        }
        outcome.records.push(record);
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_library::{ArcRange, FALLBACK_ARC_NAME};

    fn candidate(id: i64) -> ValidatedCandidate {
        ValidatedCandidate {
            id,
            title: format!("Episode {}", id),
            release_date: None,
        }
    }

    #[test]
    fn test_assign_with_fallback() {
        let index = ArcRangeIndex::from_ranges(vec![
            ArcRange::new(1, "Arc1", 1, 2),
            ArcRange::new(0, FALLBACK_ARC_NAME, 0, 0),
        ]);

        let outcome = assign_all(vec![candidate(1), candidate(3)], &index);

        assert_eq!(outcome.unassigned(), 0);
        assert!(outcome.unresolved.is_empty());
        assert_eq!(outcome.records[0].arc_id, Some(1));
        assert_eq!(outcome.records[1].arc_id, Some(0));
        assert!(outcome.records.iter().all(|r| r.created_at.is_none()));
    }

    #[test]
    fn test_unassigned_records_are_forwarded() {
        let index = ArcRangeIndex::from_ranges(vec![ArcRange::new(1, "Arc1", 1, 2)]);

        let outcome = assign_all(vec![candidate(2), candidate(9), candidate(10)], &index);

        assert_eq!(outcome.records.len(), 3);
        assert_eq!(outcome.unassigned(), 2);
        assert!(matches!(
            outcome.unresolved[..],
            [
                SyncError::ArcUnresolved { episode_id: 9 },
                SyncError::ArcUnresolved { episode_id: 10 }
            ]
        ));
        assert_eq!(outcome.records[1].arc_id, None);
        assert_eq!(outcome.records[1].title, "Episode 9");
    }

    #[test]
    fn test_assign_does_not_touch_index() {
        let index = ArcRangeIndex::from_ranges(vec![ArcRange::new(1, "Arc1", 1, 2)]);
        let before = index.clone();

        let (record, resolution) = assign(candidate(1), &index);
        let (orphan, unmatched) = assign(candidate(7), &index);

        assert_eq!(record.arc_id, Some(1));
        assert_eq!(resolution, Resolution::Matched(1));
        assert_eq!(orphan.arc_id, None);
        assert_eq!(unmatched, Resolution::Unassigned);
        assert_eq!(index, before);
    }
}
