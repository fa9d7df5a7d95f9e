//! Ordered arc range table with a fallback bucket
//!
//! Ranges are sorted by `(start_episode, arc_id)` and the first range that
//! contains an id wins, so overlapping ranges resolve deterministically.

use crate::{Result, SyncError};
use core_library::repositories::ArcRepository;
use core_library::ArcRange;
use tracing::{debug, instrument, warn};

/// Outcome of looking up one episode id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// A registered range contains the id
    Matched(i64),
    /// No range matched; the fallback arc applies
    Fallback(i64),
    /// No range matched and there is no fallback arc
    Unassigned,
}

impl Resolution {
    pub fn arc_id(&self) -> Option<i64> {
        match self {
            Resolution::Matched(id) | Resolution::Fallback(id) => Some(*id),
            Resolution::Unassigned => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArcRangeIndex {
    ranges: Vec<ArcRange>,
    fallback: Option<i64>,
}

impl ArcRangeIndex {
    /// Build an index from raw arc rows
    ///
    /// Rows named like the fallback are pulled out; when there are several,
    /// the lowest `arc_id` is used. Rows with `start > end` are dropped.
    pub fn from_ranges(rows: impl IntoIterator<Item = ArcRange>) -> Self {
        let mut ranges = Vec::new();
        let mut fallbacks = Vec::new();

        for arc in rows {
            if arc.is_fallback() {
                fallbacks.push(arc.arc_id);
            } else if arc.start_episode > arc.end_episode {
                warn!(
                    arc_id = arc.arc_id,
                    name = %arc.name,
                    start = arc.start_episode,
                    end = arc.end_episode,
                    "Ignoring arc with inverted range"
                );
            } else {
                ranges.push(arc);
            }
        }

        ranges.sort_by_key(|arc| (arc.start_episode, arc.arc_id));

        let fallback = fallbacks.iter().copied().min();
        if fallbacks.len() > 1 {
            warn!(
                candidates = ?fallbacks,
                chosen = ?fallback,
                "Several fallback arcs found, using the lowest id"
            );
        }

        Self { ranges, fallback }
    }

    /// Snapshot the arc table
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::StoreUnavailable`] if the arcs cannot be read.
    /// A read failure is never treated as "no ranges".
    #[instrument(skip(repo))]
    pub async fn load(repo: &dyn ArcRepository) -> Result<Self> {
        let rows = repo.list_all().await.map_err(|e| {
            warn!(error = %e, "Failed to load arcs");
            SyncError::StoreUnavailable(format!("failed to load arcs: {}", e))
        })?;

        let index = Self::from_ranges(rows);
        debug!(
            ranges = index.ranges.len(),
            fallback = ?index.fallback,
            "Arc range index loaded"
        );
        Ok(index)
    }

    /// Find the arc for an episode id
    pub fn resolve(&self, episode_id: i64) -> Resolution {
        let candidates = self
            .ranges
            .partition_point(|arc| arc.start_episode <= episode_id);

        match self.ranges[..candidates]
            .iter()
            .find(|arc| arc.end_episode >= episode_id)
        {
            Some(arc) => Resolution::Matched(arc.arc_id),
            None => match self.fallback {
                Some(fallback) => Resolution::Fallback(fallback),
                None => Resolution::Unassigned,
            },
        }
    }

    pub fn fallback(&self) -> Option<i64> {
        self.fallback
    }

    /// Non-fallback ranges in resolution order
    pub fn ranges(&self) -> &[ArcRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryArcRepository;
    use core_library::FALLBACK_ARC_NAME;

    fn arc(id: i64, start: i64, end: i64) -> ArcRange {
        ArcRange::new(id, format!("Arc {}", id), start, end)
    }

    fn fallback(id: i64) -> ArcRange {
        ArcRange::new(id, FALLBACK_ARC_NAME, 0, 0)
    }

    #[test]
    fn test_overlap_resolves_to_lowest_start() {
        let index = ArcRangeIndex::from_ranges(vec![arc(2, 50, 150), arc(1, 1, 100)]);

        assert_eq!(index.resolve(75), Resolution::Matched(1));
        assert_eq!(index.resolve(120), Resolution::Matched(2));
    }

    #[test]
    fn test_equal_start_resolves_to_lowest_arc_id() {
        let index = ArcRangeIndex::from_ranges(vec![arc(9, 10, 20), arc(4, 10, 30)]);
        assert_eq!(index.resolve(15), Resolution::Matched(4));
    }

    #[test]
    fn test_longer_earlier_range_still_wins() {
        // The first range by start contains the id even though a later range
        // starts closer to it.
        let index = ArcRangeIndex::from_ranges(vec![arc(1, 1, 1000), arc(2, 500, 510)]);
        assert_eq!(index.resolve(505), Resolution::Matched(1));
    }

    #[test]
    fn test_bounds_are_inclusive() {
        let index = ArcRangeIndex::from_ranges(vec![arc(1, 1, 2)]);
        assert_eq!(index.resolve(1), Resolution::Matched(1));
        assert_eq!(index.resolve(2), Resolution::Matched(1));
        assert_eq!(index.resolve(3), Resolution::Unassigned);
    }

    #[test]
    fn test_fallback_guarantee() {
        let with_fallback = ArcRangeIndex::from_ranges(vec![arc(1, 1, 2), fallback(0)]);
        assert_eq!(with_fallback.resolve(3), Resolution::Fallback(0));
        assert_eq!(with_fallback.resolve(3).arc_id(), Some(0));

        let without = ArcRangeIndex::from_ranges(vec![arc(1, 1, 2)]);
        assert_eq!(without.resolve(3), Resolution::Unassigned);
        assert_eq!(without.resolve(3).arc_id(), None);
    }

    #[test]
    fn test_fallback_bounds_never_match() {
        // The seeded fallback spans 0..=0; episode 0 still falls back rather than matching.
        let index = ArcRangeIndex::from_ranges(vec![fallback(7)]);
        assert_eq!(index.resolve(0), Resolution::Fallback(7));
        assert!(index.is_empty());
    }

    #[test]
    fn test_duplicate_fallbacks_pick_lowest_id() {
        let index = ArcRangeIndex::from_ranges(vec![fallback(12), fallback(3)]);
        assert_eq!(index.fallback(), Some(3));
    }

    #[test]
    fn test_inverted_ranges_are_ignored() {
        let index = ArcRangeIndex::from_ranges(vec![arc(1, 10, 5), arc(2, 1, 20)]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.resolve(7), Resolution::Matched(2));
    }

    #[tokio::test]
    async fn test_load_failure_is_store_unavailable() {
        let repo = MemoryArcRepository::failing();
        let result = ArcRangeIndex::load(&repo).await;
        assert!(matches!(result, Err(SyncError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_load_from_repository() {
        let repo = MemoryArcRepository::new(vec![fallback(0), arc(1, 1, 2)]);
        let index = ArcRangeIndex::load(&repo).await.unwrap();

        assert_eq!(index.fallback(), Some(0));
        assert_eq!(index.resolve(2), Resolution::Matched(1));
    }
}
