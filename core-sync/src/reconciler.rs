//! Set difference between fetched candidates and persisted ids

use crate::existing_ids::ExistingIdIndex;
use core_library::ValidatedCandidate;

/// Keep the candidates whose id is not yet persisted
///
/// Order is preserved and duplicates are left exactly as they arrived.
pub fn diff(
    candidates: Vec<ValidatedCandidate>,
    existing: &ExistingIdIndex,
) -> Vec<ValidatedCandidate> {
    candidates
        .into_iter()
        .filter(|candidate| !existing.contains(candidate.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidates(ids: &[i64]) -> Vec<ValidatedCandidate> {
        ids.iter()
            .map(|&id| ValidatedCandidate {
                id,
                title: format!("Episode {}", id),
                release_date: None,
            })
            .collect()
    }

    fn ids(list: &[ValidatedCandidate]) -> Vec<i64> {
        list.iter().map(|c| c.id).collect()
    }

    #[test]
    fn test_set_difference_preserves_order() {
        let existing = ExistingIdIndex::from_ids([2, 4]);
        let new = diff(candidates(&[5, 4, 3, 2, 1]), &existing);
        assert_eq!(ids(&new), vec![5, 3, 1]);
    }

    #[test]
    fn test_duplicates_untouched() {
        let existing = ExistingIdIndex::from_ids([2]);
        let new = diff(candidates(&[1, 1, 2, 2, 3]), &existing);
        assert_eq!(ids(&new), vec![1, 1, 3]);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(diff(Vec::new(), &ExistingIdIndex::from_ids([1])).is_empty());

        let all = diff(candidates(&[1, 2, 3]), &ExistingIdIndex::default());
        assert_eq!(ids(&all), vec![1, 2, 3]);
    }

    #[test]
    fn test_everything_known() {
        let existing = ExistingIdIndex::from_ids(1..=3);
        assert!(diff(candidates(&[1, 2, 3]), &existing).is_empty());
    }
}
