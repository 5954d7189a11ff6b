//! Passage deduplication by identity

use crate::retrieval::{Passage, PassageId};
use ahash::{HashSet, HashSetExt};

/// Deduplicate passages by identity, keeping the first occurrence
///
/// # Arguments
/// * `passages` - Passages in encounter order, potentially with duplicates
///
/// # Returns
/// Deduplicated passages, maintaining encounter order
pub fn deduplicate_passages(passages: Vec<Passage>) -> Vec<Passage> {
    let mut seen: HashSet<PassageId> = HashSet::new();

    passages
        .into_iter()
        .filter(|passage| seen.insert(passage.id()))
        .collect()
}
