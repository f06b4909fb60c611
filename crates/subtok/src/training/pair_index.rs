//! # Pair Index
//!
//! Aggregate pair counts, left-position sets, and per-pair version
//! counters over a [`SymbolArena`]. Heap entries snapshot a pair's
//! version; a popped entry whose snapshot is behind the current version
//! is stale and gets discarded instead of deleted in place.

use crate::training::symbol_arena::{NIL, SymbolArena};
use crate::types::{CommonHashMap, CommonHashSet, Count, Pair};

/// Pair statistics for the merge loop.
#[derive(Debug, Default, Clone)]
pub struct PairIndex {
    /// Aggregate occurrence count per pair (weighted by word counts).
    pub counts: CommonHashMap<Pair, Count>,

    /// Arena indices of the left node of each live occurrence.
    pub positions: CommonHashMap<Pair, CommonHashSet<u32>>,

    /// Monotonically increasing change counter per pair.
    pub versions: CommonHashMap<Pair, u64>,
}

impl PairIndex {
    /// Build the index from every adjacent pair in the arena.
    pub fn from_arena(arena: &SymbolArena) -> Self {
        let mut index = PairIndex::default();

        for (i, node) in arena.nodes.iter().enumerate() {
            if node.next == NIL {
                continue;
            }
            let pair = (node.token, arena.nodes[node.next as usize].token);
            let count = arena.word_counts[node.word as usize];

            *index.counts.entry(pair).or_default() += count;
            index.positions.entry(pair).or_default().insert(i as u32);
        }

        index
    }

    /// Current count of a pair.
    pub fn count(
        &self,
        pair: Pair,
    ) -> Count {
        self.counts.get(&pair).copied().unwrap_or(0)
    }

    /// Current version of a pair.
    pub fn version(
        &self,
        pair: Pair,
    ) -> u64 {
        self.versions.get(&pair).copied().unwrap_or(0)
    }

    /// Record a new occurrence of `pair` whose left node is `left_pos`.
    pub fn add(
        &mut self,
        pair: Pair,
        by: Count,
        left_pos: u32,
    ) {
        *self.counts.entry(pair).or_default() += by;
        self.positions.entry(pair).or_default().insert(left_pos);
        *self.versions.entry(pair).or_default() += 1;
    }

    /// Drop the occurrence of `pair` whose left node is `left_pos`.
    pub fn remove(
        &mut self,
        pair: Pair,
        by: Count,
        left_pos: u32,
    ) {
        if let Some(count) = self.counts.get_mut(&pair) {
            *count = count.saturating_sub(by);
        }
        if let Some(set) = self.positions.get_mut(&pair) {
            set.remove(&left_pos);
        }
        *self.versions.entry(pair).or_default() += 1;
    }

    /// Take the position set of `pair`, sorted descending.
    ///
    /// Descending order makes overlapping occurrences inside one word
    /// resolve right-to-left, and makes the application order
    /// deterministic despite the set's hashing.
    pub fn take_positions(
        &mut self,
        pair: Pair,
    ) -> Vec<u32> {
        let mut positions: Vec<u32> = self
            .positions
            .remove(&pair)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        positions.sort_unstable_by(|a, b| b.cmp(a));
        positions
    }

    /// Retire a fully-merged pair.
    pub fn clear_pair(
        &mut self,
        pair: Pair,
    ) {
        self.counts.remove(&pair);
        self.positions.remove(&pair);
        *self.versions.entry(pair).or_default() += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threads::build_pool;

    #[test]
    fn test_from_arena() {
        // "abab" x3 and "ab" x2.
        let words = vec![(vec![1, 2, 1, 2], 3), (vec![1, 2], 2)];
        let arena = SymbolArena::from_words(&words, &build_pool(1).unwrap());
        let index = PairIndex::from_arena(&arena);

        assert_eq!(index.count((1, 2)), 8);
        assert_eq!(index.count((2, 1)), 3);
        assert_eq!(index.count((2, 2)), 0);

        let mut positions: Vec<u32> =
            index.positions[&(1, 2)].iter().copied().collect();
        positions.sort();
        assert_eq!(positions, vec![0, 2, 4]);
    }

    #[test]
    fn test_add_remove_version() {
        let mut index = PairIndex::default();
        assert_eq!(index.version((1, 2)), 0);

        index.add((1, 2), 5, 0);
        index.add((1, 2), 5, 7);
        assert_eq!(index.count((1, 2)), 10);
        assert_eq!(index.version((1, 2)), 2);

        index.remove((1, 2), 5, 0);
        assert_eq!(index.count((1, 2)), 5);
        assert_eq!(index.version((1, 2)), 3);

        assert_eq!(index.take_positions((1, 2)), vec![7]);
    }

    #[test]
    fn test_take_positions_descending() {
        let mut index = PairIndex::default();
        for pos in [3, 11, 7] {
            index.add((1, 2), 1, pos);
        }
        assert_eq!(index.take_positions((1, 2)), vec![11, 7, 3]);
        assert!(index.take_positions((1, 2)).is_empty());
    }
}
