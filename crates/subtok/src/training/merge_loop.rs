//! # Merge Loop
//!
//! The training inner loop: pop the best pair off the priority queue,
//! validate it against the authoritative index, mint the merged token,
//! and rewrite every recorded occurrence.

use core::cmp::Ordering;

use compact_str::CompactString;
use dary_heap::OctonaryHeap;

use crate::model::{MergeRule, SpecialIds};
use crate::training::pair_index::PairIndex;
use crate::training::symbol_arena::{NIL, SymbolArena};
use crate::types::{CommonHashSet, Count, Pair, TokenId};

/// Info about a [`Pair`] that could be merged.
///
/// Max-heap by count; ties break to the lexicographically greatest
/// concatenated subword bytes (then to the greatest pair, for the
/// degenerate case of two pairs spelling the same string). The version
/// snapshot is not part of the key; it only marks stale entries.
#[derive(Debug, Eq)]
struct MergeJob {
    count: Count,
    tie: CompactString,
    pair: Pair,
    version: u64,
}

impl MergeJob {
    fn heap_key(&self) -> (Count, &[u8], Pair) {
        (self.count, self.tie.as_bytes(), self.pair)
    }
}

impl PartialEq for MergeJob {
    fn eq(
        &self,
        other: &Self,
    ) -> bool {
        self.heap_key() == other.heap_key()
    }
}

impl PartialOrd for MergeJob {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MergeJob {
    fn cmp(
        &self,
        other: &Self,
    ) -> Ordering {
        self.heap_key().cmp(&other.heap_key())
    }
}

/// What the merge loop produced.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The learned rules, in rank order.
    pub rules: Vec<MergeRule>,

    /// The first unassigned non-special id after the loop.
    pub next_id: TokenId,
}

/// Allocate the next token id, skipping reserved special ids.
fn alloc_id(
    next: &mut TokenId,
    specials: &SpecialIds,
) -> TokenId {
    *next = specials.skip_reserved(*next);
    let id = *next;
    *next += 1;
    id
}

/// Run the merge loop until `merges_target` rules exist or no adjacent
/// pair remains anywhere in the corpus.
///
/// ## Arguments
/// * `arena` - the symbol chains of all word-types.
/// * `index` - pair counts/positions/versions over `arena`.
/// * `strings` - id → printable form, pre-filled for specials and
///   leaves and sized for the planned vocabulary; merged entries are
///   filled in as rules are minted.
/// * `specials` - reserved ids to skip during allocation.
/// * `first_merge_id` - the first free non-special id.
/// * `merges_target` - maximum number of rules to learn.
pub fn run_merge_loop(
    arena: &mut SymbolArena,
    index: &mut PairIndex,
    strings: &mut [CompactString],
    specials: &SpecialIds,
    first_merge_id: TokenId,
    merges_target: usize,
) -> MergeOutcome {
    let mut rules: Vec<MergeRule> = Vec::with_capacity(merges_target);
    let mut next_id = first_merge_id;

    let tie_of = |strings: &[CompactString], (l, r): Pair| {
        let mut tie = strings[l as usize].clone();
        tie.push_str(&strings[r as usize]);
        tie
    };

    log::info!("building pair heap over {} pairs", index.counts.len());
    let mut heap = OctonaryHeap::with_capacity(index.counts.len());
    for (&pair, &count) in &index.counts {
        if count > 0 {
            heap.push(MergeJob {
                count,
                tie: tie_of(strings, pair),
                pair,
                version: index.version(pair),
            });
        }
    }

    log::info!("starting merge loop: {merges_target} merges to compute");
    let mut last_log_percent = 0;

    while rules.len() < merges_target {
        let Some(job) = heap.pop() else {
            // No adjacent pair left anywhere; every word-type has
            // collapsed to a single token.
            break;
        };

        if job.version != index.version(job.pair) {
            // Stale snapshot; a fresh entry for this pair (if it is
            // still worth merging) is already in the heap.
            continue;
        }

        let (left, right) = job.pair;
        let result = alloc_id(&mut next_id, specials);

        strings[result as usize] = job.tie.clone();
        rules.push(MergeRule {
            left,
            right,
            result,
        });

        let mut changed: CommonHashSet<Pair> = CommonHashSet::default();

        for pos in index.take_positions(job.pair) {
            let node = arena.nodes[pos as usize];
            if !node.alive || node.next == NIL {
                continue;
            }
            let right_node = arena.nodes[node.next as usize];
            if node.token != left || right_node.token != right {
                continue;
            }

            let word_count = arena.word_count_of(pos);
            let prev = node.prev;
            let tail = right_node.next;

            if prev != NIL {
                let prev_pair = (arena.nodes[prev as usize].token, left);
                index.remove(prev_pair, word_count, prev);
                changed.insert(prev_pair);
            }
            if tail != NIL {
                let tail_pair = (right, arena.nodes[tail as usize].token);
                index.remove(tail_pair, word_count, node.next);
                changed.insert(tail_pair);
            }

            arena.merge_at(pos, result);

            if prev != NIL {
                let new_pair = (arena.nodes[prev as usize].token, result);
                index.add(new_pair, word_count, prev);
                changed.insert(new_pair);
            }
            if tail != NIL {
                let new_pair = (result, arena.nodes[tail as usize].token);
                index.add(new_pair, word_count, pos);
                changed.insert(new_pair);
            }
        }

        index.clear_pair(job.pair);
        changed.remove(&job.pair);

        for pair in changed {
            let count = index.count(pair);
            if count > 0 {
                heap.push(MergeJob {
                    count,
                    tie: tie_of(strings, pair),
                    pair,
                    version: index.version(pair),
                });
            }
        }

        if merges_target > 0 {
            let percent = (rules.len() * 100) / merges_target;
            if percent > last_log_percent {
                log::info!(
                    "merge progress: {percent}% ({}/{merges_target}), last {:?} -> {result} (count {})",
                    rules.len(),
                    job.pair,
                    job.count,
                );
                last_log_percent = percent;
            }
        }
    }

    log::info!("merge loop finished: {} rules", rules.len());
    MergeOutcome { rules, next_id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threads::build_pool;

    fn leaf_strings(leaves: &[(TokenId, &str)]) -> Vec<CompactString> {
        let size = leaves.iter().map(|&(id, _)| id).max().unwrap() as usize + 64;
        let mut strings = vec![CompactString::default(); size];
        for &(id, s) in leaves {
            strings[id as usize] = s.into();
        }
        strings
    }

    fn run(
        words: &[(Vec<TokenId>, Count)],
        strings: &mut [CompactString],
        merges_target: usize,
    ) -> MergeOutcome {
        let specials = SpecialIds::default();
        let mut arena = SymbolArena::from_words(words, &build_pool(1).unwrap());
        let mut index = PairIndex::from_arena(&arena);
        run_merge_loop(
            &mut arena,
            &mut index,
            strings,
            &specials,
            9,
            merges_target,
        )
    }

    #[test]
    fn test_wikipedia_word() {
        // "▁aaabdaaabac" over leaf ids a=4 b=5 c=6 d=7 marker=8.
        let mut strings =
            leaf_strings(&[(4, "a"), (5, "b"), (6, "c"), (7, "d"), (8, "▁")]);
        let word = vec![8, 4, 4, 4, 5, 7, 4, 4, 4, 5, 4, 6];

        let outcome = run(&[(word, 1)], &mut strings, 3);

        // The highest-count pair is (a,a); overlapping runs resolve
        // right-to-left so 'aaa' becomes [a, aa], and the count-2 tie
        // between "aaa" and "aab" goes to the greater byte string.
        assert_eq!(
            outcome.rules,
            vec![
                MergeRule { left: 4, right: 4, result: 9 },
                MergeRule { left: 9, right: 5, result: 10 },
                MergeRule { left: 4, right: 10, result: 11 },
            ]
        );
        assert_eq!(strings[9], "aa");
        assert_eq!(strings[10], "aab");
        assert_eq!(strings[11], "aaab");
        assert_eq!(outcome.next_id, 12);
    }

    #[test]
    fn test_unbounded_target_collapses_word() {
        // Unique pairs keep merging until the word is a single token.
        let mut strings =
            leaf_strings(&[(4, "a"), (5, "b"), (6, "c"), (7, "d"), (8, "▁")]);
        let word = vec![8, 4, 4, 4, 5, 7, 4, 4, 4, 5, 4, 6];

        let outcome = run(&[(word, 1)], &mut strings, 100);
        let last = outcome.rules.last().unwrap();
        assert_eq!(strings[last.result as usize], "▁aaabdaaabac");
    }

    #[test]
    fn test_merges_target_caps_rules() {
        let mut strings =
            leaf_strings(&[(4, "a"), (5, "b"), (6, "c"), (7, "d"), (8, "▁")]);
        let word = vec![8, 4, 4, 4, 5, 7, 4, 4, 4, 5, 4, 6];

        let outcome = run(&[(word, 1)], &mut strings, 1);
        assert_eq!(outcome.rules.len(), 1);
        assert_eq!(outcome.next_id, 10);
    }

    #[test]
    fn test_repeated_pair_word() {
        // "abab" x2: merging (a,b) twice in one word must not
        // double-apply or corrupt neighbour counts.
        let mut strings = leaf_strings(&[(4, "a"), (5, "b")]);
        let outcome = run(&[(vec![4, 5, 4, 5], 2)], &mut strings, 100);

        assert_eq!(outcome.rules[0], MergeRule { left: 4, right: 5, result: 9 });
        assert_eq!(strings[9], "ab");
        // Second rule merges the two fresh "ab" tokens.
        assert_eq!(outcome.rules[1], MergeRule { left: 9, right: 9, result: 10 });
        assert_eq!(strings[10], "abab");
        assert_eq!(outcome.rules.len(), 2);
    }

    #[test]
    fn test_count_one_pairs_still_merge() {
        // "abc" x1: ties among count-1 pairs go to the greater string,
        // so (b,c) "bc" beats (a,b) "ab".
        let mut strings = leaf_strings(&[(4, "a"), (5, "b"), (6, "c")]);
        let outcome = run(&[(vec![4, 5, 6], 1)], &mut strings, 100);

        assert_eq!(
            outcome.rules,
            vec![
                MergeRule { left: 5, right: 6, result: 9 },
                MergeRule { left: 4, right: 9, result: 10 },
            ]
        );
        assert_eq!(strings[10], "abc");
    }
}
