//! # Per-Word Merge Encoder
//!
//! A binary min-heap over a doubly-linked list applies the learned
//! merges to one word in O(n log n). Stale heap entries are detected by
//! comparing the stored token snapshots against the live list instead
//! of being deleted in place.

use std::collections::BinaryHeap;

use rand::Rng;

use crate::model::Model;
use crate::types::{CodePoint, SPACE_MARKER, TokenId};

const NONE: u32 = u32::MAX;

struct Node {
    token: TokenId,
    prev: u32,
    next: u32,
}

/// Heap entry representing a potential merge.
///
/// Ordered so the lowest rank pops first, and among equal ranks the
/// rightmost pair pops first - training applies overlapping
/// occurrences right-to-left, and encoding has to segment identically.
/// `left_tok` and `right_tok` are stored for O(1) stale detection.
#[derive(Eq, PartialEq)]
struct MergeCandidate {
    rank: u32,
    pos: u32,
    left_tok: TokenId,
    right_tok: TokenId,
}

impl Ord for MergeCandidate {
    fn cmp(
        &self,
        other: &Self,
    ) -> core::cmp::Ordering {
        other
            .rank
            .cmp(&self.rank)
            .then(self.pos.cmp(&other.pos))
    }
}

impl PartialOrd for MergeCandidate {
    fn partial_cmp(
        &self,
        other: &Self,
    ) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Reusable per-word scratch state.
///
/// One instance per worker; holding onto it across words reuses the
/// node and heap allocations.
pub struct WordEncoder {
    nodes: Vec<Node>,
    heap: BinaryHeap<MergeCandidate>,
}

impl Default for WordEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl WordEncoder {
    /// Create empty scratch state.
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            heap: BinaryHeap::new(),
        }
    }

    /// Encode one word (without its marker) and append the ids.
    ///
    /// The space-marker is prepended internally; code points outside
    /// the model's alphabet map to UNK and are also recorded, in input
    /// order, in `unknowns` (UNK never participates in a merge rule,
    /// so output UNK tokens correspond 1:1 to these code points). With
    /// `dropout > 0`, each popped candidate is independently rejected
    /// with that probability.
    pub fn encode_append<R: Rng>(
        &mut self,
        model: &Model,
        word: &[CodePoint],
        dropout: f64,
        rng: &mut R,
        out: &mut Vec<TokenId>,
        unknowns: &mut Vec<CodePoint>,
    ) {
        let unk = model.specials().unk;

        let n = word.len() + 1;

        // Build the linked list: marker node first, then the word.
        self.nodes.clear();
        self.nodes.reserve(n);
        for (i, cp) in core::iter::once(SPACE_MARKER)
            .chain(word.iter().copied())
            .enumerate()
        {
            let token = match model.lookup_char(cp) {
                Some(token) => token,
                None => {
                    unknowns.push(cp);
                    unk
                }
            };
            let i = i as u32;
            self.nodes.push(Node {
                token,
                prev: if i == 0 { NONE } else { i - 1 },
                next: if (i as usize) + 1 < n { i + 1 } else { NONE },
            });
        }

        // Seed the heap with every known-rule adjacent pair.
        self.heap.clear();
        for i in 0..(n - 1) {
            let left_tok = self.nodes[i].token;
            let right_tok = self.nodes[i + 1].token;
            if let Some((rank, _)) = model.lookup_pair((left_tok, right_tok)) {
                self.heap.push(MergeCandidate {
                    rank,
                    pos: i as u32,
                    left_tok,
                    right_tok,
                });
            }
        }

        while let Some(entry) = self.heap.pop() {
            let li = entry.pos as usize;

            let ri_u32 = self.nodes[li].next;
            if ri_u32 == NONE {
                continue;
            }
            let ri = ri_u32 as usize;

            // Bidirectional adjacency + token freshness.
            if self.nodes[ri].prev != entry.pos
                || self.nodes[li].token != entry.left_tok
                || self.nodes[ri].token != entry.right_tok
            {
                continue;
            }

            if dropout > 0.0 && rng.random::<f64>() < dropout {
                continue;
            }

            let Some((_, new_token)) =
                model.lookup_pair((entry.left_tok, entry.right_tok))
            else {
                continue;
            };

            // Merge: left absorbs right.
            self.nodes[li].token = new_token;
            let right_next = self.nodes[ri].next;
            self.nodes[li].next = right_next;
            if right_next != NONE {
                self.nodes[right_next as usize].prev = entry.pos;
            }

            // Enqueue the pairs newly formed on both sides.
            let left_prev = self.nodes[li].prev;
            if left_prev != NONE {
                let prev_tok = self.nodes[left_prev as usize].token;
                if let Some((rank, _)) = model.lookup_pair((prev_tok, new_token)) {
                    self.heap.push(MergeCandidate {
                        rank,
                        pos: left_prev,
                        left_tok: prev_tok,
                        right_tok: new_token,
                    });
                }
            }
            if right_next != NONE {
                let next_tok = self.nodes[right_next as usize].token;
                if let Some((rank, _)) = model.lookup_pair((new_token, next_tok)) {
                    self.heap.push(MergeCandidate {
                        rank,
                        pos: entry.pos,
                        left_tok: new_token,
                        right_tok: next_tok,
                    });
                }
            }
        }

        // The marker node is never absorbed, so the walk starts at 0.
        let mut idx = 0u32;
        while idx != NONE {
            out.push(self.nodes[idx as usize].token);
            idx = self.nodes[idx as usize].next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MergeRule, SpecialIds};

    /// Alphabet "ab▁" with rules (▁,a)->▁a and (▁a,b)->▁ab.
    fn test_model() -> Model {
        Model::assemble(
            vec!['a' as u32, 'b' as u32, 0x2581],
            SpecialIds::default(),
            vec![
                MergeRule { left: 6, right: 4, result: 7 },
                MergeRule { left: 7, right: 5, result: 8 },
            ],
        )
        .unwrap()
    }

    fn encode(
        model: &Model,
        word: &str,
        dropout: f64,
    ) -> Vec<TokenId> {
        let cps: Vec<CodePoint> = word.chars().map(|c| c as u32).collect();
        let mut enc = WordEncoder::new();
        let mut rng = rand::rng();
        let mut out = vec![];
        let mut unknowns = vec![];
        enc.encode_append(model, &cps, dropout, &mut rng, &mut out, &mut unknowns);
        out
    }

    #[test]
    fn test_greedy_merges() {
        let model = test_model();

        // ▁ + ab -> (▁a) b -> (▁ab)
        assert_eq!(encode(&model, "ab", 0.0), vec![8]);
        // ▁ + aab: (▁a) a b; no rule joins the rest.
        assert_eq!(encode(&model, "aab", 0.0), vec![7, 4, 5]);
        // ▁ + b: no rule fires.
        assert_eq!(encode(&model, "b", 0.0), vec![6, 5]);
    }

    #[test]
    fn test_unknown_chars_map_to_unk() {
        let model = test_model();
        let unk = model.specials().unk;

        let cps: Vec<CodePoint> = "axb".chars().map(|c| c as u32).collect();
        let mut enc = WordEncoder::new();
        let mut rng = rand::rng();
        let mut out = vec![];
        let mut unknowns = vec![];
        enc.encode_append(&model, &cps, 0.0, &mut rng, &mut out, &mut unknowns);

        assert_eq!(out, vec![7, unk, 5]);
        assert_eq!(unknowns, vec!['x' as u32]);
    }

    #[test]
    fn test_full_dropout_yields_leaves() {
        let model = test_model();
        assert_eq!(encode(&model, "ab", 1.0), vec![6, 4, 5]);
    }

    #[test]
    fn test_scratch_reuse() {
        let model = test_model();
        let mut enc = WordEncoder::new();
        let mut rng = rand::rng();

        for _ in 0..3 {
            let mut out = vec![];
            let mut unknowns = vec![];
            enc.encode_append(
                &model,
                &['a' as u32, 'b' as u32],
                0.0,
                &mut rng,
                &mut out,
                &mut unknowns,
            );
            assert_eq!(out, vec![8]);
            assert!(unknowns.is_empty());
        }
    }
}
