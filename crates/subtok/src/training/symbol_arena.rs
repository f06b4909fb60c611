//! # Symbol Arena
//!
//! One flat vector of symbol nodes holds the doubly-linked token
//! sequences of every word-type. Links are `u32` indices into the
//! arena; deletions are lazy (a cleared `alive` bit), so indices held
//! by the pair position sets stay valid until re-checked.

use rayon::prelude::*;

use crate::types::{Count, Pair, TokenId};

/// Sentinel index for "no node".
pub const NIL: u32 = u32::MAX;

/// One symbol occurrence inside a word-type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolNode {
    /// The token currently occupying this position.
    pub token: TokenId,

    /// Previous node in the same word, or [`NIL`].
    pub prev: u32,

    /// Next node in the same word, or [`NIL`].
    pub next: u32,

    /// Index of the owning word-type.
    pub word: u32,

    /// Cleared when the node is absorbed by a merge.
    pub alive: bool,
}

/// The arena of all word-type symbol chains plus per-word counts.
#[derive(Debug, Clone)]
pub struct SymbolArena {
    /// All symbol nodes, word chains laid out contiguously.
    pub nodes: Vec<SymbolNode>,

    /// `word_counts[w]` is the corpus frequency of word-type `w`.
    pub word_counts: Vec<Count>,
}

impl SymbolArena {
    /// Build the arena from token sequences and their counts.
    ///
    /// Chunk-local node construction runs on the pool's workers; the
    /// chunks land in the arena in word order, so the layout does not
    /// depend on the worker count.
    pub fn from_words(
        words: &[(Vec<TokenId>, Count)],
        pool: &rayon::ThreadPool,
    ) -> Self {
        let word_counts: Vec<Count> = words.iter().map(|(_, c)| *c).collect();

        // Per-word node offsets, so workers can emit globally-correct
        // link indices without coordination.
        let mut offsets = Vec::with_capacity(words.len() + 1);
        let mut total = 0usize;
        for (tokens, _) in words {
            offsets.push(total);
            total += tokens.len();
        }
        offsets.push(total);

        let chunk_len = words.len().div_ceil(pool.current_num_threads().max(1));
        let chunks: Vec<Vec<SymbolNode>> = pool.install(|| {
            words
                .par_chunks(chunk_len.max(1))
                .enumerate()
                .map(|(chunk_idx, chunk)| {
                    let word_base = chunk_idx * chunk_len.max(1);
                    let mut nodes = Vec::with_capacity(
                        chunk.iter().map(|(t, _)| t.len()).sum(),
                    );
                    for (i, (tokens, _)) in chunk.iter().enumerate() {
                        let word = (word_base + i) as u32;
                        let base = offsets[word_base + i] as u32;
                        let len = tokens.len() as u32;
                        for (j, &token) in tokens.iter().enumerate() {
                            let j = j as u32;
                            nodes.push(SymbolNode {
                                token,
                                prev: if j == 0 { NIL } else { base + j - 1 },
                                next: if j + 1 == len { NIL } else { base + j + 1 },
                                word,
                                alive: true,
                            });
                        }
                    }
                    nodes
                })
                .collect()
        });

        let mut nodes = Vec::with_capacity(total);
        for chunk in chunks {
            nodes.extend(chunk);
        }

        Self { nodes, word_counts }
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Is the arena empty?
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Corpus frequency of the word owning `node`.
    pub fn word_count_of(
        &self,
        node: u32,
    ) -> Count {
        self.word_counts[self.nodes[node as usize].word as usize]
    }

    /// The live adjacent pair starting at `node`, if any.
    pub fn pair_at(
        &self,
        node: u32,
    ) -> Option<Pair> {
        let left = &self.nodes[node as usize];
        if !left.alive || left.next == NIL {
            return None;
        }
        Some((left.token, self.nodes[left.next as usize].token))
    }

    /// Merge the pair starting at `node` into `new_token`.
    ///
    /// The right neighbour is unlinked (lazily). Returns the indices of
    /// the surviving left neighbour and of the node following the
    /// absorbed one (either may be [`NIL`]).
    pub fn merge_at(
        &mut self,
        node: u32,
        new_token: TokenId,
    ) -> (u32, u32) {
        let right = self.nodes[node as usize].next;
        let tail = self.nodes[right as usize].next;

        self.nodes[node as usize].token = new_token;
        self.nodes[node as usize].next = tail;
        self.nodes[right as usize].alive = false;
        if tail != NIL {
            self.nodes[tail as usize].prev = node;
        }

        (self.nodes[node as usize].prev, tail)
    }

    /// Walk the live tokens of the word chain starting at arena index
    /// `head` (which must be a word's first node).
    #[cfg(test)]
    pub fn walk_word(
        &self,
        head: u32,
    ) -> Vec<TokenId> {
        let mut out = vec![];
        let mut idx = head;
        while idx != NIL {
            let node = &self.nodes[idx as usize];
            out.push(node.token);
            idx = node.next;
        }
        out
    }
}
