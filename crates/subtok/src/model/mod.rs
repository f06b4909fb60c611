//! # Model Data
//!
//! The trained artifact: coverage-selected alphabet, reserved special
//! tokens, and the ordered merge-rule list, plus the derived lookup
//! tables the encoder and decoder run on. A [`Model`] is assembled
//! exactly once (by the trainer or the loader) and immutable after.

mod serializer;

pub use serializer::{load_model_path, load_model_reader, save_model_path, save_model_writer};

use compact_str::CompactString;

use crate::errors::{SubtokError, SubtokResult};
use crate::types::{CodePoint, CommonHashMap, Pair, TokenId};
use crate::unicode::cp_to_char;

/// The four reserved special token ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialIds {
    /// Padding token id.
    pub pad: TokenId,
    /// Unknown token id.
    pub unk: TokenId,
    /// Begin-of-sentence token id.
    pub bos: TokenId,
    /// End-of-sentence token id.
    pub eos: TokenId,
}

impl Default for SpecialIds {
    fn default() -> Self {
        Self {
            pad: 0,
            unk: 1,
            bos: 2,
            eos: 3,
        }
    }
}

impl SpecialIds {
    /// Printable forms, in (pad, unk, bos, eos) order.
    pub const STRINGS: [&'static str; 4] = ["<PAD>", "<UNK>", "<BOS>", "<EOS>"];

    /// The ids in (pad, unk, bos, eos) order.
    pub fn ids(&self) -> [TokenId; 4] {
        [self.pad, self.unk, self.bos, self.eos]
    }

    /// Is `id` one of the reserved ids?
    pub fn contains(
        &self,
        id: TokenId,
    ) -> bool {
        self.ids().contains(&id)
    }

    /// The largest reserved id.
    pub fn max_id(&self) -> TokenId {
        self.ids().into_iter().max().unwrap_or(0)
    }

    /// The first non-reserved id at or after `id`.
    pub fn skip_reserved(
        &self,
        mut id: TokenId,
    ) -> TokenId {
        while self.contains(id) {
            id += 1;
        }
        id
    }

    /// Fail with [`SubtokError::ReservedIdCollision`] unless all four
    /// ids are pairwise distinct.
    pub fn check_distinct(&self) -> SubtokResult<()> {
        let mut ids = self.ids();
        ids.sort_unstable();
        if ids.windows(2).any(|w| w[0] == w[1]) {
            return Err(SubtokError::ReservedIdCollision(format!(
                "special ids must be distinct, got {:?}",
                self.ids()
            )));
        }
        Ok(())
    }
}

/// One learned merge: `left` followed by `right` rewrites to `result`.
///
/// Rank is implicit in list position; lower rank merges first at
/// encoding time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRule {
    /// Left input token.
    pub left: TokenId,
    /// Right input token.
    pub right: TokenId,
    /// Output token.
    pub result: TokenId,
}

/// A trained, immutable BPE model.
#[derive(Debug, Clone)]
pub struct Model {
    alphabet: Vec<CodePoint>,
    specials: SpecialIds,
    rules: Vec<MergeRule>,

    vocab_size: usize,
    strings: Vec<CompactString>,
    char_to_id: CommonHashMap<CodePoint, TokenId>,
    rule_lookup: CommonHashMap<Pair, (u32, TokenId)>,
    rank_of_result: CommonHashMap<TokenId, u32>,
    string_to_id: CommonHashMap<CompactString, TokenId>,
}

impl Model {
    /// Assemble and validate a model from its persistent parts.
    ///
    /// Leaf ids are the smallest non-special ids in alphabet order;
    /// rule results must continue that allocation. Violations of the
    /// id-contiguity or concatenation invariants fail with
    /// [`SubtokError::ModelCorrupt`]; special-token conflicts fail with
    /// [`SubtokError::ReservedIdCollision`]; special ids that do not
    /// fit inside the produced id range fail with
    /// [`SubtokError::VocabTooLarge`].
    pub fn assemble(
        alphabet: Vec<CodePoint>,
        specials: SpecialIds,
        rules: Vec<MergeRule>,
    ) -> SubtokResult<Self> {
        specials.check_distinct()?;

        {
            let mut seen: Vec<CodePoint> = alphabet.clone();
            seen.sort_unstable();
            if seen.windows(2).any(|w| w[0] == w[1]) {
                return Err(SubtokError::ModelCorrupt(
                    "duplicate code point in alphabet".into(),
                ));
            }
        }

        // Replay the id allocation: specials are pinned, leaves take
        // the smallest free ids in alphabet order, rule results follow.
        let mut next: TokenId = 0;
        let mut alloc = || -> TokenId {
            next = specials.skip_reserved(next);
            let id = next;
            next += 1;
            id
        };

        let leaf_ids: Vec<TokenId> = alphabet.iter().map(|_| alloc()).collect();

        for rule in &rules {
            let expected = alloc();
            if rule.result != expected {
                return Err(SubtokError::ModelCorrupt(format!(
                    "rule result {} breaks id contiguity (expected {})",
                    rule.result, expected
                )));
            }
            if rule.left >= rule.result || rule.right >= rule.result {
                return Err(SubtokError::ModelCorrupt(format!(
                    "rule ({}, {}) -> {} references a later id",
                    rule.left, rule.right, rule.result
                )));
            }
        }

        // Specials sitting directly past the last allocation extend the
        // id range; specials past a gap cannot be made contiguous.
        let mut vocab_size = next;
        while specials.contains(vocab_size) {
            vocab_size += 1;
        }
        if specials.max_id() >= vocab_size {
            return Err(SubtokError::VocabTooLarge {
                requested: specials.max_id() as usize + 1,
                available: vocab_size as usize,
            });
        }
        let vocab_size = vocab_size as usize;

        let mut strings = vec![CompactString::default(); vocab_size];
        for (&id, &form) in specials.ids().iter().zip(SpecialIds::STRINGS.iter()) {
            strings[id as usize] = form.into();
        }
        for (&cp, &id) in alphabet.iter().zip(leaf_ids.iter()) {
            strings[id as usize] = CompactString::from(cp_to_char(cp).to_string());
        }
        for rule in &rules {
            let mut s = strings[rule.left as usize].clone();
            s.push_str(&strings[rule.right as usize]);
            strings[rule.result as usize] = s;
        }

        for (id, s) in strings.iter().enumerate() {
            let id = id as TokenId;
            if !specials.contains(id) && SpecialIds::STRINGS.contains(&s.as_str()) {
                return Err(SubtokError::ReservedIdCollision(format!(
                    "subword {id} collides with special token {s:?}"
                )));
            }
        }

        let char_to_id: CommonHashMap<CodePoint, TokenId> = alphabet
            .iter()
            .copied()
            .zip(leaf_ids.iter().copied())
            .collect();

        let mut rule_lookup: CommonHashMap<Pair, (u32, TokenId)> =
            CommonHashMap::with_capacity(rules.len());
        let mut rank_of_result: CommonHashMap<TokenId, u32> =
            CommonHashMap::with_capacity(rules.len());
        for (rank, rule) in rules.iter().enumerate() {
            let rank = rank as u32;
            if rule_lookup
                .insert((rule.left, rule.right), (rank, rule.result))
                .is_some()
            {
                return Err(SubtokError::ModelCorrupt(format!(
                    "duplicate merge rule for pair ({}, {})",
                    rule.left, rule.right
                )));
            }
            rank_of_result.insert(rule.result, rank);
        }

        let mut string_to_id: CommonHashMap<CompactString, TokenId> =
            CommonHashMap::with_capacity(vocab_size);
        for (id, s) in strings.iter().enumerate() {
            // First id wins when distinct merge paths spell the same
            // byte string.
            string_to_id.entry(s.clone()).or_insert(id as TokenId);
        }

        Ok(Self {
            alphabet,
            specials,
            rules,
            vocab_size,
            strings,
            char_to_id,
            rule_lookup,
            rank_of_result,
            string_to_id,
        })
    }

    /// Total number of token ids.
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    /// The reserved special ids.
    pub fn specials(&self) -> &SpecialIds {
        &self.specials
    }

    /// The alphabet code points in leaf-id order.
    pub fn alphabet(&self) -> &[CodePoint] {
        &self.alphabet
    }

    /// The merge rules in rank order.
    pub fn rules(&self) -> &[MergeRule] {
        &self.rules
    }

    /// The canonical printable form of every id, in id order.
    pub fn vocab_strings(&self) -> &[CompactString] {
        &self.strings
    }

    /// The printable form of `id`, if in range.
    pub fn id_to_subword(
        &self,
        id: TokenId,
    ) -> Option<&str> {
        self.strings.get(id as usize).map(|s| s.as_str())
    }

    /// The id of a printable form, if known.
    pub fn subword_to_id(
        &self,
        subword: &str,
    ) -> Option<TokenId> {
        self.string_to_id.get(subword).copied()
    }

    /// The leaf id of an alphabet code point.
    pub fn lookup_char(
        &self,
        cp: CodePoint,
    ) -> Option<TokenId> {
        self.char_to_id.get(&cp).copied()
    }

    /// The (rank, result) of a merge rule over `pair`.
    pub fn lookup_pair(
        &self,
        pair: Pair,
    ) -> Option<(u32, TokenId)> {
        self.rule_lookup.get(&pair).copied()
    }

    /// The rule that produced `id`, for non-leaf ids.
    pub fn rule_for(
        &self,
        id: TokenId,
    ) -> Option<&MergeRule> {
        self.rank_of_result
            .get(&id)
            .map(|&rank| &self.rules[rank as usize])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_model() -> Model {
        // Alphabet "ab▁", rules: (a,b)->ab, (▁,ab)->▁ab.
        Model::assemble(
            vec!['a' as u32, 'b' as u32, 0x2581],
            SpecialIds::default(),
            vec![
                MergeRule { left: 4, right: 5, result: 7 },
                MergeRule { left: 6, right: 7, result: 8 },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_assemble_tables() {
        let model = tiny_model();

        assert_eq!(model.vocab_size(), 9);
        assert_eq!(model.id_to_subword(0), Some("<PAD>"));
        assert_eq!(model.id_to_subword(3), Some("<EOS>"));
        assert_eq!(model.id_to_subword(4), Some("a"));
        assert_eq!(model.id_to_subword(6), Some("▁"));
        assert_eq!(model.id_to_subword(7), Some("ab"));
        assert_eq!(model.id_to_subword(8), Some("▁ab"));
        assert_eq!(model.id_to_subword(9), None);

        assert_eq!(model.subword_to_id("▁ab"), Some(8));
        assert_eq!(model.subword_to_id("<UNK>"), Some(1));
        assert_eq!(model.subword_to_id("zz"), None);

        assert_eq!(model.lookup_char('a' as u32), Some(4));
        assert_eq!(model.lookup_pair((4, 5)), Some((0, 7)));
        assert_eq!(model.lookup_pair((5, 4)), None);

        assert_eq!(model.rule_for(8), Some(&MergeRule { left: 6, right: 7, result: 8 }));
        assert_eq!(model.rule_for(4), None);
    }

    #[test]
    fn test_id_bijection() {
        let model = tiny_model();
        for id in 0..model.vocab_size() as TokenId {
            let s = model.id_to_subword(id).unwrap();
            assert_eq!(model.subword_to_id(s), Some(id));
        }
    }

    #[test]
    fn test_scattered_specials() {
        // unk parked directly past the natural end of the id range.
        let specials = SpecialIds {
            pad: 0,
            unk: 5,
            bos: 1,
            eos: 2,
        };
        let model =
            Model::assemble(vec!['a' as u32, 'b' as u32], specials, vec![]).unwrap();

        assert_eq!(model.vocab_size(), 6);
        assert_eq!(model.id_to_subword(3), Some("a"));
        assert_eq!(model.id_to_subword(4), Some("b"));
        assert_eq!(model.id_to_subword(5), Some("<UNK>"));
    }

    #[test]
    fn test_special_gap_rejected() {
        let specials = SpecialIds {
            pad: 0,
            unk: 50,
            bos: 1,
            eos: 2,
        };
        let err = Model::assemble(vec!['a' as u32], specials, vec![]).unwrap_err();
        assert!(matches!(err, SubtokError::VocabTooLarge { .. }));
    }

    #[test]
    fn test_duplicate_specials_rejected() {
        let specials = SpecialIds {
            pad: 0,
            unk: 0,
            bos: 1,
            eos: 2,
        };
        let err = Model::assemble(vec!['a' as u32], specials, vec![]).unwrap_err();
        assert!(matches!(err, SubtokError::ReservedIdCollision(_)));
    }

    #[test]
    fn test_contiguity_violation_rejected() {
        let err = Model::assemble(
            vec!['a' as u32, 'b' as u32],
            SpecialIds::default(),
            vec![MergeRule { left: 4, right: 5, result: 9 }],
        )
        .unwrap_err();
        assert!(matches!(err, SubtokError::ModelCorrupt(_)));
    }
}
