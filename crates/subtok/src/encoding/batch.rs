//! # Sentence and Batch Encoding

use rayon::prelude::*;

use crate::encoding::word_encoder::WordEncoder;
use crate::model::{Model, SpecialIds};
use crate::types::{CodePoint, TokenId};
use crate::unicode::{cp_to_char, is_space};

/// Framing controls shared by the sentence/batch/stream entry points.
#[derive(Debug, Clone, Copy, Default)]
pub struct Framing {
    /// Prepend the BOS id.
    pub bos: bool,
    /// Append the EOS id.
    pub eos: bool,
    /// Reverse the sequence after BOS/EOS placement.
    pub reverse: bool,
    /// BPE-dropout probability.
    pub dropout_prob: f64,
}

/// Apply BOS/EOS framing and the post-framing reversal.
pub fn frame_ids(
    mut ids: Vec<TokenId>,
    model: &Model,
    framing: &Framing,
) -> Vec<TokenId> {
    if framing.bos {
        ids.insert(0, model.specials().bos);
    }
    if framing.eos {
        ids.push(model.specials().eos);
    }
    if framing.reverse {
        ids.reverse();
    }
    ids
}

/// Encode a sentence to unframed ids: whitespace-split words, each
/// space-marked, results concatenated. Uncovered code points map to
/// UNK and land, in order, in `unknowns`.
fn encode_sentence_raw(
    model: &Model,
    sentence: &str,
    dropout_prob: f64,
    scratch: &mut WordEncoder,
    unknowns: &mut Vec<CodePoint>,
) -> Vec<TokenId> {
    let mut rng = rand::rng();
    let mut ids: Vec<TokenId> = Vec::with_capacity(sentence.len() / 4 + 2);

    let mut word: Vec<CodePoint> = Vec::new();
    for ch in sentence.chars() {
        if is_space(ch as u32) {
            if !word.is_empty() {
                scratch.encode_append(model, &word, dropout_prob, &mut rng, &mut ids, unknowns);
                word.clear();
            }
        } else {
            word.push(ch as u32);
        }
    }
    if !word.is_empty() {
        scratch.encode_append(model, &word, dropout_prob, &mut rng, &mut ids, unknowns);
    }

    ids
}

/// Encode one sentence to framed ids.
pub fn encode_sentence(
    model: &Model,
    sentence: &str,
    framing: &Framing,
    scratch: &mut WordEncoder,
) -> Vec<TokenId> {
    let mut unknowns = Vec::new();
    let ids = encode_sentence_raw(model, sentence, framing.dropout_prob, scratch, &mut unknowns);
    frame_ids(ids, model, framing)
}

/// Encode one sentence to framed subword strings.
///
/// Tokens carry their canonical printable forms, except that an UNK
/// token renders as the original uncovered character it stands for (ids
/// and unknowns line up 1:1 because UNK never merges). BOS/EOS render
/// as their special forms; reversal follows framing, as for ids.
pub fn encode_sentence_subwords(
    model: &Model,
    sentence: &str,
    framing: &Framing,
    scratch: &mut WordEncoder,
) -> Vec<String> {
    let mut unknowns = Vec::new();
    let ids = encode_sentence_raw(model, sentence, framing.dropout_prob, scratch, &mut unknowns);

    let unk = model.specials().unk;
    let mut unknowns = unknowns.into_iter();
    let mut pieces: Vec<String> = ids
        .into_iter()
        .map(|id| {
            if id == unk {
                if let Some(cp) = unknowns.next() {
                    return cp_to_char(cp).to_string();
                }
            }
            model.id_to_subword(id).unwrap_or_default().to_string()
        })
        .collect();

    if framing.bos {
        pieces.insert(0, SpecialIds::STRINGS[2].to_string());
    }
    if framing.eos {
        pieces.push(SpecialIds::STRINGS[3].to_string());
    }
    if framing.reverse {
        pieces.reverse();
    }
    pieces
}

/// Encode a batch of sentences to ids on the given pool.
///
/// Each sentence goes to exactly one worker; the output order matches
/// the input order regardless of the worker count.
pub fn encode_batch<S: AsRef<str> + Sync>(
    model: &Model,
    pool: &rayon::ThreadPool,
    sentences: &[S],
    framing: &Framing,
) -> Vec<Vec<TokenId>> {
    pool.install(|| {
        sentences
            .par_iter()
            .map(|sentence| {
                let mut scratch = WordEncoder::new();
                encode_sentence(model, sentence.as_ref(), framing, &mut scratch)
            })
            .collect()
    })
}

/// Encode a batch of sentences to subword strings on the given pool.
pub fn encode_batch_subwords<S: AsRef<str> + Sync>(
    model: &Model,
    pool: &rayon::ThreadPool,
    sentences: &[S],
    framing: &Framing,
) -> Vec<Vec<String>> {
    pool.install(|| {
        sentences
            .par_iter()
            .map(|sentence| {
                let mut scratch = WordEncoder::new();
                encode_sentence_subwords(model, sentence.as_ref(), framing, &mut scratch)
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MergeRule;
    use crate::threads::build_pool;

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

    fn plain() -> Framing {
        Framing::default()
    }

    #[test]
    fn test_sentence_concatenates_words() {
        let model = test_model();
        let mut scratch = WordEncoder::new();

        // "ab b" -> [▁ab] + [▁, b]
        let ids = encode_sentence(&model, "ab b", &plain(), &mut scratch);
        assert_eq!(ids, vec![8, 6, 5]);

        // Runs of whitespace collapse.
        let ids = encode_sentence(&model, "  ab \t b ", &plain(), &mut scratch);
        assert_eq!(ids, vec![8, 6, 5]);

        assert!(encode_sentence(&model, "", &plain(), &mut scratch).is_empty());
    }

    #[test]
    fn test_framing() {
        let model = test_model();
        let mut scratch = WordEncoder::new();

        let framing = Framing {
            bos: true,
            eos: true,
            ..plain()
        };
        let ids = encode_sentence(&model, "ab", &framing, &mut scratch);
        assert_eq!(ids, vec![2, 8, 3]);

        // Reversal happens after framing, so EOS leads.
        let framing = Framing {
            eos: true,
            reverse: true,
            ..plain()
        };
        let ids = encode_sentence(&model, "ab b", &framing, &mut scratch);
        assert_eq!(ids, vec![3, 5, 6, 8]);
    }

    #[test]
    fn test_subwords_render_unknown_chars() {
        let model = test_model();
        let mut scratch = WordEncoder::new();

        let pieces = encode_sentence_subwords(&model, "ab xa", &plain(), &mut scratch);
        assert_eq!(pieces, vec!["▁ab", "▁", "x", "a"]);

        let framing = Framing {
            bos: true,
            eos: true,
            reverse: true,
            ..plain()
        };
        let pieces = encode_sentence_subwords(&model, "xb", &framing, &mut scratch);
        assert_eq!(pieces, vec!["<EOS>", "b", "x", "▁", "<BOS>"]);
    }

    #[test]
    fn test_batch_preserves_order() {
        let model = test_model();
        let sentences: Vec<String> = (0..64)
            .map(|i| if i % 2 == 0 { "ab" } else { "b ab" }.to_string())
            .collect();

        let expected: Vec<Vec<TokenId>> = {
            let mut scratch = WordEncoder::new();
            sentences
                .iter()
                .map(|s| encode_sentence(&model, s, &plain(), &mut scratch))
                .collect()
        };

        for n in [1, 2, 7] {
            let pool = build_pool(n).unwrap();
            let batch = encode_batch(&model, &pool, &sentences, &plain());
            assert_eq!(batch, expected);
        }
    }
}
