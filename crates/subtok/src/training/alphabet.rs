//! # Alphabet Selection

use compact_str::CompactString;

use crate::types::{CodePoint, CommonHashMap, Count};

/// The outcome of the character-coverage cutoff.
#[derive(Debug, Clone)]
pub struct AlphabetSelection {
    /// Selected code points in leaf-id order (descending frequency,
    /// ascending code point on ties).
    pub chars: Vec<CodePoint>,

    /// Number of distinct code points dropped by the cutoff.
    pub dropped: usize,

    /// Total character occurrences in the corpus.
    pub total: Count,

    /// Occurrences covered by the selected alphabet.
    pub covered: Count,
}

/// Accumulate per-code-point occurrence counts over a word-count map.
pub fn char_frequencies(
    word_counts: &CommonHashMap<CompactString, Count>,
) -> CommonHashMap<CodePoint, Count> {
    let mut freqs: CommonHashMap<CodePoint, Count> = CommonHashMap::default();
    for (word, &count) in word_counts {
        for ch in word.chars() {
            *freqs.entry(ch as CodePoint).or_default() += count;
        }
    }
    freqs
}

/// Select the alphabet reaching the requested coverage fraction.
///
/// Code points are taken in descending-frequency order until the
/// cumulative fraction of all character occurrences reaches `coverage`;
/// the remainder fall back to UNK at training time. `coverage` must
/// already be validated to lie in `(0, 1]`.
pub fn select_alphabet(
    freqs: &CommonHashMap<CodePoint, Count>,
    coverage: f64,
) -> AlphabetSelection {
    let mut ranked: Vec<(CodePoint, Count)> = freqs.iter().map(|(&cp, &c)| (cp, c)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let total: Count = ranked.iter().map(|&(_, c)| c).sum();
    let threshold = coverage * total as f64;

    let mut chars = Vec::with_capacity(ranked.len());
    let mut covered: Count = 0;
    for &(cp, count) in &ranked {
        if covered as f64 >= threshold {
            break;
        }
        chars.push(cp);
        covered += count;
    }

    AlphabetSelection {
        dropped: ranked.len() - chars.len(),
        chars,
        total,
        covered,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::WordCounter;

    fn freqs_of(text: &str) -> CommonHashMap<CodePoint, Count> {
        let mut wc = WordCounter::new();
        wc.update_from_text(text);
        char_frequencies(&wc.release())
    }

    #[test]
    fn test_char_frequencies_include_marker() {
        let freqs = freqs_of("ab ab a");
        assert_eq!(freqs[&(0x2581)], 3);
        assert_eq!(freqs[&('a' as u32)], 3);
        assert_eq!(freqs[&('b' as u32)], 2);
    }

    #[test]
    fn test_full_coverage_keeps_everything() {
        let freqs = freqs_of("aaabdaaabac");
        let selection = select_alphabet(&freqs, 1.0);

        // a:8, b:2, then count-1 ties in ascending code-point order.
        assert_eq!(
            selection.chars,
            vec!['a' as u32, 'b' as u32, 'c' as u32, 'd' as u32, 0x2581]
        );
        assert_eq!(selection.dropped, 0);
        assert_eq!(selection.covered, selection.total);
    }

    #[test]
    fn test_partial_coverage_drops_tail() {
        // 13 occurrences total (marker included); a:8 alone crosses 0.6.
        let freqs = freqs_of("aaabdaaabac");
        let selection = select_alphabet(&freqs, 0.6);

        assert_eq!(selection.chars, vec!['a' as u32]);
        assert_eq!(selection.dropped, 4);
        assert_eq!(selection.covered, 8);
        assert_eq!(selection.total, 13);
    }
}
