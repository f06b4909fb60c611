//! # Word Counter

use std::io::Read;

use compact_str::CompactString;
use rayon::prelude::*;

use crate::chunking::split_chunks;
use crate::errors::SubtokResult;
use crate::types::{CommonHashMap, Count, SPACE_MARKER};
use crate::unicode::{cp_to_char, decode_next_lossy, is_space};

/// Default read-buffer size for streaming corpus ingestion.
const READ_BUFFER_SIZE: usize = 16 * 1024 * 1024;

/// Streaming word-frequency accumulator.
///
/// A "word" is a maximal run of non-whitespace code points, stored with
/// the space-marker prepended. Malformed bytes are replaced by U+FFFD
/// and counted like any other character.
pub struct WordCounter {
    /// The word counts.
    pub word_counts: CommonHashMap<CompactString, Count>,
}

impl Default for WordCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl WordCounter {
    /// Create an empty counter.
    pub fn new() -> Self {
        Self {
            word_counts: CommonHashMap::with_capacity(100_000),
        }
    }

    /// Release the word counts and return them.
    pub fn release(self) -> CommonHashMap<CompactString, Count> {
        self.word_counts
    }

    /// Update word counts inplace from a byte slice.
    pub fn update_from_bytes(
        &mut self,
        bytes: &[u8],
    ) {
        merge_shard(&mut self.word_counts, count_chunk(bytes));
    }

    /// Update word counts inplace from text.
    pub fn update_from_text<S: AsRef<str>>(
        &mut self,
        text: S,
    ) {
        self.update_from_bytes(text.as_ref().as_bytes());
    }

    /// Stream a whole reader through the counter.
    ///
    /// Reads fixed-size buffers, carries the trailing partial word to
    /// the next round, and fans each completed block out across the
    /// pool's workers (chunk-local maps, then a shard merge).
    pub fn update_from_reader<R: Read>(
        &mut self,
        reader: &mut R,
        pool: &rayon::ThreadPool,
    ) -> SubtokResult<()> {
        let n_workers = pool.current_num_threads().max(1);
        let mut carry: Vec<u8> = Vec::new();
        let mut block = vec![0u8; READ_BUFFER_SIZE];

        loop {
            let n = read_fully(reader, &mut block)?;
            if n == 0 {
                break;
            }

            let mut data = std::mem::take(&mut carry);
            data.extend_from_slice(&block[..n]);

            // Split the carry at the last ASCII whitespace byte: those
            // bytes never occur inside a multi-byte sequence, so the
            // cut is always both code-point and word safe.
            match data.iter().rposition(|&b| b.is_ascii_whitespace()) {
                Some(i) => {
                    self.count_block(&data[..=i], pool, n_workers);
                    carry = data[i + 1..].to_vec();
                }
                None => carry = data,
            }
        }

        if !carry.is_empty() {
            self.count_block(&carry, pool, n_workers);
        }
        Ok(())
    }

    fn count_block(
        &mut self,
        block: &[u8],
        pool: &rayon::ThreadPool,
        n_workers: usize,
    ) {
        if n_workers <= 1 {
            self.update_from_bytes(block);
            return;
        }

        let shards: Vec<CommonHashMap<CompactString, Count>> = pool.install(|| {
            split_chunks(block, n_workers)
                .into_par_iter()
                .map(|range| count_chunk(&block[range]))
                .collect()
        });

        for shard in shards {
            merge_shard(&mut self.word_counts, shard);
        }
    }

    /// Total number of word occurrences seen.
    pub fn total_words(&self) -> Count {
        self.word_counts.values().sum()
    }
}

fn read_fully<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
) -> SubtokResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Count the space-marked words of one chunk.
fn count_chunk(bytes: &[u8]) -> CommonHashMap<CompactString, Count> {
    let marker = cp_to_char(SPACE_MARKER);

    let mut counts: CommonHashMap<CompactString, Count> = CommonHashMap::default();
    let mut word = CompactString::default();

    let mut pos = 0;
    while pos < bytes.len() {
        let (cp, next) = decode_next_lossy(bytes, pos);
        pos = next;

        if is_space(cp) {
            if !word.is_empty() {
                *counts.entry(std::mem::take(&mut word)).or_default() += 1;
            }
        } else {
            if word.is_empty() {
                word.push(marker);
            }
            word.push(cp_to_char(cp));
        }
    }
    if !word.is_empty() {
        *counts.entry(word).or_default() += 1;
    }

    counts
}

fn merge_shard(
    into: &mut CommonHashMap<CompactString, Count>,
    shard: CommonHashMap<CompactString, Count>,
) {
    for (word, count) in shard {
        *into.entry(word).or_default() += count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threads::build_pool;

    fn sorted_counts(wc: &WordCounter) -> Vec<(String, Count)> {
        let mut counts: Vec<(String, Count)> = wc
            .word_counts
            .iter()
            .map(|(k, &v)| (k.to_string(), v))
            .collect();
        counts.sort();
        counts
    }

    #[test]
    fn test_word_counter() {
        let mut wc = WordCounter::new();
        wc.update_from_text("Hello world\nFoo world  bar\tworld");

        assert_eq!(
            sorted_counts(&wc),
            vec![
                ("▁Foo".into(), 1),
                ("▁Hello".into(), 1),
                ("▁bar".into(), 1),
                ("▁world".into(), 3),
            ]
        );
        assert_eq!(wc.total_words(), 6);
    }

    #[test]
    fn test_malformed_bytes_become_replacement() {
        let mut wc = WordCounter::new();
        wc.update_from_bytes(&[b'a', 0xFF, b'b']);

        assert_eq!(sorted_counts(&wc), vec![("▁a\u{FFFD}b".into(), 1)]);
    }

    #[test]
    fn test_update_from_reader_matches_single_shot() {
        let text = "the quick brown fox jumps over the lazy dog ".repeat(50);
        let pool = build_pool(4).unwrap();

        let mut streamed = WordCounter::new();
        streamed
            .update_from_reader(&mut text.as_bytes(), &pool)
            .unwrap();

        let mut direct = WordCounter::new();
        direct.update_from_text(&text);

        assert_eq!(sorted_counts(&streamed), sorted_counts(&direct));
    }
}
