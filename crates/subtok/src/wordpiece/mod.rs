//! # WordPiece Encoder
//!
//! Greedy longest-match tokenization against an externally supplied
//! vocabulary. Entries starting with `##` are continuations and match
//! only inside a word; all other entries match only at a word start.
//! Matching runs on two anchored leftmost-longest Aho-Corasick
//! automata, so each word scans in linear time while agreeing with the
//! naive longest-match oracle.

use std::io::{BufRead, BufReader};
use std::path::Path;

use aho_corasick::{AhoCorasick, Anchored, Input, MatchKind, StartKind};
use rayon::prelude::*;

use crate::chunking::split_chunks;
use crate::errors::{SubtokError, SubtokResult};
use crate::types::CommonHashSet;
use crate::unicode::{is_punct, is_space};

/// The id emitted for a word the vocabulary cannot resolve.
pub const UNRESOLVED: i32 = -1;

const CONTINUATION_MARK: &str = "##";

/// A WordPiece vocabulary split into prefix and continuation automata.
///
/// Ids are line indices into the supplied entry list; duplicate
/// surface forms keep their first id.
pub struct WordPieceVocab {
    n_entries: usize,
    prefix_ac: AhoCorasick,
    prefix_ids: Vec<i32>,
    continuation_ac: AhoCorasick,
    continuation_ids: Vec<i32>,
}

fn build_anchored(patterns: &[String]) -> SubtokResult<AhoCorasick> {
    AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .start_kind(StartKind::Anchored)
        .build(patterns)
        .map_err(|e| SubtokError::InvalidArgument(format!("wordpiece vocab: {e}")))
}

impl WordPieceVocab {
    /// Build from vocabulary entries in id order.
    pub fn from_entries<I>(entries: I) -> SubtokResult<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut prefix_patterns: Vec<String> = vec![];
        let mut prefix_ids: Vec<i32> = vec![];
        let mut continuation_patterns: Vec<String> = vec![];
        let mut continuation_ids: Vec<i32> = vec![];
        let mut seen: CommonHashSet<String> = CommonHashSet::default();

        let mut n_entries = 0usize;
        for (id, entry) in entries.into_iter().enumerate() {
            let entry = entry.as_ref();
            n_entries += 1;
            if !seen.insert(entry.to_string()) {
                continue;
            }

            match entry.strip_prefix(CONTINUATION_MARK) {
                Some(rest) if !rest.is_empty() => {
                    continuation_patterns.push(rest.to_string());
                    continuation_ids.push(id as i32);
                }
                Some(_) => {} // a bare "##" can never match
                None if !entry.is_empty() => {
                    prefix_patterns.push(entry.to_string());
                    prefix_ids.push(id as i32);
                }
                None => {}
            }
        }

        Ok(Self {
            n_entries,
            prefix_ac: build_anchored(&prefix_patterns)?,
            prefix_ids,
            continuation_ac: build_anchored(&continuation_patterns)?,
            continuation_ids,
        })
    }

    /// Load a newline-separated vocabulary file; id = line number.
    pub fn load_path<P: AsRef<Path>>(path: P) -> SubtokResult<Self> {
        let reader = BufReader::new(std::fs::File::open(path)?);
        let lines: Vec<String> = reader.lines().collect::<Result<_, _>>()?;
        Self::from_entries(lines)
    }

    /// Number of vocabulary entries.
    pub fn len(&self) -> usize {
        self.n_entries
    }

    /// Is the vocabulary empty?
    pub fn is_empty(&self) -> bool {
        self.n_entries == 0
    }

    fn longest(
        ac: &AhoCorasick,
        ids: &[i32],
        haystack: &[u8],
    ) -> Option<(i32, usize)> {
        let input = Input::new(haystack).anchored(Anchored::Yes);
        ac.find(input)
            .map(|m| (ids[m.pattern().as_usize()], m.end()))
    }

    fn longest_prefix(
        &self,
        haystack: &[u8],
    ) -> Option<(i32, usize)> {
        Self::longest(&self.prefix_ac, &self.prefix_ids, haystack)
    }

    fn longest_continuation(
        &self,
        haystack: &[u8],
    ) -> Option<(i32, usize)> {
        Self::longest(&self.continuation_ac, &self.continuation_ids, haystack)
    }
}

/// Longest-match tokenizer over a [`WordPieceVocab`].
pub struct WordPieceEncoder {
    vocab: WordPieceVocab,
}

impl WordPieceEncoder {
    /// Wrap a vocabulary.
    pub fn new(vocab: WordPieceVocab) -> Self {
        Self { vocab }
    }

    /// The wrapped vocabulary.
    pub fn vocab(&self) -> &WordPieceVocab {
        &self.vocab
    }

    /// Encode text into vocabulary ids ([`UNRESOLVED`] per failed word).
    pub fn encode(
        &self,
        text: &str,
    ) -> Vec<i32> {
        let mut out = vec![];

        let bytes = text.as_bytes();
        let mut word_start = 0usize;
        for (pos, ch) in text.char_indices() {
            let cp = ch as u32;
            if is_space(cp) || is_punct(cp) {
                if word_start < pos {
                    self.encode_word(&bytes[word_start..pos], &mut out);
                }
                if is_punct(cp) {
                    // Each punctuation code point is its own word.
                    self.encode_word(&bytes[pos..pos + ch.len_utf8()], &mut out);
                }
                word_start = pos + ch.len_utf8();
            }
        }
        if word_start < bytes.len() {
            self.encode_word(&bytes[word_start..], &mut out);
        }

        out
    }

    /// Encode raw bytes; malformed UTF-8 is a hard error.
    pub fn encode_bytes(
        &self,
        bytes: &[u8],
    ) -> SubtokResult<Vec<i32>> {
        let text = std::str::from_utf8(bytes).map_err(|e| SubtokError::InvalidUtf8 {
            offset: e.valid_up_to(),
        })?;
        Ok(self.encode(text))
    }

    /// Encode a large text across the pool's workers.
    ///
    /// The text is chunked at whitespace boundaries, so per-chunk
    /// results concatenate to exactly the serial answer.
    pub fn encode_parallel(
        &self,
        text: &str,
        pool: &rayon::ThreadPool,
    ) -> Vec<i32> {
        let bytes = text.as_bytes();
        let n_workers = pool.current_num_threads().max(1);

        let chunks: Vec<Vec<i32>> = pool.install(|| {
            split_chunks(bytes, n_workers)
                .into_par_iter()
                .map(|range| {
                    // Chunk boundaries sit on whitespace code points,
                    // so every chunk is valid UTF-8.
                    self.encode(std::str::from_utf8(&bytes[range]).unwrap_or(""))
                })
                .collect()
        });

        chunks.concat()
    }

    /// Encode a text file.
    pub fn encode_path<P: AsRef<Path>>(
        &self,
        path: P,
        pool: &rayon::ThreadPool,
    ) -> SubtokResult<Vec<i32>> {
        let bytes = std::fs::read(path)?;
        let text = std::str::from_utf8(&bytes).map_err(|e| SubtokError::InvalidUtf8 {
            offset: e.valid_up_to(),
        })?;
        Ok(self.encode_parallel(text, pool))
    }

    /// Resolve one word: longest vocabulary prefix, then repeated
    /// longest continuations; any gap collapses the whole word to a
    /// single [`UNRESOLVED`].
    fn encode_word(
        &self,
        word: &[u8],
        out: &mut Vec<i32>,
    ) {
        let Some((first, mut pos)) = self.vocab.longest_prefix(word) else {
            out.push(UNRESOLVED);
            return;
        };

        let checkpoint = out.len();
        out.push(first);
        while pos < word.len() {
            match self.vocab.longest_continuation(&word[pos..]) {
                Some((id, len)) => {
                    out.push(id);
                    pos += len;
                }
                None => {
                    out.truncate(checkpoint);
                    out.push(UNRESOLVED);
                    return;
                }
            }
        }
    }
}
