//! # BPE Facade
//!
//! The public operation surface: train a model from a corpus file,
//! load/save model files, encode batches and streams, decode, and the
//! id/subword lookups. A [`Bpe`] owns an immutable [`Model`] plus the
//! worker pool every batch call runs on.

use std::fs::File;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use compact_str::CompactString;

use crate::encoding::{
    Framing, WordEncoder, decode_ids, encode_batch, encode_batch_subwords, encode_sentence,
    encode_sentence_subwords,
};
use crate::errors::{SubtokError, SubtokResult};
use crate::model::{Model, SpecialIds, load_model_path, save_model_path};
use crate::threads::{build_pool, resolve_thread_count};
use crate::training::{
    PairIndex, SymbolArena, WordCounter, char_frequencies, run_merge_loop, select_alphabet,
};
use crate::types::{Count, TokenId};
use crate::unicode::cp_to_char;

/// Training configuration.
#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Corpus file path.
    pub data: PathBuf,

    /// Output model file path.
    pub model: PathBuf,

    /// Number of tokens in the final vocabulary.
    pub vocab_size: usize,

    /// Fraction of character occurrences the alphabet must cover.
    pub coverage: f64,

    /// Worker threads; `-1` means hardware concurrency.
    pub n_threads: i32,

    /// Reserved special token ids.
    pub specials: SpecialIds,
}

impl TrainOptions {
    /// Create options with the default coverage, threads, and specials.
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(
        data: P,
        model: Q,
        vocab_size: usize,
    ) -> Self {
        Self {
            data: data.into(),
            model: model.into(),
            vocab_size,
            coverage: 1.0,
            n_threads: -1,
            specials: SpecialIds::default(),
        }
    }

    /// Set the coverage fraction.
    pub fn with_coverage(
        self,
        coverage: f64,
    ) -> Self {
        Self { coverage, ..self }
    }

    /// Set the worker thread count (`-1` = hardware concurrency).
    pub fn with_n_threads(
        self,
        n_threads: i32,
    ) -> Self {
        Self { n_threads, ..self }
    }

    /// Set the reserved special ids.
    pub fn with_specials(
        self,
        specials: SpecialIds,
    ) -> Self {
        Self { specials, ..self }
    }

    /// Validate everything checkable before touching the corpus.
    pub fn check(&self) -> SubtokResult<()> {
        if !(self.coverage > 0.0 && self.coverage <= 1.0) {
            return Err(SubtokError::InvalidArgument(format!(
                "coverage must be in (0, 1], got {}",
                self.coverage
            )));
        }
        resolve_thread_count(self.n_threads)?;
        self.specials.check_distinct()?;
        for id in self.specials.ids() {
            if id as usize >= self.vocab_size {
                return Err(SubtokError::InvalidArgument(format!(
                    "special id {id} outside [0, vocab_size={})",
                    self.vocab_size
                )));
            }
        }
        Ok(())
    }
}

/// Output mode for encoded batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputType {
    /// Numeric token ids.
    #[default]
    Id,
    /// Canonical subword strings (with the visible space-marker).
    Subword,
}

/// Per-call encoding controls.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncodeOptions {
    /// Id or subword output.
    pub output_type: OutputType,
    /// Prepend BOS.
    pub bos: bool,
    /// Append EOS.
    pub eos: bool,
    /// Reverse the sequence after BOS/EOS placement.
    pub reverse: bool,
    /// BPE-dropout probability in `[0, 1]`.
    pub dropout_prob: f64,
}

impl EncodeOptions {
    fn check(&self) -> SubtokResult<()> {
        if !(0.0..=1.0).contains(&self.dropout_prob) {
            return Err(SubtokError::InvalidArgument(format!(
                "dropout_prob must be in [0, 1], got {}",
                self.dropout_prob
            )));
        }
        Ok(())
    }

    fn framing(&self) -> Framing {
        Framing {
            bos: self.bos,
            eos: self.eos,
            reverse: self.reverse,
            dropout_prob: self.dropout_prob,
        }
    }
}

/// An encoded batch, shaped by [`OutputType`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncodedBatch {
    /// One id sequence per input sentence.
    Ids(Vec<Vec<TokenId>>),
    /// One subword sequence per input sentence.
    Subwords(Vec<Vec<String>>),
}

/// A loaded BPE model plus its worker pool.
#[derive(Debug)]
pub struct Bpe {
    model: Model,
    pool: rayon::ThreadPool,
}

impl Bpe {
    /// Wrap an assembled model with a pool of `n_threads` workers.
    pub fn from_model(
        model: Model,
        n_threads: i32,
    ) -> SubtokResult<Self> {
        let pool = build_pool(resolve_thread_count(n_threads)?)?;
        Ok(Self { model, pool })
    }

    /// Load a model file.
    pub fn load<P: AsRef<Path>>(
        path: P,
        n_threads: i32,
    ) -> SubtokResult<Self> {
        Self::from_model(load_model_path(path)?, n_threads)
    }

    /// Save the model to a file.
    pub fn save<P: AsRef<Path>>(
        &self,
        path: P,
    ) -> SubtokResult<()> {
        save_model_path(&self.model, path)
    }

    /// The underlying model.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Total number of token ids.
    pub fn vocab_size(&self) -> usize {
        self.model.vocab_size()
    }

    /// The vocabulary's printable forms in id order.
    pub fn vocab(&self) -> Vec<String> {
        self.model
            .vocab_strings()
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    /// The id of a printable form.
    pub fn subword_to_id(
        &self,
        subword: &str,
    ) -> SubtokResult<TokenId> {
        self.model
            .subword_to_id(subword)
            .ok_or_else(|| SubtokError::UnknownToken(subword.to_string()))
    }

    /// The printable form of an id.
    pub fn id_to_subword(
        &self,
        id: TokenId,
    ) -> SubtokResult<&str> {
        self.model
            .id_to_subword(id)
            .ok_or_else(|| SubtokError::unknown_id(id))
    }

    /// Encode a batch of sentences into ids.
    pub fn encode_ids<S: AsRef<str> + Sync>(
        &self,
        sentences: &[S],
        options: &EncodeOptions,
    ) -> SubtokResult<Vec<Vec<TokenId>>> {
        options.check()?;
        Ok(encode_batch(
            &self.model,
            &self.pool,
            sentences,
            &options.framing(),
        ))
    }

    /// Encode a batch of sentences, shaped by the output type.
    ///
    /// In subword mode, an uncovered character renders as itself
    /// rather than as the UNK form; id mode yields the UNK id.
    pub fn encode<S: AsRef<str> + Sync>(
        &self,
        sentences: &[S],
        options: &EncodeOptions,
    ) -> SubtokResult<EncodedBatch> {
        options.check()?;
        Ok(match options.output_type {
            OutputType::Id => EncodedBatch::Ids(encode_batch(
                &self.model,
                &self.pool,
                sentences,
                &options.framing(),
            )),
            OutputType::Subword => EncodedBatch::Subwords(encode_batch_subwords(
                &self.model,
                &self.pool,
                sentences,
                &options.framing(),
            )),
        })
    }

    /// Encode a stream line by line.
    ///
    /// Each input line is encoded and written (space-separated, one
    /// output line per input line) and flushed before the next line is
    /// read. Malformed input bytes fail with
    /// [`SubtokError::InvalidUtf8`].
    pub fn encode_stream<R: BufRead, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
        options: &EncodeOptions,
    ) -> SubtokResult<()> {
        options.check()?;
        let framing = options.framing();
        let mut scratch = WordEncoder::new();

        let mut line: Vec<u8> = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            while line.last().is_some_and(|&b| b == b'\n' || b == b'\r') {
                line.pop();
            }

            let text = std::str::from_utf8(&line).map_err(|e| SubtokError::InvalidUtf8 {
                offset: e.valid_up_to(),
            })?;

            match options.output_type {
                OutputType::Id => {
                    let ids = encode_sentence(&self.model, text, &framing, &mut scratch);
                    write_token_line(writer, ids.iter())?;
                }
                OutputType::Subword => {
                    let pieces =
                        encode_sentence_subwords(&self.model, text, &framing, &mut scratch);
                    write_token_line(writer, pieces.iter())?;
                }
            }
            writer.flush()?;
        }
        Ok(())
    }

    /// Decode ids back into text.
    pub fn decode(
        &self,
        ids: &[TokenId],
        ignore_ids: Option<&[TokenId]>,
    ) -> SubtokResult<String> {
        decode_ids(&self.model, ids, ignore_ids)
    }
}

/// Write one space-separated token line.
pub fn write_token_line<W: Write, I>(
    writer: &mut W,
    tokens: I,
) -> SubtokResult<()>
where
    I: IntoIterator,
    I::Item: core::fmt::Display,
{
    for (i, token) in tokens.into_iter().enumerate() {
        if i > 0 {
            write!(writer, " ")?;
        }
        write!(writer, "{token}")?;
    }
    writeln!(writer)?;
    Ok(())
}

/// Train a BPE model and persist it.
///
/// Validates the options, streams the corpus into word counts, selects
/// the coverage alphabet, runs the merge loop, writes the model file,
/// and returns the loaded handle.
pub fn train(options: TrainOptions) -> SubtokResult<Bpe> {
    options.check()?;

    let n_threads = resolve_thread_count(options.n_threads)?;
    let pool = build_pool(n_threads)?;

    log::info!(
        "training: corpus {:?}, vocab_size {}, coverage {}, {} threads",
        options.data,
        options.vocab_size,
        options.coverage,
        n_threads,
    );

    let mut counter = WordCounter::new();
    {
        let mut file = File::open(&options.data)?;
        counter.update_from_reader(&mut file, &pool)?;
    }
    let word_counts = counter.release();
    if word_counts.is_empty() {
        return Err(SubtokError::EmptyCorpus);
    }
    log::info!("counted {} distinct words", word_counts.len());

    let freqs = char_frequencies(&word_counts);
    let selection = select_alphabet(&freqs, options.coverage);
    log::info!(
        "alphabet: {} chars cover {}/{} occurrences ({} dropped)",
        selection.chars.len(),
        selection.covered,
        selection.total,
        selection.dropped,
    );

    let specials = options.specials;
    let n_reserved = specials.ids().len();
    if options.vocab_size < n_reserved + selection.chars.len() {
        return Err(SubtokError::InvalidArgument(format!(
            "vocab_size {} is below the minimum of {} ({} specials + {} alphabet chars)",
            options.vocab_size,
            n_reserved + selection.chars.len(),
            n_reserved,
            selection.chars.len(),
        )));
    }
    let merges_target = options.vocab_size - n_reserved - selection.chars.len();

    // Leaf id assignment: smallest free non-special ids in alphabet
    // order. The strings table feeds the merge loop's tie-break keys.
    let mut strings = vec![CompactString::default(); options.vocab_size];
    for (&id, &form) in specials.ids().iter().zip(SpecialIds::STRINGS.iter()) {
        strings[id as usize] = form.into();
    }
    let mut char_to_leaf = crate::types::CommonHashMap::default();
    let mut next_id: TokenId = 0;
    for &cp in &selection.chars {
        next_id = specials.skip_reserved(next_id);
        char_to_leaf.insert(cp, next_id);
        strings[next_id as usize] = CompactString::from(cp_to_char(cp).to_string());
        next_id += 1;
    }

    // Uncovered code points are dropped from the word-types; their
    // occurrences fall back to UNK only at encoding time.
    let word_list: Vec<(&CompactString, Count)> =
        word_counts.iter().map(|(w, &c)| (w, c)).collect();
    let words: Vec<(Vec<TokenId>, Count)> = pool.install(|| {
        use rayon::prelude::*;
        word_list
            .par_iter()
            .map(|&(word, count)| {
                let tokens: Vec<TokenId> = word
                    .chars()
                    .filter_map(|ch| char_to_leaf.get(&(ch as u32)).copied())
                    .collect();
                (tokens, count)
            })
            .filter(|(tokens, _)| !tokens.is_empty())
            .collect()
    });

    let mut arena = SymbolArena::from_words(&words, &pool);
    let mut index = PairIndex::from_arena(&arena);
    log::info!(
        "arena: {} symbol nodes, {} distinct pairs",
        arena.len(),
        index.counts.len(),
    );

    let outcome = run_merge_loop(
        &mut arena,
        &mut index,
        &mut strings,
        &specials,
        next_id,
        merges_target,
    );
    if outcome.rules.len() < merges_target {
        log::warn!(
            "corpus exhausted after {} merges; requested vocab_size {} is unreachable",
            outcome.rules.len(),
            options.vocab_size,
        );
    }

    let model = Model::assemble(selection.chars, specials, outcome.rules)?;
    save_model_path(&model, &options.model)?;
    log::info!(
        "trained model: vocab_size {}, saved to {:?}",
        model.vocab_size(),
        options.model,
    );

    Bpe::from_model(model, options.n_threads)
}
