#![warn(missing_docs)]
//! # `subtok` Subword Tokenizer Suite
//!
//! An unsupervised subword tokenizer library built around Byte-Pair
//! Encoding, plus a WordPiece longest-match encoder.
//!
//! ## BPE
//!
//! Training learns an ordered list of pair-merge rules from a raw-text
//! corpus and persists them, together with the coverage-selected alphabet
//! and the reserved special tokens, as a self-contained binary model file.
//! Encoding replays those rules against fresh text.
//!
//! * [`TrainOptions`] / [`train`] - learn a model from a corpus file.
//! * [`Bpe`] - the loaded-model handle: encode, decode, vocab lookups.
//! * [`EncodeOptions`] / [`OutputType`] - per-call encoding controls
//!   (BOS/EOS framing, reversal, BPE-dropout, id vs. subword output).
//!
//! ```rust,no_run
//! use subtok::{EncodeOptions, TrainOptions};
//!
//! fn example() -> subtok::SubtokResult<()> {
//!     let bpe = subtok::train(
//!         TrainOptions::new("corpus.txt", "model.bin", 30_000),
//!     )?;
//!
//!     let _batch = bpe.encode(&["a quick brown fox"], &EncodeOptions::default())?;
//!     Ok(())
//! }
//! ```
//!
//! ## WordPiece
//!
//! [`wordpiece::WordPieceEncoder`] performs greedy longest-match
//! tokenization against an externally supplied vocabulary with `##`
//! continuation markers, using anchored Aho-Corasick automata.
//!
//! ## Determinism
//!
//! Training is deterministic for a given corpus and parameter set,
//! independent of thread count: merge selection tie-breaks on the byte
//! representation of the candidate subword, and merge application walks
//! occurrence positions in a fixed order.

pub mod chunking;
pub mod encoding;
pub mod model;
pub mod threads;
pub mod training;
pub mod unicode;
pub mod wordpiece;

mod bpe;
mod errors;
mod types;

#[doc(inline)]
pub use bpe::{
    Bpe, EncodeOptions, EncodedBatch, OutputType, TrainOptions, train, write_token_line,
};
#[doc(inline)]
pub use errors::*;
#[doc(inline)]
pub use model::{MergeRule, Model, SpecialIds};
#[doc(inline)]
pub use types::*;
