//! # Encoding
//!
//! Applies a trained model's merge rules to fresh text. Each word gets
//! its own linked list and rank-ordered candidate heap; sentences are
//! whitespace-split words concatenated (the space-marker prefix keeps
//! word boundaries recoverable); batches fan sentences out across a
//! rayon pool with input order preserved.

mod batch;
mod decoder;
mod word_encoder;

pub use batch::{
    Framing, encode_batch, encode_batch_subwords, encode_sentence, encode_sentence_subwords,
    frame_ids,
};
pub use decoder::decode_ids;
pub use word_encoder::WordEncoder;
