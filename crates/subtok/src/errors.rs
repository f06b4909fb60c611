//! # Error Types

use crate::types::TokenId;

/// Errors from subtok operations.
#[derive(Debug, thiserror::Error)]
pub enum SubtokError {
    /// Malformed UTF-8 encountered at inference time.
    ///
    /// Training recovers from malformed bytes by substituting the
    /// replacement code point; inference never does.
    #[error("invalid utf-8 at byte offset {offset}")]
    InvalidUtf8 {
        /// Byte offset of the offending sequence.
        offset: usize,
    },

    /// The corpus contained no words.
    #[error("empty corpus: no words found in training data")]
    EmptyCorpus,

    /// More tokens were requested than can be formed.
    #[error("vocab size {requested} cannot be reached (have {available})")]
    VocabTooLarge {
        /// The requested vocabulary size.
        requested: usize,
        /// The number of tokens actually formable.
        available: usize,
    },

    /// A reserved special id or string collides with another token.
    #[error("reserved id collision: {0}")]
    ReservedIdCollision(String),

    /// The model file does not start with the expected magic.
    #[error("model magic mismatch: not a subtok model file")]
    ModelMagicMismatch,

    /// The model file version is not supported.
    #[error("unsupported model version {version}")]
    ModelVersionUnsupported {
        /// The version found in the file.
        version: u32,
    },

    /// The model file is structurally inconsistent.
    #[error("corrupt model: {0}")]
    ModelCorrupt(String),

    /// A token id or subword string is not part of the vocabulary.
    #[error("unknown token: {0}")]
    UnknownToken(String),

    /// I/O error.
    #[error(transparent)]
    IoFailure(#[from] std::io::Error),

    /// A caller-supplied argument is out of range or inconsistent.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl SubtokError {
    /// Shorthand for an [`SubtokError::UnknownToken`] over an id.
    pub fn unknown_id(id: TokenId) -> Self {
        SubtokError::UnknownToken(format!("id {id}"))
    }
}

/// Result type for subtok operations.
pub type SubtokResult<T> = core::result::Result<T, SubtokError>;
