//! # Common Types

/// A token identifier.
///
/// Ids are dense: a trained model's ids form `[0, vocab_size)` with no
/// gaps, partitioned between the special tokens, the alphabet leaves,
/// and the merge-rule outputs. The on-disk model format fixes the width
/// to 32 bits.
pub type TokenId = u32;

/// A Unicode scalar value.
pub type CodePoint = u32;

/// A corpus-scale occurrence count.
pub type Count = u64;

/// A pair of adjacent tokens.
pub type Pair = (TokenId, TokenId);

/// The space-marker code point (U+2581, `▁`).
///
/// Prepended to every word so that word boundaries are recoverable from
/// a token sequence alone; its UTF-8 rendering is the visible marker.
pub const SPACE_MARKER: CodePoint = 0x2581;

/// The replacement code point (U+FFFD) substituted for malformed bytes
/// during training.
pub const REPLACEMENT: CodePoint = 0xFFFD;

/// Type Alias for hash maps in this crate.
pub type CommonHashMap<K, V> = ahash::AHashMap<K, V>;

/// Type Alias for hash sets in this crate.
pub type CommonHashSet<V> = ahash::AHashSet<V>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_marker_renders_visibly() {
        let ch = char::from_u32(SPACE_MARKER).unwrap();
        assert_eq!(ch, '▁');
    }
}
