//! # Parallel Chunking
//!
//! Splits a byte buffer into worker-sized ranges whose boundaries fall
//! only on whitespace, so that no word (and no code point) straddles
//! two chunks and chunk-local word counting needs no cross-chunk
//! stitching.

use core::ops::Range;

use crate::unicode::{decode_next_lossy, is_space};

/// Split `buf` into at most `n_chunks` contiguous byte ranges.
///
/// Every range boundary lands at the start of a whitespace code point.
/// A tentative boundary inside a whitespace-free stretch slides forward
/// until whitespace (or end of input) is found, so fewer than
/// `n_chunks` ranges may come back. The concatenation of the returned
/// ranges always equals `0..buf.len()`.
pub fn split_chunks(
    buf: &[u8],
    n_chunks: usize,
) -> Vec<Range<usize>> {
    if buf.is_empty() {
        return vec![];
    }
    if n_chunks <= 1 {
        return vec![0..buf.len()];
    }

    let mut boundaries = Vec::with_capacity(n_chunks + 1);
    boundaries.push(0);

    for i in 1..n_chunks {
        let tentative = i * buf.len() / n_chunks;
        let boundary = seek_space_boundary(buf, tentative);
        if boundary > *boundaries.last().unwrap() && boundary < buf.len() {
            boundaries.push(boundary);
        }
    }
    boundaries.push(buf.len());

    boundaries
        .windows(2)
        .map(|w| w[0]..w[1])
        .collect()
}

/// Advance `pos` to the start of the next whitespace code point at or
/// after it, or to `buf.len()` if none remains.
fn seek_space_boundary(
    buf: &[u8],
    mut pos: usize,
) -> usize {
    // Back onto a sequence-start byte first; tentative offsets may land
    // mid code point.
    while pos < buf.len() && buf[pos] & 0xC0 == 0x80 {
        pos += 1;
    }

    while pos < buf.len() {
        let (cp, next) = decode_next_lossy(buf, pos);
        if is_space(cp) {
            return pos;
        }
        pos = next;
    }
    buf.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn concat(buf: &[u8], ranges: &[Range<usize>]) -> Vec<u8> {
        let mut out = vec![];
        for r in ranges {
            out.extend_from_slice(&buf[r.clone()]);
        }
        out
    }

    #[test]
    fn test_empty_and_single() {
        assert!(split_chunks(b"", 4).is_empty());
        assert_eq!(split_chunks(b"abc def", 1), vec![0..7]);
    }

    #[test]
    fn test_concatenation_equals_input() {
        let text = "the quick brown fox jumps over the lazy dog".repeat(8);
        for n in 1..12 {
            let ranges = split_chunks(text.as_bytes(), n);
            assert_eq!(concat(text.as_bytes(), &ranges), text.as_bytes());
            assert!(ranges.len() <= n);
        }
    }

    #[test]
    fn test_boundaries_fall_on_whitespace() {
        let text = "пример текста для разбиения на несколько кусков";
        let bytes = text.as_bytes();
        let ranges = split_chunks(bytes, 5);

        for r in &ranges[1..] {
            let (cp, _) = decode_next_lossy(bytes, r.start);
            assert!(is_space(cp), "chunk start {} not on whitespace", r.start);
        }
    }

    #[test]
    fn test_no_whitespace_extends_forward() {
        let text = "abcdefghijklmnopqrstuvwxyz";
        let ranges = split_chunks(text.as_bytes(), 4);
        assert_eq!(ranges, vec![0..text.len()]);
    }

    #[test]
    fn test_multibyte_never_split() {
        let text = "яя яя яя яя яя яя яя яя";
        let bytes = text.as_bytes();
        for n in 2..8 {
            for r in split_chunks(bytes, n) {
                assert!(std::str::from_utf8(&bytes[r]).is_ok());
            }
        }
    }
}
