//! # Token Decoder

use crate::errors::{SubtokError, SubtokResult};
use crate::model::Model;
use crate::types::{CommonHashSet, TokenId};
use crate::unicode::cp_to_char;

/// Decode ids back into text.
///
/// Canonical strings are concatenated in order, ids in `ignore_ids`
/// are skipped, every space-marker becomes an ASCII space, and the
/// single leading space introduced by the first word's marker is
/// stripped. An id outside the vocabulary fails with
/// [`SubtokError::UnknownToken`].
pub fn decode_ids(
    model: &Model,
    ids: &[TokenId],
    ignore_ids: Option<&[TokenId]>,
) -> SubtokResult<String> {
    let ignore: CommonHashSet<TokenId> =
        ignore_ids.map(|ids| ids.iter().copied().collect()).unwrap_or_default();

    let mut joined = String::new();
    for &id in ids {
        if ignore.contains(&id) {
            continue;
        }
        let subword = model
            .id_to_subword(id)
            .ok_or_else(|| SubtokError::unknown_id(id))?;
        joined.push_str(subword);
    }

    let marker = cp_to_char(crate::types::SPACE_MARKER);
    let mut text = String::with_capacity(joined.len());
    for ch in joined.chars() {
        text.push(if ch == marker { ' ' } else { ch });
    }

    if joined.starts_with(marker) {
        text.remove(0);
    }
    Ok(text)
}
