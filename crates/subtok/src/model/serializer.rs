//! # Model File IO
//!
//! The little-endian binary model format:
//!
//! | field | type |
//! |---|---|
//! | magic | 4 bytes, `YTTM` |
//! | version | u32, currently 1 |
//! | `n_alphabet` | u32 |
//! | alphabet | u32 code point per entry, order defines leaf ids |
//! | pad, unk, bos, eos | u32 each |
//! | `n_rules` | u32 |
//! | rules | (u32 left, u32 right, u32 result) per entry |
//! | `n_string_bytes` | u32, total bytes of all canonical strings |
//! | char table | per id: u32 length + UTF-8 bytes |
//!
//! Loading re-assembles the model from the alphabet/specials/rules and
//! then cross-checks the stored char table against the recomputed
//! strings, so every merge rule's concatenation invariant is verified
//! on every load.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::errors::{SubtokError, SubtokResult};
use crate::model::{MergeRule, Model, SpecialIds};

const MAGIC: [u8; 4] = *b"YTTM";
const VERSION: u32 = 1;

fn write_u32<W: Write>(
    writer: &mut W,
    value: u32,
) -> SubtokResult<()> {
    writer.write_all(&value.to_le_bytes())?;
    Ok(())
}

fn read_u32<R: Read>(reader: &mut R) -> SubtokResult<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

/// Save a [`Model`] to a writer.
pub fn save_model_writer<W: Write>(
    model: &Model,
    writer: &mut W,
) -> SubtokResult<()> {
    writer.write_all(&MAGIC)?;
    write_u32(writer, VERSION)?;

    write_u32(writer, model.alphabet().len() as u32)?;
    for &cp in model.alphabet() {
        write_u32(writer, cp)?;
    }

    for id in model.specials().ids() {
        write_u32(writer, id)?;
    }

    write_u32(writer, model.rules().len() as u32)?;
    for rule in model.rules() {
        write_u32(writer, rule.left)?;
        write_u32(writer, rule.right)?;
        write_u32(writer, rule.result)?;
    }

    let strings = model.vocab_strings();
    let total_bytes: usize = strings.iter().map(|s| s.len()).sum();
    write_u32(writer, total_bytes as u32)?;
    for s in strings {
        write_u32(writer, s.len() as u32)?;
        writer.write_all(s.as_bytes())?;
    }

    Ok(())
}

/// Save a [`Model`] to a file path.
pub fn save_model_path<P: AsRef<Path>>(
    model: &Model,
    path: P,
) -> SubtokResult<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    save_model_writer(model, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Load a [`Model`] from a reader, validating all invariants.
pub fn load_model_reader<R: Read>(reader: &mut R) -> SubtokResult<Model> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(SubtokError::ModelMagicMismatch);
    }

    let version = read_u32(reader)?;
    if version != VERSION {
        return Err(SubtokError::ModelVersionUnsupported { version });
    }

    let n_alphabet = read_u32(reader)? as usize;
    let mut alphabet = Vec::with_capacity(n_alphabet);
    for _ in 0..n_alphabet {
        alphabet.push(read_u32(reader)?);
    }

    let specials = SpecialIds {
        pad: read_u32(reader)?,
        unk: read_u32(reader)?,
        bos: read_u32(reader)?,
        eos: read_u32(reader)?,
    };

    let n_rules = read_u32(reader)? as usize;
    let mut rules = Vec::with_capacity(n_rules);
    for _ in 0..n_rules {
        rules.push(MergeRule {
            left: read_u32(reader)?,
            right: read_u32(reader)?,
            result: read_u32(reader)?,
        });
    }

    let model = Model::assemble(alphabet, specials, rules)?;

    // Cross-check the stored char table against the recomputed strings;
    // this is what enforces subword(o) == subword(l) + subword(r) for a
    // file of unknown provenance.
    let n_string_bytes = read_u32(reader)? as usize;
    let mut seen_bytes = 0usize;
    for (id, expected) in model.vocab_strings().iter().enumerate() {
        let len = read_u32(reader)? as usize;
        let mut buf = vec![0u8; len];
        reader.read_exact(&mut buf)?;
        seen_bytes += len;

        if buf != expected.as_bytes() {
            return Err(SubtokError::ModelCorrupt(format!(
                "char table mismatch at id {id}"
            )));
        }
    }
    if seen_bytes != n_string_bytes {
        return Err(SubtokError::ModelCorrupt(format!(
            "char table length {seen_bytes} != declared {n_string_bytes}"
        )));
    }

    Ok(model)
}

/// Load a [`Model`] from a file path.
pub fn load_model_path<P: AsRef<Path>>(path: P) -> SubtokResult<Model> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    load_model_reader(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_model() -> Model {
        Model::assemble(
            vec!['a' as u32, 'b' as u32, 0x2581],
            SpecialIds::default(),
            vec![
                MergeRule { left: 4, right: 5, result: 7 },
                MergeRule { left: 6, right: 7, result: 8 },
            ],
        )
        .unwrap()
    }

    fn to_bytes(model: &Model) -> Vec<u8> {
        let mut bytes = vec![];
        save_model_writer(model, &mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_roundtrip_in_memory() {
        let model = tiny_model();
        let bytes = to_bytes(&model);

        let loaded = load_model_reader(&mut bytes.as_slice()).unwrap();
        assert_eq!(loaded.alphabet(), model.alphabet());
        assert_eq!(loaded.specials(), model.specials());
        assert_eq!(loaded.rules(), model.rules());
        assert_eq!(loaded.vocab_strings(), model.vocab_strings());
    }

    #[test]
    fn test_roundtrip_on_disk() {
        let dir = tempdir::TempDir::new("subtok_model").unwrap();
        let path = dir.path().join("model.bin");

        let model = tiny_model();
        save_model_path(&model, &path).unwrap();
        let loaded = load_model_path(&path).unwrap();

        assert_eq!(loaded.vocab_strings(), model.vocab_strings());
    }

    #[test]
    fn test_magic_mismatch() {
        let mut bytes = to_bytes(&tiny_model());
        bytes[0] = b'X';
        let err = load_model_reader(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, SubtokError::ModelMagicMismatch));
    }

    #[test]
    fn test_version_unsupported() {
        let mut bytes = to_bytes(&tiny_model());
        bytes[4] = 9;
        let err = load_model_reader(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(
            err,
            SubtokError::ModelVersionUnsupported { version: 9 }
        ));
    }

    #[test]
    fn test_corrupt_char_table() {
        let mut bytes = to_bytes(&tiny_model());
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = load_model_reader(&mut bytes.as_slice()).unwrap_err();
        assert!(matches!(err, SubtokError::ModelCorrupt(_)));
    }

    #[test]
    fn test_truncated_file() {
        let bytes = to_bytes(&tiny_model());
        let err = load_model_reader(&mut &bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, SubtokError::IoFailure(_)));
    }
}
