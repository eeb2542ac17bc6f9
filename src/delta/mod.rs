// Binary delta codec.
//
// `compute_delta` turns (base, target) into a GDIFF copy/insert stream;
// `apply_delta` rebuilds the target from the same base. The stream format
// is generic and knows nothing about class files.

pub mod encoder;
pub mod gdiff;
pub mod index;

pub use encoder::{BLOCK_SIZE, Instruction, compute_delta};
pub use gdiff::Op;

use gdiff::OpReader;

/// Errors from decoding or applying a delta stream.
#[derive(Debug, thiserror::Error)]
pub enum DeltaError {
    #[error("not a GDIFF stream (bad magic)")]
    BadMagic,
    #[error("unsupported GDIFF version {0}")]
    UnsupportedVersion(u8),
    #[error("delta truncated at byte {offset} while reading {what}")]
    Truncated { offset: usize, what: &'static str },
    #[error("negative {what} in opcode at byte {offset}")]
    NegativeField { offset: usize, what: &'static str },
    #[error("copy of {len} bytes at base offset {offset} exceeds base length {base_len}")]
    CopyOutOfRange {
        offset: u64,
        len: usize,
        base_len: usize,
    },
    #[error("unexpected data after EOF at byte {offset}")]
    TrailingData { offset: usize },
}

/// Rebuild the target from `base` and a GDIFF `delta`.
///
/// Never panics on malformed input; every bounds violation is an error.
pub fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>, DeltaError> {
    let mut reader = OpReader::new(delta)?;
    let mut out = Vec::with_capacity(base.len().max(delta.len()));
    while let Some(op) = reader.next_op()? {
        match op {
            Op::Data(bytes) => out.extend_from_slice(bytes),
            Op::Copy { offset, len } => out.extend_from_slice(copy_range(base, offset, len)?),
        }
    }
    Ok(out)
}

/// Decode `delta` into instructions for inspection.
///
/// Copy ranges are not checked against any base here.
pub fn parse_instructions(delta: &[u8]) -> Result<Vec<Instruction>, DeltaError> {
    let mut reader = OpReader::new(delta)?;
    let mut out = Vec::new();
    while let Some(op) = reader.next_op()? {
        out.push(match op {
            Op::Data(bytes) => Instruction::Add { len: bytes.len() },
            Op::Copy { offset, len } => Instruction::Copy {
                offset: usize::try_from(offset).map_err(|_| DeltaError::CopyOutOfRange {
                    offset,
                    len,
                    base_len: 0,
                })?,
                len,
            },
        });
    }
    Ok(out)
}

fn copy_range(base: &[u8], offset: u64, len: usize) -> Result<&[u8], DeltaError> {
    let err = || DeltaError::CopyOutOfRange {
        offset,
        len,
        base_len: base.len(),
    };
    let start = usize::try_from(offset).map_err(|_| err())?;
    let end = start.checked_add(len).ok_or_else(err)?;
    base.get(start..end).ok_or_else(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_base_round_trip() {
        let target = [0xAA, 0xBB];
        let delta = compute_delta(&[], &target);
        assert_eq!(apply_delta(&[], &delta).unwrap(), target);
        assert_eq!(
            parse_instructions(&delta).unwrap(),
            vec![Instruction::Add { len: 2 }]
        );
    }

    #[test]
    fn empty_target_round_trip() {
        let delta = compute_delta(b"some base bytes here", &[]);
        assert_eq!(delta, [0xD1, 0xFF, 0xD1, 0xFF, 0x04, 0x00]);
        assert!(apply_delta(b"some base bytes here", &delta).unwrap().is_empty());
    }

    #[test]
    fn copy_past_end_of_base_is_an_error() {
        let mut delta = Vec::new();
        gdiff::write_header(&mut delta);
        gdiff::write_copy(&mut delta, 2, 10);
        gdiff::write_eof(&mut delta);
        assert!(matches!(
            apply_delta(&[1, 2, 3], &delta),
            Err(DeltaError::CopyOutOfRange {
                offset: 2,
                len: 10,
                base_len: 3
            })
        ));
    }

    #[test]
    fn missing_eof_is_truncation() {
        let mut delta = Vec::new();
        gdiff::write_header(&mut delta);
        gdiff::write_data(&mut delta, b"xyz");
        assert!(matches!(
            apply_delta(&[], &delta),
            Err(DeltaError::Truncated { what: "opcode", .. })
        ));
    }

    #[test]
    fn parse_reports_copies() {
        let base: Vec<u8> = (0..=255u8).cycle().take(1000).collect();
        let mut target = base.clone();
        target.truncate(600);
        let delta = compute_delta(&base, &target);
        assert_eq!(
            parse_instructions(&delta).unwrap(),
            vec![Instruction::Copy {
                offset: 0,
                len: 600
            }]
        );
    }
}
