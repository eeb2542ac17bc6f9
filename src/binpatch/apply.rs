// Rebuilding patched classes from a baseline and a patch container.

use std::io::{Read, Seek, Write};

use super::container::{PatchContainer, Side};
use super::record::BinPatch;
use crate::archive::{ArchiveError, ClassArchive, write_zip};
use crate::checksum::adler32;
use crate::delta::{DeltaError, apply_delta};

/// Errors from applying binary patches.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error(
        "baseline does not match this patch set: {class} has checksum {actual:08x}, patch expects {expected:08x}"
    )]
    ChecksumMismatch {
        class: String,
        expected: u32,
        actual: u32,
    },
    #[error("patch for {class} expects a baseline class but none was supplied")]
    MissingBaseline { class: String },
    #[error("patch for {class} adds a new class but the baseline already contains it")]
    UnexpectedBaseline { class: String },
    #[error("corrupt delta for {class}: {source}")]
    Delta {
        class: String,
        #[source]
        source: DeltaError,
    },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
}

/// Rebuild one class from its record and the baseline bytes (if any).
pub fn apply_patch(patch: &BinPatch, baseline: Option<&[u8]>) -> Result<Vec<u8>, ApplyError> {
    let base: &[u8] = match (patch.checksum, baseline) {
        (Some(expected), Some(bytes)) => {
            let actual = adler32(bytes);
            if actual != expected {
                return Err(ApplyError::ChecksumMismatch {
                    class: patch.obf_name.clone(),
                    expected,
                    actual,
                });
            }
            bytes
        }
        (Some(_), None) => {
            return Err(ApplyError::MissingBaseline {
                class: patch.obf_name.clone(),
            });
        }
        (None, Some(_)) => {
            return Err(ApplyError::UnexpectedBaseline {
                class: patch.obf_name.clone(),
            });
        }
        (None, None) => &[],
    };
    apply_delta(base, &patch.delta).map_err(|source| ApplyError::Delta {
        class: patch.obf_name.clone(),
        source,
    })
}

/// What `patch_archive` did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Entries copied unchanged.
    pub copied: usize,
    /// Existing classes rewritten.
    pub patched: usize,
    /// New classes added.
    pub added: usize,
}

/// Rebuild a whole archive: every baseline entry is carried over, classes
/// with a record for `side` are patched, and new classes are added.
pub fn patch_archive<R, W>(
    baseline: &mut ClassArchive<R>,
    container: &PatchContainer,
    side: Side,
    out: W,
) -> Result<(W, ApplyReport), ApplyError>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut entries = baseline.read_all()?;
    let mut report = ApplyReport {
        copied: entries.len(),
        ..ApplyReport::default()
    };

    for patch in container.side(side) {
        let name = format!("{}.class", patch.obf_name);
        let existing = entries.get(&name).map(Vec::as_slice);
        let rebuilt = apply_patch(patch, existing)?;
        if existing.is_some() {
            report.patched += 1;
            report.copied -= 1;
        } else {
            report.added += 1;
        }
        log::debug!("{side}: rebuilt {} ({} bytes)", patch.target_name, rebuilt.len());
        entries.insert(name, rebuilt);
    }

    let out = write_zip(out, &entries, baseline.label())?;
    log::info!(
        "{side}: {} patched, {} added, {} copied",
        report.patched,
        report.added,
        report.copied
    );
    Ok((out, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delta::compute_delta;

    fn patch_for(clean: Option<&[u8]>, dirty: &[u8]) -> BinPatch {
        BinPatch {
            obf_name: "a".into(),
            source_name: "a".into(),
            target_name: "net.Foo".into(),
            checksum: clean.map(adler32),
            delta: compute_delta(clean.unwrap_or(&[]), dirty),
        }
    }

    #[test]
    fn rebuilds_modified_class() {
        let patch = patch_for(Some(&[1, 2, 3]), &[1, 0x99, 3]);
        assert_eq!(apply_patch(&patch, Some(&[1, 2, 3])).unwrap(), [1, 0x99, 3]);
    }

    #[test]
    fn wrong_baseline_is_rejected() {
        let patch = patch_for(Some(&[1, 2, 3]), &[1, 0x99, 3]);
        let err = apply_patch(&patch, Some(&[1, 2, 4])).unwrap_err();
        assert!(matches!(err, ApplyError::ChecksumMismatch { .. }));
        assert!(err.to_string().contains("baseline does not match"));
    }

    #[test]
    fn new_class_applies_to_nothing() {
        let patch = patch_for(None, &[0xAA, 0xBB]);
        assert_eq!(apply_patch(&patch, None).unwrap(), [0xAA, 0xBB]);
        assert!(matches!(
            apply_patch(&patch, Some(&[0xAA])),
            Err(ApplyError::UnexpectedBaseline { .. })
        ));
    }

    #[test]
    fn existing_class_needs_baseline() {
        let patch = patch_for(Some(&[1]), &[2]);
        assert!(matches!(
            apply_patch(&patch, None),
            Err(ApplyError::MissingBaseline { .. })
        ));
    }

    #[test]
    fn corrupt_delta_names_class() {
        let mut patch = patch_for(None, &[1, 2]);
        patch.delta.truncate(3);
        match apply_patch(&patch, None) {
            Err(ApplyError::Delta { class, .. }) => assert_eq!(class, "a"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
