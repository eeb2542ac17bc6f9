// Binary patch records, containers and the generation/reconstruction
// pipeline.

pub mod apply;
pub mod container;
pub mod data_io;
pub mod generate;
pub mod record;
pub mod transform;

pub use apply::{ApplyError, ApplyReport, apply_patch, patch_archive};
pub use container::{PatchContainer, Side, entry_path};
pub use generate::{Baseline, BinPatchGenerator, GenerateError, GenerateOptions, GeneratedPatches};
pub use record::BinPatch;
pub use transform::{Identity, Transform, TransformChain, TransformError, transform_by_name};

#[cfg(feature = "lzma")]
pub use transform::LzmaTransform;
#[cfg(feature = "zlib")]
pub use transform::ZlibTransform;

use std::path::PathBuf;

use crate::archive::ArchiveError;

/// Errors from encoding or decoding a single record.
#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("string of {len} bytes exceeds the 65535-byte UTF limit")]
    StringTooLong { len: usize },
    #[error("delta of {len} bytes exceeds the record length limit")]
    DeltaTooLarge { len: usize },
    #[error("record truncated at byte {offset} while reading {what}")]
    Truncated { offset: usize, what: &'static str },
    #[error("malformed modified UTF-8 in {what} at byte {offset}")]
    BadUtf { offset: usize, what: &'static str },
    #[error("negative delta length {0}")]
    NegativeLength(i32),
    #[error("{count} unexpected bytes after delta")]
    TrailingBytes { count: usize },
}

/// Errors from reading or writing a patch container.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Transform(#[from] TransformError),
    #[error("bad record {path}: {source}")]
    Record {
        path: String,
        #[source]
        source: RecordError,
    },
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
