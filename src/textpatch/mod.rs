// Unified-diff source patches.
//
//   diff      line diff (Myers) and hunk grouping
//   model     FilePatch / Hunk parsing and rendering
//   tree      directory, zip, in-memory and layered source trees
//   generate  patch directory generation with stale cleanup
//   apply     hunk placement with offset search, fuzz and canonicalisation
//   stage     chained patch sets with injected files

pub mod apply;
pub mod diff;
pub mod generate;
pub mod model;
pub mod stage;
pub mod tree;

pub use apply::{FileReport, HunkReport, HunkStatus, MatchOptions, apply_file_patch};
pub use diff::diff_texts;
pub use generate::{GenerateReport, PatchGenOptions, PatchGenerator};
pub use model::{FilePatch, Hunk, HunkLine};
pub use stage::{ApplyOptions, ApplySummary, FailureMode, PatchApplier, PatchSource, PatchStage};
pub use tree::{DirTree, LayeredTree, MemoryTree, SourceTree, ZipTree};

use std::io;
use std::path::PathBuf;

use crate::archive::ArchiveError;

/// Errors from generating or applying text patches.
#[derive(Debug, thiserror::Error)]
pub enum TextPatchError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("failed to walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("{patch}:{line}: {message}")]
    Parse {
        patch: String,
        line: usize,
        message: String,
    },
    #[error("{path} is not valid UTF-8 text")]
    NotUtf8 { path: String },
    #[error("patch {patch} targets {target}, which does not exist")]
    MissingTarget { patch: String, target: String },
    #[error("hunk {hunk} of {patch} failed to apply to {file}")]
    HunkFailed {
        patch: String,
        file: String,
        hunk: usize,
    },
}

impl TextPatchError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| TextPatchError::Io { path, source }
    }
}

/// Split text into lines, normalising CRLF and lone CR to LF.
///
/// Returns the lines and whether the text ended with a newline. A trailing
/// newline does not produce an empty final line.
pub(crate) fn split_lines(text: &str) -> (Vec<String>, bool) {
    let normalized = if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text.to_owned()
    };
    if normalized.is_empty() {
        return (Vec::new(), false);
    }
    let trailing = normalized.ends_with('\n');
    let body = normalized.strip_suffix('\n').unwrap_or(&normalized);
    (body.split('\n').map(str::to_owned).collect(), trailing)
}
