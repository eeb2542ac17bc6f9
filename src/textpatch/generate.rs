// Patch directory generation.
//
// One `<relative><suffix>` file per source that differs between the original
// and changed trees. Files are only rewritten when their text changes, and a
// pass ends by deleting patch files it did not produce and pruning the
// directories left empty.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::diff::diff_texts;
use super::tree::{SourceTree, relative_path};
use super::TextPatchError;

/// Options for [`PatchGenerator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchGenOptions {
    /// Context lines around each change.
    pub context: usize,
    /// Label prefix for the `---` header.
    pub original_prefix: String,
    /// Label prefix for the `+++` header.
    pub changed_prefix: String,
    /// Appended to the source path to name the patch file.
    pub patch_suffix: String,
}

impl Default for PatchGenOptions {
    fn default() -> Self {
        Self {
            context: 3,
            original_prefix: "a".to_owned(),
            changed_prefix: "b".to_owned(),
            patch_suffix: ".patch".to_owned(),
        }
    }
}

/// What a generation pass did, as paths relative to the patch directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateReport {
    pub written: Vec<String>,
    pub unchanged: Vec<String>,
    pub removed: Vec<String>,
    pub pruned_dirs: usize,
}

impl GenerateReport {
    /// Number of patch files the directory now holds.
    pub fn patches(&self) -> usize {
        self.written.len() + self.unchanged.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PatchGenerator {
    options: PatchGenOptions,
}

impl PatchGenerator {
    pub fn new(options: PatchGenOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PatchGenOptions {
        &self.options
    }

    /// Diff `changed` against `original` into `patch_dir`.
    pub fn generate(
        &self,
        original: &dyn SourceTree,
        changed: &dyn SourceTree,
        patch_dir: &Path,
    ) -> Result<GenerateReport, TextPatchError> {
        let mut report = GenerateReport::default();
        let mut produced = BTreeSet::new();

        for path in original.paths()? {
            let Some(changed_bytes) = changed.read(&path)? else {
                log::debug!("{path} is missing from the changed tree, skipping");
                continue;
            };
            let Some(original_bytes) = original.read(&path)? else {
                continue;
            };
            let old = as_text(&original_bytes, &path)?;
            let new = as_text(&changed_bytes, &path)?;

            let patch = diff_texts(
                &format!("{}/{path}", self.options.original_prefix),
                &format!("{}/{path}", self.options.changed_prefix),
                old,
                new,
                self.options.context,
            );
            let Some(patch) = patch else {
                continue;
            };

            let rel = format!("{path}{}", self.options.patch_suffix);
            let text = patch.render();
            let target = patch_dir.join(&rel);
            produced.insert(target.clone());

            if fs::read(&target).is_ok_and(|existing| existing == text.as_bytes()) {
                log::debug!("{rel} unchanged");
                report.unchanged.push(rel);
                continue;
            }
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(TextPatchError::io(parent))?;
            }
            fs::write(&target, text).map_err(TextPatchError::io(&target))?;
            log::debug!("wrote {rel}");
            report.written.push(rel);
        }

        self.clean_stale(patch_dir, &produced, &mut report)?;
        log::info!(
            "{} patches written, {} unchanged, {} stale removed",
            report.written.len(),
            report.unchanged.len(),
            report.removed.len()
        );
        Ok(report)
    }

    fn clean_stale(
        &self,
        patch_dir: &Path,
        produced: &BTreeSet<PathBuf>,
        report: &mut GenerateReport,
    ) -> Result<(), TextPatchError> {
        if !patch_dir.is_dir() {
            return Ok(());
        }
        let walk_err = |source| TextPatchError::Walk {
            path: patch_dir.to_path_buf(),
            source,
        };

        for entry in WalkDir::new(patch_dir).sort_by_file_name() {
            let entry = entry.map_err(walk_err)?;
            if !entry.file_type().is_file() || produced.contains(entry.path()) {
                continue;
            }
            fs::remove_file(entry.path()).map_err(TextPatchError::io(entry.path()))?;
            let rel = relative_path(patch_dir, entry.path())
                .unwrap_or_else(|| entry.path().display().to_string());
            log::debug!("removed stale patch {rel}");
            report.removed.push(rel);
        }

        // Children are visited before their parents.
        for entry in WalkDir::new(patch_dir).min_depth(1).contents_first(true) {
            let entry = entry.map_err(walk_err)?;
            if !entry.file_type().is_dir() {
                continue;
            }
            let empty = fs::read_dir(entry.path())
                .map_err(TextPatchError::io(entry.path()))?
                .next()
                .is_none();
            if empty {
                fs::remove_dir(entry.path()).map_err(TextPatchError::io(entry.path()))?;
                report.pruned_dirs += 1;
            }
        }
        Ok(())
    }
}

fn as_text<'a>(bytes: &'a [u8], path: &str) -> Result<&'a str, TextPatchError> {
    std::str::from_utf8(bytes).map_err(|_| TextPatchError::NotUtf8 {
        path: path.to_owned(),
    })
}
