// Chained patch stages.
//
// A stage is a set of patch files plus optional injected files. Injects are
// merged into the working tree first, then every patch applies in path
// order. The tree a stage leaves behind is the input of the next one.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::apply::{FileReport, MatchOptions, apply_file_patch};
use super::model::FilePatch;
use super::tree::{DirTree, MemoryTree, SourceTree, ZipTree};
use super::TextPatchError;

/// Where a stage's patch files come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchSource {
    Dir(PathBuf),
    Zip(PathBuf),
}

impl PatchSource {
    /// A directory or, for anything else, a zip archive.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            PatchSource::Dir(path)
        } else {
            PatchSource::Zip(path)
        }
    }

    fn open(&self) -> Result<Box<dyn SourceTree>, TextPatchError> {
        Ok(match self {
            PatchSource::Dir(dir) => Box::new(DirTree::new(dir)),
            PatchSource::Zip(zip) => Box::new(ZipTree::open(zip)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchStage {
    pub patches: PatchSource,
    /// Directories, zip archives or single files merged in before patching.
    pub injects: Vec<PathBuf>,
}

impl PatchStage {
    pub fn new(patches: PatchSource) -> Self {
        Self {
            patches,
            injects: Vec::new(),
        }
    }

    pub fn with_inject(mut self, path: impl Into<PathBuf>) -> Self {
        self.injects.push(path.into());
        self
    }
}

/// What to do when a hunk cannot be placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailureMode {
    /// Stop at the first failed hunk.
    #[default]
    Fail,
    /// Apply what fits and write rejects for the rest.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    pub matching: MatchOptions,
    pub failure: FailureMode,
    /// Write every reject as `<reject_dir>/<target>.rej`. Without it, rejects
    /// go next to patch files from a directory and are only logged for patches
    /// read from a zip.
    pub reject_dir: Option<PathBuf>,
    pub patch_suffix: String,
    /// Leading components removed from the `---` label to find the target.
    pub strip: usize,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            matching: MatchOptions::default(),
            failure: FailureMode::Fail,
            reject_dir: None,
            patch_suffix: ".patch".to_owned(),
            strip: 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub files: Vec<FileReport>,
    /// Hunks that needed fuzz.
    pub fuzzed: usize,
    pub failed_hunks: usize,
    /// Reject files written.
    pub rejects: Vec<PathBuf>,
    pub injected: usize,
}

impl ApplySummary {
    pub fn is_clean(&self) -> bool {
        self.failed_hunks == 0
    }

    fn absorb(&mut self, report: FileReport) {
        self.fuzzed += report.fuzzed();
        self.failed_hunks += report.failed();
        self.files.push(report);
    }
}

#[derive(Debug, Clone, Default)]
pub struct PatchApplier {
    options: ApplyOptions,
}

impl PatchApplier {
    pub fn new(options: ApplyOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ApplyOptions {
        &self.options
    }

    /// Run every stage in order over `tree`.
    pub fn apply_stages(
        &self,
        tree: &mut MemoryTree,
        stages: &[PatchStage],
    ) -> Result<ApplySummary, TextPatchError> {
        let mut summary = ApplySummary::default();
        for (i, stage) in stages.iter().enumerate() {
            log::debug!("stage {}: {:?}", i + 1, stage.patches);
            self.apply_stage(tree, stage, &mut summary)?;
        }
        log::info!(
            "patched {} files: {} hunks fuzzed, {} failed",
            summary.files.len(),
            summary.fuzzed,
            summary.failed_hunks
        );
        Ok(summary)
    }

    fn apply_stage(
        &self,
        tree: &mut MemoryTree,
        stage: &PatchStage,
        summary: &mut ApplySummary,
    ) -> Result<(), TextPatchError> {
        for inject in &stage.injects {
            summary.injected += inject_into(tree, inject)?;
        }

        let source = stage.patches.open()?;
        for rel in source.paths()? {
            if !rel.ends_with(self.options.patch_suffix.as_str()) {
                continue;
            }
            let Some(bytes) = source.read(&rel)? else {
                continue;
            };
            let text = String::from_utf8(bytes)
                .map_err(|_| TextPatchError::NotUtf8 { path: rel.clone() })?;
            // One entry per reject file; an empty text clears a stale one.
            let mut rejects: BTreeMap<PathBuf, String> = BTreeMap::new();
            for patch in FilePatch::parse_all(&text, &rel)? {
                let reject = self.apply_one(tree, &rel, &patch, summary)?;
                match self.reject_path(&stage.patches, &rel, &patch) {
                    Some(path) => rejects
                        .entry(path)
                        .or_default()
                        .push_str(reject.as_deref().unwrap_or_default()),
                    None if reject.is_some() => {
                        log::warn!("{rel}: rejects not written, no reject directory set");
                    }
                    None => {}
                }
            }
            for (path, body) in &rejects {
                write_reject(path, body, summary)?;
            }
        }
        Ok(())
    }

    /// Apply one file patch; returns its reject text if any hunk failed.
    fn apply_one(
        &self,
        tree: &mut MemoryTree,
        patch_name: &str,
        patch: &FilePatch,
        summary: &mut ApplySummary,
    ) -> Result<Option<String>, TextPatchError> {
        let target = strip_components(&patch.old_label, self.options.strip);
        let Some(bytes) = tree.get(&target) else {
            return Err(TextPatchError::MissingTarget {
                patch: patch_name.to_owned(),
                target,
            });
        };
        let source = std::str::from_utf8(bytes).map_err(|_| TextPatchError::NotUtf8 {
            path: target.clone(),
        })?;

        let (patched, report) = apply_file_patch(&target, source, patch, &self.options.matching);
        if let Some(failed) = report.hunks.iter().find(|h| !h.status.is_success()) {
            log::error!(
                "{patch_name}: {}/{} hunks failed on {target}",
                report.failed(),
                report.hunks.len()
            );
            if self.options.failure == FailureMode::Fail {
                return Err(TextPatchError::HunkFailed {
                    patch: patch_name.to_owned(),
                    file: target,
                    hunk: failed.index,
                });
            }
        } else if report.fuzzed() > 0 {
            log::info!("{patch_name}: fuzzed {} hunks", report.fuzzed());
        }

        let reject = report.reject_text(patch);
        tree.insert(target, patched);
        summary.absorb(report);
        Ok(reject)
    }

    fn reject_path(&self, source: &PatchSource, rel: &str, patch: &FilePatch) -> Option<PathBuf> {
        if let Some(dir) = &self.options.reject_dir {
            // Keyed by target so that rejects from different stages land
            // side by side.
            let target = strip_components(&patch.old_label, self.options.strip);
            return Some(dir.join(format!("{target}.rej")));
        }
        match source {
            PatchSource::Dir(dir) => Some(dir.join(format!("{rel}.rej"))),
            PatchSource::Zip(_) => None,
        }
    }
}

/// Write `text` to `path`, or remove a stale reject when `text` is empty.
fn write_reject(path: &Path, text: &str, summary: &mut ApplySummary) -> Result<(), TextPatchError> {
    if text.is_empty() {
        if path.is_file() {
            fs::remove_file(path).map_err(TextPatchError::io(path))?;
        }
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(TextPatchError::io(parent))?;
    }
    fs::write(path, text).map_err(TextPatchError::io(path))?;
    log::warn!("rejects written to {}", path.display());
    summary.rejects.push(path.to_path_buf());
    Ok(())
}

/// Merge a directory, zip archive or single file into `tree`.
fn inject_into(tree: &mut MemoryTree, path: &Path) -> Result<usize, TextPatchError> {
    let source: Box<dyn SourceTree> = if path.is_dir() {
        Box::new(DirTree::new(path))
    } else if is_archive(path) {
        Box::new(ZipTree::open(path)?)
    } else {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| TextPatchError::NotUtf8 {
                path: path.display().to_string(),
            })?;
        let bytes = fs::read(path).map_err(TextPatchError::io(path))?;
        tree.insert(name, bytes);
        return Ok(1);
    };

    let mut count = 0;
    for rel in source.paths()? {
        if let Some(bytes) = source.read(&rel)? {
            tree.insert(rel, bytes);
            count += 1;
        }
    }
    log::debug!("injected {count} files from {}", path.display());
    Ok(count)
}

fn is_archive(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip") || e.eq_ignore_ascii_case("jar"))
}

/// Drop `n` leading `/`-separated components; never strips the last one.
fn strip_components(label: &str, n: usize) -> String {
    let parts: Vec<&str> = label.split('/').filter(|p| !p.is_empty()).collect();
    let skip = n.min(parts.len().saturating_sub(1));
    parts[skip..].join("/")
}
