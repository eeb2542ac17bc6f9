// Selection of the classes that need binary patches.
//
// Every `<relative>.java.patch` under a patch directory names a target-space
// class. Each is resolved to its obfuscated name, and all of its inner
// classes (transitively) are selected with it so that synthetic accessors
// stay consistent.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use walkdir::WalkDir;

use crate::mapping::MappingTable;

/// Suffix of source patch files.
pub const DEFAULT_PATCH_SUFFIX: &str = ".java.patch";

/// Errors from scanning patch directories.
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("patch directory {} does not exist or is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("failed to walk {}: {source}", dir.display())]
    Walk {
        dir: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Result of a selection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Obfuscated binary names to patch.
    pub touched: BTreeSet<String>,
    /// Patch names with no class mapping, as target-space relative paths.
    pub unresolved: Vec<String>,
    /// Patch files examined.
    pub patches: usize,
}

/// Maps source patch files to the obfuscated classes they affect.
pub struct PatchSelector {
    mapping: Arc<MappingTable>,
    suffix: String,
}

impl PatchSelector {
    pub fn new(mapping: Arc<MappingTable>) -> Self {
        Self {
            mapping,
            suffix: DEFAULT_PATCH_SUFFIX.to_owned(),
        }
    }

    /// Use a different patch file suffix.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Scan each directory recursively, in sorted order.
    pub fn select<P: AsRef<Path>>(&self, dirs: &[P]) -> Result<Selection, SelectionError> {
        let mut names = Vec::new();
        for dir in dirs {
            let dir = dir.as_ref();
            if !dir.is_dir() {
                return Err(SelectionError::NotADirectory(dir.to_path_buf()));
            }
            for entry in WalkDir::new(dir).sort_by_file_name() {
                let entry = entry.map_err(|source| SelectionError::Walk {
                    dir: dir.to_path_buf(),
                    source,
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                match relative_name(dir, entry.path()) {
                    Some(rel) => names.push(rel),
                    None => log::warn!("skipping non UTF-8 path {}", entry.path().display()),
                }
            }
        }
        Ok(self.select_names(names.iter().map(String::as_str)))
    }

    /// Select from relative patch file names (`/` separated).
    pub fn select_names<'a>(&self, names: impl IntoIterator<Item = &'a str>) -> Selection {
        let mut selection = Selection::default();
        let mut visited = BTreeSet::new();

        for name in names {
            let Some(class_path) = name.strip_suffix(self.suffix.as_str()) else {
                log::debug!("ignoring {name}: not a {} file", self.suffix);
                continue;
            };
            selection.patches += 1;
            let Some(resolved) = self.mapping.resolve_patch_name(class_path) else {
                log::warn!("no class mapping for patch {name}");
                selection.unresolved.push(class_path.to_owned());
                continue;
            };
            selection.touched.insert(resolved.obf);
            if visited.insert(resolved.target.clone()) {
                self.propagate(resolved.target, &mut visited, &mut selection.touched);
            }
        }

        log::info!(
            "{} patches select {} classes ({} unresolved)",
            selection.patches,
            selection.touched.len(),
            selection.unresolved.len()
        );
        selection
    }

    /// Add every inner class reachable from `root`. Inner classes are looked
    /// up by the simple name of their outer class.
    fn propagate(
        &self,
        root: String,
        visited: &mut BTreeSet<String>,
        touched: &mut BTreeSet<String>,
    ) {
        let mut worklist = vec![root];
        while let Some(outer) = worklist.pop() {
            let simple = outer.rsplit('/').next().unwrap_or(outer.as_str());
            for inner in self.mapping.inner_classes_by_simple_name(simple) {
                if !visited.insert(inner.clone()) {
                    continue;
                }
                if let Some(obf) = self.mapping.obf_name(inner) {
                    touched.insert(obf.to_owned());
                }
                worklist.push(inner.clone());
            }
        }
    }
}

fn relative_name(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}
