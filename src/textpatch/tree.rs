// Source trees read by patch generation and application.
//
// Paths are relative and `/` separated on every platform.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::TextPatchError;
use crate::archive::{ClassArchive, zip_to_vec};

/// Read-only view of a tree of files.
pub trait SourceTree {
    /// Every file path in the tree, sorted.
    fn paths(&self) -> Result<Vec<String>, TextPatchError>;

    /// Contents of `path`, or `None` if the tree has no such file.
    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, TextPatchError>;
}

/// Files under a directory on disk.
#[derive(Debug, Clone)]
pub struct DirTree {
    root: PathBuf,
}

impl DirTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl SourceTree for DirTree {
    fn paths(&self) -> Result<Vec<String>, TextPatchError> {
        let mut paths = Vec::new();
        if !self.root.is_dir() {
            return Ok(paths);
        }
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|source| TextPatchError::Walk {
                path: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            match relative_path(&self.root, entry.path()) {
                Some(rel) => paths.push(rel),
                None => log::warn!("skipping non UTF-8 path {}", entry.path().display()),
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, TextPatchError> {
        let full = self.root.join(path);
        if !full.is_file() {
            return Ok(None);
        }
        fs::read(&full).map(Some).map_err(TextPatchError::io(full))
    }
}

/// Every file entry of a zip archive, loaded into memory when opened.
#[derive(Debug, Clone)]
pub struct ZipTree {
    entries: BTreeMap<String, Vec<u8>>,
}

impl ZipTree {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TextPatchError> {
        let mut archive = ClassArchive::open(path)?;
        Ok(Self {
            entries: archive.read_all()?,
        })
    }

    pub fn from_bytes(bytes: Vec<u8>, label: &str) -> Result<Self, TextPatchError> {
        let mut archive = ClassArchive::from_bytes(bytes, label)?;
        Ok(Self {
            entries: archive.read_all()?,
        })
    }
}

impl SourceTree for ZipTree {
    fn paths(&self) -> Result<Vec<String>, TextPatchError> {
        Ok(self.entries.keys().cloned().collect())
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, TextPatchError> {
        Ok(self.entries.get(path).cloned())
    }
}

/// Writable in-memory tree; the working copy while patches apply.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryTree {
    files: BTreeMap<String, Vec<u8>>,
}

impl MemoryTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy every file out of another tree.
    pub fn load(tree: &dyn SourceTree) -> Result<Self, TextPatchError> {
        let mut out = Self::new();
        for path in tree.paths()? {
            if let Some(bytes) = tree.read(&path)? {
                out.files.insert(path, bytes);
            }
        }
        Ok(out)
    }

    pub fn insert(&mut self, path: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn remove(&mut self, path: &str) -> Option<Vec<u8>> {
        self.files.remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.files.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Write every file under `dir`, creating parents as needed.
    pub fn write_to_dir(&self, dir: &Path) -> Result<(), TextPatchError> {
        for (path, bytes) in &self.files {
            let full = dir.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).map_err(TextPatchError::io(parent))?;
            }
            fs::write(&full, bytes).map_err(TextPatchError::io(&full))?;
        }
        Ok(())
    }

    /// Deterministic zip of the tree.
    pub fn to_zip(&self, label: &str) -> Result<Vec<u8>, TextPatchError> {
        Ok(zip_to_vec(&self.files, label)?)
    }
}

impl SourceTree for MemoryTree {
    fn paths(&self) -> Result<Vec<String>, TextPatchError> {
        Ok(self.files.keys().cloned().collect())
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, TextPatchError> {
        Ok(self.files.get(path).cloned())
    }
}

/// Ordered union of trees. The first layer holding a path wins.
#[derive(Default)]
pub struct LayeredTree {
    layers: Vec<Box<dyn SourceTree>>,
}

impl LayeredTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, layer: impl SourceTree + 'static) -> &mut Self {
        self.layers.push(Box::new(layer));
        self
    }

    /// Open a directory or zip archive as a layer.
    pub fn push_path(&mut self, path: &Path) -> Result<&mut Self, TextPatchError> {
        if path.is_dir() {
            Ok(self.push(DirTree::new(path)))
        } else {
            Ok(self.push(ZipTree::open(path)?))
        }
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

impl SourceTree for LayeredTree {
    fn paths(&self) -> Result<Vec<String>, TextPatchError> {
        let mut all = std::collections::BTreeSet::new();
        for layer in &self.layers {
            all.extend(layer.paths()?);
        }
        Ok(all.into_iter().collect())
    }

    fn read(&self, path: &str) -> Result<Option<Vec<u8>>, TextPatchError> {
        for layer in &self.layers {
            if let Some(bytes) = layer.read(path)? {
                return Ok(Some(bytes));
            }
        }
        Ok(None)
    }
}

pub(crate) fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
    Some(parts?.join("/"))
}
