// Patch containers: zips of records under `binpatch/<root>/<target>.binpatch`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use super::record::BinPatch;
use super::transform::TransformChain;
use super::ContainerError;
use crate::archive::{ClassArchive, zip_to_vec};

const ENTRY_PREFIX: &str = "binpatch/";
const ENTRY_SUFFIX: &str = ".binpatch";

/// Baseline archive a record was generated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Side {
    Client,
    Server,
    Merged,
}

impl Side {
    pub const ALL: [Side; 3] = [Side::Client, Side::Server, Side::Merged];

    /// Directory name under `binpatch/`.
    pub fn root(self) -> &'static str {
        match self {
            Side::Client => "client",
            Side::Server => "server",
            Side::Merged => "merged",
        }
    }

    /// Client and server records ship in the runtime container; merged
    /// records in the dev container.
    pub fn is_runtime(self) -> bool {
        !matches!(self, Side::Merged)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.root())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "client" => Ok(Side::Client),
            "server" => Ok(Side::Server),
            "merged" => Ok(Side::Merged),
            other => Err(format!(
                "unknown side {other:?} (expected client, server or merged)"
            )),
        }
    }
}

/// Container entry path for a record.
pub fn entry_path(side: Side, target_name: &str) -> String {
    format!("{ENTRY_PREFIX}{}/{target_name}{ENTRY_SUFFIX}", side.root())
}

fn parse_entry_path(path: &str) -> Option<(Side, &str)> {
    let rest = path.strip_prefix(ENTRY_PREFIX)?;
    let (root, file) = rest.split_once('/')?;
    let side = root.parse().ok()?;
    let target = file.strip_suffix(ENTRY_SUFFIX)?;
    (!target.is_empty() && !target.contains('/')).then_some((side, target))
}

/// A set of binary patch records keyed by entry path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchContainer {
    records: BTreeMap<String, (Side, BinPatch)>,
}

impl PatchContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record, replacing any record with the same side and target name.
    pub fn insert(&mut self, side: Side, patch: BinPatch) -> Option<BinPatch> {
        self.records
            .insert(entry_path(side, &patch.target_name), (side, patch))
            .map(|(_, old)| old)
    }

    /// Record for a dotted target name.
    pub fn get(&self, side: Side, target_name: &str) -> Option<&BinPatch> {
        self.records
            .get(&entry_path(side, target_name))
            .map(|(_, p)| p)
    }

    /// Records of one side, sorted by entry path.
    pub fn side(&self, side: Side) -> impl Iterator<Item = &BinPatch> {
        self.records
            .values()
            .filter(move |(s, _)| *s == side)
            .map(|(_, p)| p)
    }

    /// All `(path, side, record)` triples, sorted by path.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Side, &BinPatch)> {
        self.records
            .iter()
            .map(|(path, (side, patch))| (path.as_str(), *side, patch))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Serialise to a deterministic zip.
    pub fn to_zip(&self) -> Result<Vec<u8>, ContainerError> {
        let mut entries = BTreeMap::new();
        for (path, (_, patch)) in &self.records {
            let bytes = patch.to_bytes().map_err(|source| ContainerError::Record {
                path: path.clone(),
                source,
            })?;
            entries.insert(path.clone(), bytes);
        }
        Ok(zip_to_vec(&entries, "patch container")?)
    }

    /// Parse a container zip. Entries outside `binpatch/<root>/` are ignored.
    pub fn from_zip(bytes: Vec<u8>) -> Result<Self, ContainerError> {
        let mut archive = ClassArchive::from_bytes(bytes, "patch container")?;
        let mut container = Self::new();
        for name in archive.entry_names() {
            let Some((side, _)) = parse_entry_path(&name) else {
                log::debug!("ignoring container entry {name}");
                continue;
            };
            let Some(bytes) = archive.read_entry(&name)? else {
                continue;
            };
            let patch = BinPatch::from_bytes(&bytes).map_err(|source| ContainerError::Record {
                path: name.clone(),
                source,
            })?;
            container.records.insert(name, (side, patch));
        }
        Ok(container)
    }

    /// Serialise and run through `chain`.
    pub fn encode(&self, chain: &TransformChain) -> Result<Vec<u8>, ContainerError> {
        Ok(chain.apply(&self.to_zip()?)?)
    }

    /// Undo `chain` and parse.
    pub fn decode(bytes: &[u8], chain: &TransformChain) -> Result<Self, ContainerError> {
        Self::from_zip(chain.undo(bytes)?)
    }

    /// Encode and write to `path`.
    pub fn write_to(&self, path: &Path, chain: &TransformChain) -> Result<(), ContainerError> {
        let bytes = self.encode(chain)?;
        fs::write(path, &bytes).map_err(|source| ContainerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        log::info!(
            "wrote {} ({} records, {} bytes)",
            path.display(),
            self.len(),
            bytes.len()
        );
        Ok(())
    }

    /// Read and decode from `path`.
    pub fn read_from(path: &Path, chain: &TransformChain) -> Result<Self, ContainerError> {
        let bytes = fs::read(path).map_err(|source| ContainerError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::decode(&bytes, chain)
    }
}
