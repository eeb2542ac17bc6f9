use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;

use super::srg::{self, Record};
use super::{Direction, MappingError, Member, Repackager, map_descriptor};

type FieldKey = (String, String);
type MethodKey = (String, String, String);

/// Rename entries for one direction, keyed by source-side names.
#[derive(Debug, Clone, Default)]
pub(crate) struct Entries {
    pub(crate) packages: BTreeMap<String, String>,
    pub(crate) classes: BTreeMap<String, String>,
    pub(crate) fields: BTreeMap<FieldKey, FieldKey>,
    pub(crate) methods: BTreeMap<MethodKey, MethodKey>,
}

impl Entries {
    /// Swap keys and values. Later duplicates on the target side win.
    fn inverted(&self) -> Entries {
        Entries {
            packages: self
                .packages
                .iter()
                .map(|(k, v)| (v.clone(), k.clone()))
                .collect(),
            classes: self
                .classes
                .iter()
                .map(|(k, v)| (v.clone(), k.clone()))
                .collect(),
            fields: self
                .fields
                .iter()
                .map(|(k, v)| (v.clone(), k.clone()))
                .collect(),
            methods: self
                .methods
                .iter()
                .map(|(k, v)| (v.clone(), k.clone()))
                .collect(),
        }
    }

    fn apply(&mut self, record: Record<'_>) {
        match record {
            Record::Package { obf, target } => {
                self.packages.insert(obf.to_owned(), target.to_owned());
            }
            Record::Class { obf, target } => {
                self.classes.insert(obf.to_owned(), target.to_owned());
            }
            Record::Field {
                owner,
                name,
                target_owner,
                target_name,
            } => {
                self.fields.insert(
                    (owner.to_owned(), name.to_owned()),
                    (target_owner.to_owned(), target_name.to_owned()),
                );
            }
            Record::Method {
                owner,
                name,
                desc,
                target_owner,
                target_name,
                target_desc,
            } => {
                self.methods.insert(
                    (owner.to_owned(), name.to_owned(), desc.to_owned()),
                    (
                        target_owner.to_owned(),
                        target_name.to_owned(),
                        target_desc.to_owned(),
                    ),
                );
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Counts from loading one mapping source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Records accepted.
    pub loaded: usize,
    /// Malformed lines skipped.
    pub skipped: usize,
}

/// Accumulates mapping sources. Later entries for the same key replace
/// earlier ones.
#[derive(Debug, Default)]
pub struct MappingTableBuilder {
    entries: Entries,
}

impl MappingTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load SRG records from `reader`. `label` names the source in logs and
    /// errors.
    ///
    /// Malformed lines are logged and skipped; only I/O failure is an error.
    pub fn load<R: Read>(&mut self, reader: R, label: &str) -> Result<LoadReport, MappingError> {
        let mut report = LoadReport::default();
        for (idx, line) in BufReader::new(reader).lines().enumerate() {
            let line = line.map_err(|source| MappingError::Io {
                label: label.to_owned(),
                source,
            })?;
            match srg::parse_line(&line) {
                Ok(Some(record)) => {
                    self.entries.apply(record);
                    report.loaded += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    log::warn!("{label}:{}: skipping malformed mapping line: {e}", idx + 1);
                    report.skipped += 1;
                }
            }
        }
        log::debug!(
            "loaded {} mapping records from {label} ({} skipped)",
            report.loaded,
            report.skipped
        );
        Ok(report)
    }

    /// Load SRG records from a file.
    pub fn load_path(&mut self, path: impl AsRef<Path>) -> Result<LoadReport, MappingError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let file = File::open(path).map_err(|source| MappingError::Io {
            label: label.clone(),
            source,
        })?;
        self.load(file, &label)
    }

    /// Add or replace a single class mapping.
    pub fn class(&mut self, obf: &str, target: &str) -> &mut Self {
        self.entries.apply(Record::Class { obf, target });
        self
    }

    /// Freeze into an immutable table.
    pub fn build(self) -> MappingTable {
        MappingTable::from_entries(self.entries)
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// A patch file name resolved to a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchTarget {
    /// Obfuscated binary name.
    pub obf: String,
    /// Target-space binary name.
    pub target: String,
}

/// Immutable rename table for both directions.
#[derive(Debug, Clone)]
pub struct MappingTable {
    forward: Entries,
    reverse: Entries,
    /// Target outer class -> target inner classes, sorted.
    inner: HashMap<String, Vec<String>>,
    /// Target outer simple name -> target inner classes, sorted.
    inner_by_simple: HashMap<String, Vec<String>>,
    /// Target simple name -> target binary names, sorted.
    simple: HashMap<String, Vec<String>>,
}

impl MappingTable {
    fn from_entries(forward: Entries) -> Self {
        let reverse = forward.inverted();

        let mut inner: HashMap<String, Vec<String>> = HashMap::new();
        let mut inner_by_simple: HashMap<String, Vec<String>> = HashMap::new();
        let mut simple: HashMap<String, Vec<String>> = HashMap::new();
        // BTreeMap iteration keeps both lists sorted.
        for target in reverse.classes.keys() {
            if let Some(idx) = target.rfind('$').filter(|&i| i > 0) {
                let outer = &target[..idx];
                inner
                    .entry(outer.to_owned())
                    .or_default()
                    .push(target.clone());
                inner_by_simple
                    .entry(simple_name(outer).to_owned())
                    .or_default()
                    .push(target.clone());
            }
            simple
                .entry(simple_name(target).to_owned())
                .or_default()
                .push(target.clone());
        }

        log::debug!(
            "mapping table: {} classes, {} fields, {} methods, {} packages",
            forward.classes.len(),
            forward.fields.len(),
            forward.methods.len(),
            forward.packages.len()
        );

        Self {
            forward,
            reverse,
            inner,
            inner_by_simple,
            simple,
        }
    }

    fn entries(&self, dir: Direction) -> &Entries {
        match dir {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
        }
    }

    /// Translate a class binary name. Unmapped names pass through; an
    /// unmapped inner class keeps its suffix behind the translated outer
    /// class.
    pub fn translate_class(&self, name: &str, dir: Direction) -> String {
        if let Some(mapped) = self.entries(dir).classes.get(name) {
            return mapped.clone();
        }
        match name.rfind('$') {
            Some(idx) if idx > 0 => {
                format!("{}${}", self.translate_class(&name[..idx], dir), &name[idx + 1..])
            }
            _ => name.to_owned(),
        }
    }

    /// Translate a package name, `""` being the default package.
    pub fn translate_package(&self, name: &str, dir: Direction) -> String {
        self.entries(dir)
            .packages
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_owned())
    }

    /// Translate every class reference in a descriptor.
    pub fn translate_descriptor(&self, desc: &str, dir: Direction) -> String {
        map_descriptor(desc, |class| self.translate_class(class, dir))
    }

    /// Translate a field (`descriptor == None`) or method reference.
    ///
    /// The owner always goes through `translate_class`. An unmapped member
    /// keeps its name, with the descriptor still translated.
    pub fn translate_member(
        &self,
        owner: &str,
        name: &str,
        descriptor: Option<&str>,
        dir: Direction,
    ) -> Member {
        let entries = self.entries(dir);
        let mapped_owner = self.translate_class(owner, dir);
        match descriptor {
            None => {
                let key = (owner.to_owned(), name.to_owned());
                let mapped_name = entries
                    .fields
                    .get(&key)
                    .map(|(_, n)| n.clone())
                    .unwrap_or_else(|| name.to_owned());
                Member {
                    owner: mapped_owner,
                    name: mapped_name,
                    descriptor: None,
                }
            }
            Some(desc) => {
                let key = (owner.to_owned(), name.to_owned(), desc.to_owned());
                let (mapped_name, mapped_desc) = match entries.methods.get(&key) {
                    Some((_, n, d)) => (n.clone(), d.clone()),
                    None => (name.to_owned(), self.translate_descriptor(desc, dir)),
                };
                Member {
                    owner: mapped_owner,
                    name: mapped_name,
                    descriptor: Some(mapped_desc),
                }
            }
        }
    }

    /// Resolve a target-space class path (as named by a source patch) to
    /// its obfuscated class: by full binary name first, then by simple name.
    ///
    /// Several classes sharing a simple name resolve to the first in sorted
    /// order.
    pub fn resolve_patch_name(&self, target_path: &str) -> Option<PatchTarget> {
        if let Some(obf) = self.reverse.classes.get(target_path) {
            return Some(PatchTarget {
                obf: obf.clone(),
                target: target_path.to_owned(),
            });
        }
        let candidates = self.simple.get(simple_name(target_path))?;
        if candidates.len() > 1 {
            log::debug!(
                "{target_path}: simple name matches {} classes, using {}",
                candidates.len(),
                candidates[0]
            );
        }
        let target = candidates.first()?;
        let obf = self.reverse.classes.get(target)?;
        Some(PatchTarget {
            obf: obf.clone(),
            target: target.clone(),
        })
    }

    /// Direct inner classes of a target-space class, sorted.
    pub fn inner_classes(&self, target_outer: &str) -> &[String] {
        self.inner
            .get(target_outer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Inner classes of every target-space outer class whose simple name is
    /// `simple`, sorted. Outer classes in different packages that share a
    /// simple name share one entry.
    pub fn inner_classes_by_simple_name(&self, simple: &str) -> &[String] {
        self.inner_by_simple
            .get(simple)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Obfuscated name of a mapped target-space class.
    pub fn obf_name(&self, target: &str) -> Option<&str> {
        self.reverse.classes.get(target).map(String::as_str)
    }

    /// Mapped classes as `(obf, target)`, sorted by obfuscated name.
    pub fn classes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.forward
            .classes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn class_count(&self) -> usize {
        self.forward.classes.len()
    }

    /// Rewrite the target side through `repackager`.
    ///
    /// Class targets, field owners, method owners and method target
    /// descriptors are repackaged; obfuscated names are untouched.
    pub fn repackaged(&self, repackager: &Repackager) -> MappingTable {
        let r = |class: &str| repackager.repackage_class(class);
        let fwd = &self.forward;
        let entries = Entries {
            packages: fwd.packages.clone(),
            classes: fwd
                .classes
                .iter()
                .map(|(obf, target)| (obf.clone(), r(target)))
                .collect(),
            fields: fwd
                .fields
                .iter()
                .map(|(key, (owner, name))| (key.clone(), (r(owner), name.clone())))
                .collect(),
            methods: fwd
                .methods
                .iter()
                .map(|(key, (owner, name, desc))| {
                    (
                        key.clone(),
                        (r(owner), name.clone(), map_descriptor(desc, r)),
                    )
                })
                .collect(),
        };
        MappingTable::from_entries(entries)
    }

    /// Write the table as SRG text in the given direction.
    pub fn write_srg<W: Write>(&self, out: &mut W, dir: Direction) -> std::io::Result<()> {
        srg::write_entries(self.entries(dir), out)
    }
}

/// Rightmost `/` segment of a binary name.
pub(crate) fn simple_name(name: &str) -> &str {
    name.rsplit('/').next().unwrap_or(name)
}
