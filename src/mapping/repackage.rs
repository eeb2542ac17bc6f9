// Repackaging of classes out of a legacy flat package.
//
// A packaging table maps a class's simple name to the package it moves to:
//
//   class,package
//   Block,net/minecraft/block
//
// Only classes directly inside the flat package are moved.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::MappingError;

/// Flat package the historical layout kept every class in.
pub const DEFAULT_FLAT_PACKAGE: &str = "net/minecraft/src";

/// Moves classes from the flat package into their real packages.
#[derive(Debug, Clone)]
pub struct Repackager {
    flat_package: String,
    packages: HashMap<String, String>,
}

impl Default for Repackager {
    fn default() -> Self {
        Self {
            flat_package: DEFAULT_FLAT_PACKAGE.to_owned(),
            packages: HashMap::new(),
        }
    }
}

impl Repackager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different flat package prefix.
    pub fn with_flat_package(mut self, package: impl Into<String>) -> Self {
        self.flat_package = package.into().trim_end_matches('/').to_owned();
        self
    }

    /// Map `simple_name` to `package`.
    pub fn insert(&mut self, simple_name: impl Into<String>, package: impl Into<String>) {
        self.packages.insert(simple_name.into(), package.into());
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Read a packaging table (header row, then `simple-name,package`).
    ///
    /// Rows with fewer than two fields or an empty package are skipped.
    pub fn load_csv<R: Read>(&mut self, reader: R, label: &str) -> Result<usize, MappingError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut loaded = 0;
        for (idx, row) in rdr.records().enumerate() {
            let row = row.map_err(|source| MappingError::Csv {
                label: label.to_owned(),
                source,
            })?;
            match (row.get(0), row.get(1)) {
                (Some(name), Some(package)) if !name.is_empty() && !package.is_empty() => {
                    self.insert(name, package.trim_end_matches('/'));
                    loaded += 1;
                }
                _ => log::warn!("{label}: row {}: skipping incomplete packaging entry", idx + 2),
            }
        }
        log::debug!("loaded {loaded} packaging entries from {label}");
        Ok(loaded)
    }

    /// Read a packaging table from a file.
    pub fn load_csv_path(&mut self, path: impl AsRef<Path>) -> Result<usize, MappingError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let file = File::open(path).map_err(|source| MappingError::Io {
            label: label.clone(),
            source,
        })?;
        self.load_csv(file, &label)
    }

    /// Move `class` out of the flat package if the table knows its simple
    /// name. Inner classes follow their outer class.
    pub fn repackage_class(&self, class: &str) -> String {
        let Some(rest) = class
            .strip_prefix(self.flat_package.as_str())
            .and_then(|r| r.strip_prefix('/'))
        else {
            return class.to_owned();
        };
        if rest.contains('/') {
            return class.to_owned();
        }
        let outer = rest.split('$').next().unwrap_or(rest);
        match self.packages.get(rest).or_else(|| self.packages.get(outer)) {
            Some(package) => format!("{package}/{rest}"),
            None => class.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{Direction, MappingTableBuilder};

    const PACKAGES: &str = "class,package\nBlock,net/minecraft/block\nItem,net/minecraft/item\nBroken\n";

    fn repackager() -> Repackager {
        let mut r = Repackager::new();
        assert_eq!(r.load_csv(PACKAGES.as_bytes(), "packages.csv").unwrap(), 2);
        r
    }

    #[test]
    fn flat_classes_move() {
        let r = repackager();
        assert_eq!(
            r.repackage_class("net/minecraft/src/Block"),
            "net/minecraft/block/Block"
        );
        assert_eq!(
            r.repackage_class("net/minecraft/src/Block$1"),
            "net/minecraft/block/Block$1"
        );
    }

    #[test]
    fn other_classes_stay() {
        let r = repackager();
        assert_eq!(r.repackage_class("net/minecraft/src/Unknown"), "net/minecraft/src/Unknown");
        assert_eq!(r.repackage_class("java/lang/Block"), "java/lang/Block");
        assert_eq!(
            r.repackage_class("net/minecraft/srcX/Block"),
            "net/minecraft/srcX/Block"
        );
    }

    #[test]
    fn custom_flat_package() {
        let mut r = Repackager::new().with_flat_package("legacy/");
        r.insert("Thing", "org/example");
        assert_eq!(r.repackage_class("legacy/Thing"), "org/example/Thing");
    }

    #[test]
    fn table_targets_are_repackaged() {
        let mut b = MappingTableBuilder::new();
        b.load(
            "CL: a net/minecraft/src/Block\n\
             CL: b net/minecraft/src/Item\n\
             FD: a/c net/minecraft/src/Block/field_1\n\
             MD: a/d (Lb;)V net/minecraft/src/Block/func_2 (Lnet/minecraft/src/Item;)V\n"
                .as_bytes(),
            "flat.srg",
        )
        .unwrap();
        let table = b.build().repackaged(&repackager());

        assert_eq!(
            table.translate_class("a", Direction::Forward),
            "net/minecraft/block/Block"
        );
        let field = table.translate_member("a", "c", None, Direction::Forward);
        assert_eq!(field.name, "field_1");
        let method = table.translate_member("a", "d", Some("(Lb;)V"), Direction::Forward);
        assert_eq!(
            method.descriptor.as_deref(),
            Some("(Lnet/minecraft/item/Item;)V")
        );
        assert_eq!(table.obf_name("net/minecraft/item/Item"), Some("b"));
    }
}
