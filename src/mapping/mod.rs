// Symbol mapping table.
//
// Renames between the obfuscated naming space and a target naming space for
// packages, classes, fields and methods. Tables are assembled by a
// `MappingTableBuilder` from one or more SRG files, then frozen into an
// immutable `MappingTable` that is shared behind an `Arc`.

mod repackage;
mod srg;
mod table;

pub use repackage::{DEFAULT_FLAT_PACKAGE, Repackager};
pub use table::{LoadReport, MappingTable, MappingTableBuilder, PatchTarget};

use std::io;

/// Errors raised while loading mapping or packaging sources.
#[derive(Debug, thiserror::Error)]
pub enum MappingError {
    #[error("failed to read mapping source {label}: {source}")]
    Io {
        label: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to read packaging table {label}: {source}")]
    Csv {
        label: String,
        #[source]
        source: csv::Error,
    },
}

/// Which way a lookup goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Obfuscated name to target name.
    Forward,
    /// Target name back to obfuscated name.
    Reverse,
}

/// A translated field or method reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    pub owner: String,
    pub name: String,
    /// `None` for fields.
    pub descriptor: Option<String>,
}

/// Rewrite every `L<class>;` reference in a JVM descriptor through `map`.
///
/// Anything outside object references, and an unterminated trailing `L...`,
/// is copied unchanged.
pub(crate) fn map_descriptor(desc: &str, mut map: impl FnMut(&str) -> String) -> String {
    let mut out = String::with_capacity(desc.len() + 16);
    let mut rest = desc;
    while let Some(start) = rest.find('L') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find(';') {
            Some(end) => {
                out.push('L');
                out.push_str(&map(&after[..end]));
                out.push(';');
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_references_are_mapped() {
        let out = map_descriptor("(ILa;[Lb$c;)La;", |c| format!("x/{c}"));
        assert_eq!(out, "(ILx/a;[Lx/b$c;)Lx/a;");
    }

    #[test]
    fn primitive_descriptor_untouched() {
        assert_eq!(map_descriptor("(IJZ)V", |_| unreachable!()), "(IJZ)V");
    }

    #[test]
    fn unterminated_reference_copied() {
        assert_eq!(map_descriptor("(La", |c| c.to_uppercase()), "(La");
    }
}
