// SRG line format.
//
//   PK: <obf-package> <target-package>          "." is the default package
//   CL: <obf-class> <target-class>
//   FD: <obf-owner>/<name> <target-owner>/<name>
//   MD: <obf-owner>/<name> <desc> <target-owner>/<name> <desc>
//
// Fields are whitespace separated; `#` starts a comment.

use std::io::{self, Write};

use super::table::Entries;

/// One parsed SRG record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Record<'a> {
    Package {
        obf: &'a str,
        target: &'a str,
    },
    Class {
        obf: &'a str,
        target: &'a str,
    },
    Field {
        owner: &'a str,
        name: &'a str,
        target_owner: &'a str,
        target_name: &'a str,
    },
    Method {
        owner: &'a str,
        name: &'a str,
        desc: &'a str,
        target_owner: &'a str,
        target_name: &'a str,
        target_desc: &'a str,
    },
}

/// Why a line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum LineError {
    UnknownType(String),
    FieldCount {
        kind: &'static str,
        expected: usize,
        found: usize,
    },
    MissingOwner(String),
}

impl std::fmt::Display for LineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineError::UnknownType(t) => write!(f, "unknown record type {t:?}"),
            LineError::FieldCount {
                kind,
                expected,
                found,
            } => write!(f, "{kind} record needs {expected} fields, found {found}"),
            LineError::MissingOwner(s) => write!(f, "member {s:?} has no owner class"),
        }
    }
}

/// Parse one line. `Ok(None)` for blank and comment-only lines.
pub(crate) fn parse_line(line: &str) -> Result<Option<Record<'_>>, LineError> {
    let content = match line.find('#') {
        Some(i) => &line[..i],
        None => line,
    };
    let parts: Vec<&str> = content.split_whitespace().collect();
    let Some(&kind) = parts.first() else {
        return Ok(None);
    };

    let expect = |kind: &'static str, expected: usize| {
        if parts.len() == expected {
            Ok(())
        } else {
            Err(LineError::FieldCount {
                kind,
                expected,
                found: parts.len(),
            })
        }
    };

    let record = match kind {
        "PK:" => {
            expect("PK", 3)?;
            Record::Package {
                obf: default_package(parts[1]),
                target: default_package(parts[2]),
            }
        }
        "CL:" => {
            expect("CL", 3)?;
            Record::Class {
                obf: parts[1],
                target: parts[2],
            }
        }
        "FD:" => {
            expect("FD", 3)?;
            let (owner, name) = split_member(parts[1])?;
            let (target_owner, target_name) = split_member(parts[2])?;
            Record::Field {
                owner,
                name,
                target_owner,
                target_name,
            }
        }
        "MD:" => {
            expect("MD", 5)?;
            let (owner, name) = split_member(parts[1])?;
            let (target_owner, target_name) = split_member(parts[3])?;
            Record::Method {
                owner,
                name,
                desc: parts[2],
                target_owner,
                target_name,
                target_desc: parts[4],
            }
        }
        other => return Err(LineError::UnknownType(other.to_owned())),
    };
    Ok(Some(record))
}

fn default_package(name: &str) -> &str {
    if name == "." { "" } else { name }
}

fn split_member(s: &str) -> Result<(&str, &str), LineError> {
    s.rsplit_once('/')
        .filter(|(owner, name)| !owner.is_empty() && !name.is_empty())
        .ok_or_else(|| LineError::MissingOwner(s.to_owned()))
}

/// Serialise `entries` as SRG, records grouped by type and sorted by key.
pub(crate) fn write_entries<W: Write>(entries: &Entries, out: &mut W) -> io::Result<()> {
    for (obf, target) in &entries.packages {
        let obf = if obf.is_empty() { "." } else { obf };
        let target = if target.is_empty() { "." } else { target };
        writeln!(out, "PK: {obf} {target}")?;
    }
    for (obf, target) in &entries.classes {
        writeln!(out, "CL: {obf} {target}")?;
    }
    for ((owner, name), (t_owner, t_name)) in &entries.fields {
        writeln!(out, "FD: {owner}/{name} {t_owner}/{t_name}")?;
    }
    for ((owner, name, desc), (t_owner, t_name, t_desc)) in &entries.methods {
        writeln!(out, "MD: {owner}/{name} {desc} {t_owner}/{t_name} {t_desc}")?;
    }
    Ok(())
}
