// Zip archives of compiled classes and of patch entries.
//
// Classes are stored as `<binary-name>.class`. Reads go through a single
// `ZipArchive` handle, so a `ClassArchive` is used from one thread at a time.
// Written archives are deterministic: entries in sorted order with a fixed
// timestamp.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, Cursor, Read, Seek, Write};
use std::path::Path;

use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Upper bound on the buffer reserved from an entry's declared size. Larger
/// entries grow while reading.
const MAX_PREALLOC: usize = 4 * 1024 * 1024;

fn prealloc_len(declared: u64) -> usize {
    usize::try_from(declared).map_or(MAX_PREALLOC, |len| len.min(MAX_PREALLOC))
}

/// Errors from reading or writing zip archives.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O error on archive {label}: {source}")]
    Io {
        label: String,
        #[source]
        source: io::Error,
    },
    #[error("invalid archive {label}: {source}")]
    Zip {
        label: String,
        #[source]
        source: ZipError,
    },
}

/// Read access to a zip of class files and resources.
pub struct ClassArchive<R> {
    zip: ZipArchive<R>,
    label: String,
}

impl ClassArchive<BufReader<File>> {
    /// Open an archive on disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let path = path.as_ref();
        let label = path.display().to_string();
        let file = File::open(path).map_err(|source| ArchiveError::Io {
            label: label.clone(),
            source,
        })?;
        Self::new(BufReader::new(file), label)
    }
}

impl ClassArchive<Cursor<Vec<u8>>> {
    /// Wrap an in-memory archive.
    pub fn from_bytes(bytes: Vec<u8>, label: impl Into<String>) -> Result<Self, ArchiveError> {
        Self::new(Cursor::new(bytes), label)
    }
}

impl<R: Read + Seek> ClassArchive<R> {
    pub fn new(reader: R, label: impl Into<String>) -> Result<Self, ArchiveError> {
        let label = label.into();
        let zip = ZipArchive::new(reader).map_err(|source| ArchiveError::Zip {
            label: label.clone(),
            source,
        })?;
        Ok(Self { zip, label })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Bytes of `<binary_name>.class`, or `None` if absent.
    pub fn read_class(&mut self, binary_name: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
        self.read_entry(&format!("{binary_name}.class"))
    }

    /// Bytes of an entry by path, or `None` if absent.
    pub fn read_entry(&mut self, name: &str) -> Result<Option<Vec<u8>>, ArchiveError> {
        let mut entry = match self.zip.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(source) => {
                return Err(ArchiveError::Zip {
                    label: self.label.clone(),
                    source,
                });
            }
        };
        let mut buf = Vec::with_capacity(prealloc_len(entry.size()));
        entry
            .read_to_end(&mut buf)
            .map_err(|source| ArchiveError::Io {
                label: format!("{}!{name}", self.label),
                source,
            })?;
        Ok(Some(buf))
    }

    /// Names of all file entries (directories excluded), sorted.
    pub fn entry_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .zip
            .file_names()
            .filter(|n| !n.ends_with('/'))
            .map(str::to_owned)
            .collect();
        names.sort();
        names
    }

    /// Read every file entry into memory.
    pub fn read_all(&mut self) -> Result<BTreeMap<String, Vec<u8>>, ArchiveError> {
        let mut out = BTreeMap::new();
        for name in self.entry_names() {
            if let Some(bytes) = self.read_entry(&name)? {
                out.insert(name, bytes);
            }
        }
        Ok(out)
    }
}

/// Write `entries` as a deterministic deflated zip into `out`.
pub fn write_zip<W: Write + Seek>(
    out: W,
    entries: &BTreeMap<String, Vec<u8>>,
    label: &str,
) -> Result<W, ArchiveError> {
    let zip_err = |source| ArchiveError::Zip {
        label: label.to_owned(),
        source,
    };
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644);

    let mut zip = ZipWriter::new(out);
    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options).map_err(zip_err)?;
        zip.write_all(bytes).map_err(|source| ArchiveError::Io {
            label: format!("{label}!{name}"),
            source,
        })?;
    }
    zip.finish().map_err(zip_err)
}

/// Write `entries` to a new in-memory zip.
pub fn zip_to_vec(entries: &BTreeMap<String, Vec<u8>>, label: &str) -> Result<Vec<u8>, ArchiveError> {
    Ok(write_zip(Cursor::new(Vec::new()), entries, label)?.into_inner())
}
