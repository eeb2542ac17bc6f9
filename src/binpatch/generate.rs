// Binary patch generation.
//
// For every baseline root and every touched class (sorted), diff the
// baseline class against the dirty class and emit one record:
//   - client/server records -> runtime container
//   - merged records        -> dev container
//
// Archive reads are sequential; delta computation runs on the rayon pool
// when the `parallel` feature is enabled.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::container::{PatchContainer, Side};
use super::record::BinPatch;
use super::transform::TransformChain;
use super::ContainerError;
use crate::archive::{ArchiveError, ClassArchive};
use crate::checksum::adler32;
use crate::delta::compute_delta;
use crate::mapping::{Direction, MappingTable};

/// Errors from patch generation.
#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error("touched class {class} is missing from dirty archive {archive}")]
    MissingFromDirty { class: String, archive: String },
    #[error("more than one baseline archive given for side {0}")]
    DuplicateBaseline(Side),
}

/// A clean archive for one baseline root.
pub struct Baseline<R = BufReader<File>> {
    pub side: Side,
    pub archive: ClassArchive<R>,
}

impl Baseline {
    /// Open a baseline archive from disk.
    pub fn open(side: Side, path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        Ok(Self {
            side,
            archive: ClassArchive::open(path)?,
        })
    }
}

/// Knobs for `BinPatchGenerator`.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Skip (with a warning) touched classes absent from the dirty archive
    /// instead of failing.
    pub skip_missing_dirty: bool,
}

/// The two output containers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedPatches {
    /// Client and server records.
    pub runtime: PatchContainer,
    /// Merged records.
    pub dev: PatchContainer,
}

impl GeneratedPatches {
    /// Encode both containers through `chain` and write them.
    pub fn write_containers(
        &self,
        runtime_path: &Path,
        dev_path: &Path,
        chain: &TransformChain,
    ) -> Result<(), GenerateError> {
        self.runtime.write_to(runtime_path, chain)?;
        self.dev.write_to(dev_path, chain)?;
        Ok(())
    }
}

/// Input for one record, gathered before delta computation.
struct ClassJob {
    obf: String,
    clean: Option<Vec<u8>>,
    dirty: Vec<u8>,
}

/// Builds binary patch containers from baseline and dirty archives.
pub struct BinPatchGenerator {
    mapping: Arc<MappingTable>,
    options: GenerateOptions,
}

impl BinPatchGenerator {
    pub fn new(mapping: Arc<MappingTable>) -> Self {
        Self::with_options(mapping, GenerateOptions::default())
    }

    pub fn with_options(mapping: Arc<MappingTable>, options: GenerateOptions) -> Self {
        Self { mapping, options }
    }

    /// Generate records for every `(baseline, touched class)` pair.
    ///
    /// `touched` holds obfuscated binary names.
    pub fn generate<R, D>(
        &self,
        baselines: &mut [Baseline<R>],
        dirty: &mut ClassArchive<D>,
        touched: &BTreeSet<String>,
    ) -> Result<GeneratedPatches, GenerateError>
    where
        R: Read + Seek,
        D: Read + Seek,
    {
        let mut seen = BTreeSet::new();
        for baseline in baselines.iter() {
            if !seen.insert(baseline.side) {
                return Err(GenerateError::DuplicateBaseline(baseline.side));
            }
        }

        let mut out = GeneratedPatches::default();
        for baseline in baselines.iter_mut() {
            let jobs = self.collect_jobs(baseline, dirty, touched)?;
            let patches = self.compute(jobs);
            let container = if baseline.side.is_runtime() {
                &mut out.runtime
            } else {
                &mut out.dev
            };
            let count = patches.len();
            for patch in patches {
                container.insert(baseline.side, patch);
            }
            log::info!(
                "{}: {count} class patches from {}",
                baseline.side,
                baseline.archive.label()
            );
        }
        Ok(out)
    }

    fn collect_jobs<R, D>(
        &self,
        baseline: &mut Baseline<R>,
        dirty: &mut ClassArchive<D>,
        touched: &BTreeSet<String>,
    ) -> Result<Vec<ClassJob>, GenerateError>
    where
        R: Read + Seek,
        D: Read + Seek,
    {
        let mut jobs = Vec::with_capacity(touched.len());
        for obf in touched {
            let Some(dirty_bytes) = dirty.read_class(obf)? else {
                if self.options.skip_missing_dirty {
                    log::warn!("{obf} missing from {}, skipping", dirty.label());
                    continue;
                }
                return Err(GenerateError::MissingFromDirty {
                    class: obf.clone(),
                    archive: dirty.label().to_owned(),
                });
            };
            let clean = baseline.archive.read_class(obf)?;
            if clean.is_none() {
                log::debug!("{}: {obf} is new", baseline.side);
            }
            jobs.push(ClassJob {
                obf: obf.clone(),
                clean,
                dirty: dirty_bytes,
            });
        }
        Ok(jobs)
    }

    #[cfg(feature = "parallel")]
    fn compute(&self, jobs: Vec<ClassJob>) -> Vec<BinPatch> {
        jobs.into_par_iter().map(|job| self.make_patch(job)).collect()
    }

    #[cfg(not(feature = "parallel"))]
    fn compute(&self, jobs: Vec<ClassJob>) -> Vec<BinPatch> {
        jobs.into_iter().map(|job| self.make_patch(job)).collect()
    }

    fn make_patch(&self, job: ClassJob) -> BinPatch {
        let clean = job.clean.as_deref().unwrap_or(&[]);
        let delta = compute_delta(clean, &job.dirty);
        let target = self.mapping.translate_class(&job.obf, Direction::Forward);
        BinPatch {
            source_name: job.obf.replace('/', "."),
            target_name: target.replace('/', "."),
            checksum: job.clean.as_deref().map(adler32),
            obf_name: job.obf,
            delta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::zip_to_vec;
    use crate::mapping::MappingTableBuilder;
    use std::collections::BTreeMap;
    use std::io::Cursor;

    fn archive(classes: &[(&str, &[u8])]) -> ClassArchive<Cursor<Vec<u8>>> {
        let entries: BTreeMap<String, Vec<u8>> = classes
            .iter()
            .map(|(n, b)| (format!("{n}.class"), b.to_vec()))
            .collect();
        ClassArchive::from_bytes(zip_to_vec(&entries, "t").unwrap(), "t").unwrap()
    }

    fn generator() -> BinPatchGenerator {
        let mut b = MappingTableBuilder::new();
        b.class("a", "net/minecraft/Foo").class("c", "net/minecraft/New");
        BinPatchGenerator::new(Arc::new(b.build()))
    }

    fn touched(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sides_split_between_containers() {
        let mut baselines = vec![
            Baseline {
                side: Side::Client,
                archive: archive(&[("a", &[1, 2, 3])]),
            },
            Baseline {
                side: Side::Merged,
                archive: archive(&[("a", &[1, 2, 3])]),
            },
        ];
        let mut dirty = archive(&[("a", &[1, 0x99, 3])]);
        let out = generator()
            .generate(&mut baselines, &mut dirty, &touched(&["a"]))
            .unwrap();

        let client = out.runtime.get(Side::Client, "net.minecraft.Foo").unwrap();
        assert_eq!(client.obf_name, "a");
        assert_eq!(client.source_name, "a");
        assert_eq!(client.checksum, Some(adler32(&[1, 2, 3])));
        assert_eq!(out.runtime.len(), 1);
        assert_eq!(out.dev.len(), 1);
        assert!(out.dev.get(Side::Merged, "net.minecraft.Foo").is_some());
    }

    #[test]
    fn new_class_has_no_checksum() {
        let mut baselines = vec![Baseline {
            side: Side::Server,
            archive: archive(&[]),
        }];
        let mut dirty = archive(&[("c", &[0xAA, 0xBB])]);
        let out = generator()
            .generate(&mut baselines, &mut dirty, &touched(&["c"]))
            .unwrap();
        let rec = out.runtime.get(Side::Server, "net.minecraft.New").unwrap();
        assert!(!rec.exists_in_baseline());
    }

    #[test]
    fn missing_dirty_class_is_fatal() {
        let mut baselines = vec![Baseline {
            side: Side::Client,
            archive: archive(&[("a", &[1])]),
        }];
        let mut dirty = archive(&[]);
        let err = generator()
            .generate(&mut baselines, &mut dirty, &touched(&["a"]))
            .unwrap_err();
        assert!(matches!(err, GenerateError::MissingFromDirty { ref class, .. } if class == "a"));
    }

    #[test]
    fn missing_dirty_class_can_be_skipped() {
        let mut baselines = vec![Baseline {
            side: Side::Client,
            archive: archive(&[("a", &[1])]),
        }];
        let mut dirty = archive(&[]);
        let mapping = generator().mapping;
        let lenient = BinPatchGenerator::with_options(
            mapping,
            GenerateOptions {
                skip_missing_dirty: true,
            },
        );
        let out = lenient
            .generate(&mut baselines, &mut dirty, &touched(&["a"]))
            .unwrap();
        assert!(out.runtime.is_empty());
    }

    #[test]
    fn duplicate_sides_rejected() {
        let mut baselines = vec![
            Baseline {
                side: Side::Client,
                archive: archive(&[]),
            },
            Baseline {
                side: Side::Client,
                archive: archive(&[]),
            },
        ];
        let mut dirty = archive(&[]);
        assert!(matches!(
            generator().generate(&mut baselines, &mut dirty, &BTreeSet::new()),
            Err(GenerateError::DuplicateBaseline(Side::Client))
        ));
    }

    #[test]
    fn unmapped_class_keeps_obfuscated_target_name() {
        let mut baselines = vec![Baseline {
            side: Side::Client,
            archive: archive(&[("x/y", &[5])]),
        }];
        let mut dirty = archive(&[("x/y", &[6])]);
        let out = generator()
            .generate(&mut baselines, &mut dirty, &touched(&["x/y"]))
            .unwrap();
        let rec = out.runtime.get(Side::Client, "x.y").unwrap();
        assert_eq!(rec.source_name, "x.y");
    }
}
