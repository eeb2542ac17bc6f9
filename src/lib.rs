//! Classpatch: binary class patches and unified source patches across
//! renamed symbol spaces.
//!
//! The crate provides:
//! - SRG mapping tables with inner-class indexing and repackaging (`mapping`)
//! - A GDIFF binary delta codec (`delta`)
//! - Binary patch records, containers and the generation/reconstruction
//!   pipeline (`binpatch`)
//! - Selection of the compiled classes a set of source patches touches
//!   (`selection`)
//! - Unified diff generation and fuzzy application with chained stages
//!   (`textpatch`)
//! - An optional CLI (`cli` feature)
//!
//! # Quick Start
//!
//! ```
//! use classpatch::binpatch::{BinPatch, apply_patch};
//! use classpatch::checksum::adler32;
//! use classpatch::delta::compute_delta;
//!
//! let clean = [1u8, 2, 3];
//! let dirty = [1u8, 0x99, 3];
//!
//! let patch = BinPatch {
//!     obf_name: "a".into(),
//!     source_name: "a".into(),
//!     target_name: "net.minecraft.Foo".into(),
//!     checksum: Some(adler32(&clean)),
//!     delta: compute_delta(&clean, &dirty),
//! };
//! let bytes = patch.to_bytes().unwrap();
//! let decoded = BinPatch::from_bytes(&bytes).unwrap();
//! assert_eq!(apply_patch(&decoded, Some(&clean[..])).unwrap(), dirty);
//! ```

pub mod archive;
pub mod binpatch;
pub mod checksum;
pub mod delta;
pub mod mapping;
pub mod selection;
pub mod textpatch;

#[cfg(feature = "cli")]
pub mod cli;
