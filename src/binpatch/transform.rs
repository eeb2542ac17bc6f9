// Post-processing stages applied to serialised patch containers.
//
// A container's zip bytes pass through a packer stage and then a compressor
// stage before being written; readers undo them in reverse order. Stages
// are plain `bytes -> bytes` transforms behind the `Transform` trait:
//   - Identity (passthrough)
//   - LZMA (via lzma-rs, feature `lzma`)
//   - Zlib (via flate2, feature `zlib`)

use std::io;

/// Errors from a transform stage.
#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("{stage} failed: {source}")]
    Io {
        stage: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{stage} could not decode input: {reason}")]
    Decode { stage: &'static str, reason: String },
    #[error("unknown transform {0:?} (expected one of: none, lzma, zlib)")]
    Unknown(String),
}

// ---------------------------------------------------------------------------
// Transform trait
// ---------------------------------------------------------------------------

/// A reversible byte transform.
pub trait Transform: Send + Sync {
    /// Short name used in logs and on the command line.
    fn name(&self) -> &'static str;

    /// Encode `data` for writing.
    fn forward(&self, data: &[u8]) -> Result<Vec<u8>, TransformError>;

    /// Undo `forward`.
    fn reverse(&self, data: &[u8]) -> Result<Vec<u8>, TransformError>;
}

/// Passthrough stage.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn name(&self) -> &'static str {
        "none"
    }

    fn forward(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        Ok(data.to_vec())
    }

    fn reverse(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        Ok(data.to_vec())
    }
}

/// LZMA (`.lzma` "alone" format) stage.
#[cfg(feature = "lzma")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LzmaTransform;

#[cfg(feature = "lzma")]
impl Transform for LzmaTransform {
    fn name(&self) -> &'static str {
        "lzma"
    }

    fn forward(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        let mut input = io::Cursor::new(data);
        let mut output = Vec::new();
        lzma_rs::lzma_compress(&mut input, &mut output)
            .map_err(|source| TransformError::Io { stage: "lzma", source })?;
        Ok(output)
    }

    fn reverse(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        let mut input = io::BufReader::new(io::Cursor::new(data));
        let mut output = Vec::new();
        lzma_rs::lzma_decompress(&mut input, &mut output).map_err(|e| TransformError::Decode {
            stage: "lzma",
            reason: e.to_string(),
        })?;
        Ok(output)
    }
}

/// Zlib (deflate with zlib header) stage.
#[cfg(feature = "zlib")]
#[derive(Debug, Clone, Copy)]
pub struct ZlibTransform {
    level: flate2::Compression,
}

#[cfg(feature = "zlib")]
impl ZlibTransform {
    /// Compression level 0-9.
    pub fn new(level: u32) -> Self {
        Self {
            level: flate2::Compression::new(level),
        }
    }
}

#[cfg(feature = "zlib")]
impl Default for ZlibTransform {
    fn default() -> Self {
        Self::new(9)
    }
}

#[cfg(feature = "zlib")]
impl Transform for ZlibTransform {
    fn name(&self) -> &'static str {
        "zlib"
    }

    fn forward(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        use flate2::write::ZlibEncoder;
        use io::Write;

        let io_err = |source| TransformError::Io { stage: "zlib", source };
        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(data).map_err(io_err)?;
        encoder.finish().map_err(io_err)
    }

    fn reverse(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        use flate2::read::ZlibDecoder;
        use io::Read;

        let mut output = Vec::new();
        ZlibDecoder::new(data)
            .read_to_end(&mut output)
            .map_err(|e| TransformError::Decode {
                stage: "zlib",
                reason: e.to_string(),
            })?;
        Ok(output)
    }
}

/// Look up a built-in stage by name (`none`, `lzma`, `zlib`).
pub fn transform_by_name(name: &str) -> Result<Box<dyn Transform>, TransformError> {
    match name {
        "none" | "identity" => Ok(Box::new(Identity)),
        #[cfg(feature = "lzma")]
        "lzma" => Ok(Box::new(LzmaTransform)),
        #[cfg(feature = "zlib")]
        "zlib" => Ok(Box::<ZlibTransform>::default()),
        other => Err(TransformError::Unknown(other.to_owned())),
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

/// Packer stage followed by compressor stage.
pub struct TransformChain {
    packer: Box<dyn Transform>,
    compressor: Box<dyn Transform>,
}

impl TransformChain {
    pub fn new(packer: Box<dyn Transform>, compressor: Box<dyn Transform>) -> Self {
        Self { packer, compressor }
    }

    /// No packing, no compression.
    pub fn identity() -> Self {
        Self::new(Box::new(Identity), Box::new(Identity))
    }

    /// Encode container bytes for writing.
    pub fn apply(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        let packed = self.packer.forward(data)?;
        let out = self.compressor.forward(&packed)?;
        log::debug!(
            "transform {}+{}: {} -> {} bytes",
            self.packer.name(),
            self.compressor.name(),
            data.len(),
            out.len()
        );
        Ok(out)
    }

    /// Decode bytes produced by `apply`.
    pub fn undo(&self, data: &[u8]) -> Result<Vec<u8>, TransformError> {
        let unpacked = self.compressor.reverse(data)?;
        self.packer.reverse(&unpacked)
    }
}

impl Default for TransformChain {
    /// Identity packer with LZMA compression when available.
    fn default() -> Self {
        #[cfg(feature = "lzma")]
        let compressor: Box<dyn Transform> = Box::new(LzmaTransform);
        #[cfg(not(feature = "lzma"))]
        let compressor: Box<dyn Transform> = Box::new(Identity);
        Self::new(Box::new(Identity), compressor)
    }
}

impl std::fmt::Debug for TransformChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformChain")
            .field("packer", &self.packer.name())
            .field("compressor", &self.compressor.name())
            .finish()
    }
}
