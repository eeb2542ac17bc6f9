// One class's binary patch record.
//
// Wire layout (big-endian, java.io.DataOutput style):
//
//   UTF      obfuscated binary name           e.g. "a/b"
//   UTF      source dotted name               e.g. "a.b"
//   UTF      target dotted name               e.g. "net.minecraft.Foo"
//   bool     exists in baseline
//   i32      Adler-32 of baseline bytes       only if exists
//   i32      delta length
//   [u8]     GDIFF delta

use super::RecordError;
use super::data_io::{DataReader, write_bool, write_i32, write_utf};

/// Reconstructable difference for one class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinPatch {
    /// Obfuscated binary name (`/` separated).
    pub obf_name: String,
    /// Obfuscated name in dotted form.
    pub source_name: String,
    /// Target-space name in dotted form.
    pub target_name: String,
    /// Adler-32 of the baseline class; `None` when the class is new.
    pub checksum: Option<u32>,
    /// GDIFF stream rebuilding the patched class.
    pub delta: Vec<u8>,
}

impl BinPatch {
    /// Whether the class was present in the baseline archive.
    pub fn exists_in_baseline(&self) -> bool {
        self.checksum.is_some()
    }

    /// Serialise to the record wire format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RecordError> {
        let mut out = Vec::with_capacity(self.delta.len() + 64);
        write_utf(&mut out, &self.obf_name)?;
        write_utf(&mut out, &self.source_name)?;
        write_utf(&mut out, &self.target_name)?;
        write_bool(&mut out, self.exists_in_baseline());
        if let Some(sum) = self.checksum {
            write_i32(&mut out, sum as i32);
        }
        let len = i32::try_from(self.delta.len()).map_err(|_| RecordError::DeltaTooLarge {
            len: self.delta.len(),
        })?;
        write_i32(&mut out, len);
        out.extend_from_slice(&self.delta);
        Ok(out)
    }

    /// Parse a record. Trailing bytes after the delta are rejected.
    pub fn from_bytes(buf: &[u8]) -> Result<Self, RecordError> {
        let mut r = DataReader::new(buf);
        let obf_name = r.read_utf("obfuscated name")?;
        let source_name = r.read_utf("source name")?;
        let target_name = r.read_utf("target name")?;
        let checksum = if r.read_bool("exists flag")? {
            Some(r.read_i32("checksum")? as u32)
        } else {
            None
        };
        let len = r.read_i32("delta length")?;
        let len = usize::try_from(len).map_err(|_| RecordError::NegativeLength(len))?;
        let delta = r.read_bytes(len, "delta")?.to_vec();
        if r.remaining() != 0 {
            return Err(RecordError::TrailingBytes {
                count: r.remaining(),
            });
        }
        Ok(Self {
            obf_name,
            source_name,
            target_name,
            checksum,
            delta,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(checksum: Option<u32>) -> BinPatch {
        BinPatch {
            obf_name: "a/b".into(),
            source_name: "a.b".into(),
            target_name: "net.minecraft.Foo".into(),
            checksum,
            delta: vec![0xD1, 0xFF, 0xD1, 0xFF, 0x04, 0x00],
        }
    }

    #[test]
    fn existing_class_layout() {
        let bytes = record(Some(0x8000_0001)).to_bytes().unwrap();
        let mut expected = vec![0x00, 0x03, b'a', b'/', b'b'];
        expected.extend_from_slice(&[0x00, 0x03, b'a', b'.', b'b']);
        expected.extend_from_slice(&[0x00, 0x11]);
        expected.extend_from_slice(b"net.minecraft.Foo");
        expected.push(0x01);
        expected.extend_from_slice(&[0x80, 0x00, 0x00, 0x01]);
        expected.extend_from_slice(&[0x00, 0x00, 0x00, 0x06]);
        expected.extend_from_slice(&[0xD1, 0xFF, 0xD1, 0xFF, 0x04, 0x00]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn round_trip_with_and_without_checksum() {
        for checksum in [Some(0xDEAD_BEEF), None] {
            let patch = record(checksum);
            let parsed = BinPatch::from_bytes(&patch.to_bytes().unwrap()).unwrap();
            assert_eq!(parsed, patch);
            assert_eq!(parsed.exists_in_baseline(), checksum.is_some());
        }
    }

    #[test]
    fn new_class_omits_checksum() {
        let with = record(Some(1)).to_bytes().unwrap();
        let without = record(None).to_bytes().unwrap();
        assert_eq!(with.len(), without.len() + 4);
    }

    #[test]
    fn truncated_delta_rejected() {
        let mut bytes = record(None).to_bytes().unwrap();
        bytes.pop();
        assert!(matches!(
            BinPatch::from_bytes(&bytes),
            Err(RecordError::Truncated { what: "delta", .. })
        ));
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut bytes = record(None).to_bytes().unwrap();
        bytes.push(0);
        assert!(matches!(
            BinPatch::from_bytes(&bytes),
            Err(RecordError::TrailingBytes { count: 1 })
        ));
    }

    #[test]
    fn negative_length_rejected() {
        let mut bytes = Vec::new();
        for s in ["a", "a", "A"] {
            write_utf(&mut bytes, s).unwrap();
        }
        write_bool(&mut bytes, false);
        write_i32(&mut bytes, -5);
        assert!(matches!(
            BinPatch::from_bytes(&bytes),
            Err(RecordError::NegativeLength(-5))
        ));
    }
}
