// Big-endian primitives in the layout of java.io.DataOutput.
//
// Strings use "modified UTF-8": a u16 byte length, then UTF-16 code units
// encoded as 1-3 bytes each. NUL is written as C0 80 and supplementary
// characters as a surrogate pair of two 3-byte sequences.

use super::RecordError;

/// Append `s` as a length-prefixed modified UTF-8 string.
pub fn write_utf(out: &mut Vec<u8>, s: &str) -> Result<(), RecordError> {
    let mut encoded = Vec::with_capacity(s.len());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007F => encoded.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                encoded.push(0xC0 | ((unit >> 6) & 0x1F) as u8);
                encoded.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                encoded.push(0xE0 | ((unit >> 12) & 0x0F) as u8);
                encoded.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                encoded.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    let len = u16::try_from(encoded.len()).map_err(|_| RecordError::StringTooLong {
        len: encoded.len(),
    })?;
    out.extend_from_slice(&len.to_be_bytes());
    out.extend_from_slice(&encoded);
    Ok(())
}

pub fn write_bool(out: &mut Vec<u8>, v: bool) {
    out.push(u8::from(v));
}

pub fn write_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// Cursor over a record buffer.
pub struct DataReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> DataReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_bytes(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], RecordError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&e| e <= self.buf.len())
            .ok_or(RecordError::Truncated {
                offset: self.pos,
                what,
            })?;
        let out = &self.buf[self.pos..end];
        self.pos = end;
        Ok(out)
    }

    pub fn read_bool(&mut self, what: &'static str) -> Result<bool, RecordError> {
        Ok(self.read_bytes(1, what)?[0] != 0)
    }

    pub fn read_i32(&mut self, what: &'static str) -> Result<i32, RecordError> {
        let b = self.read_bytes(4, what)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a length-prefixed modified UTF-8 string.
    pub fn read_utf(&mut self, what: &'static str) -> Result<String, RecordError> {
        let len_bytes = self.read_bytes(2, what)?;
        let len = u16::from_be_bytes([len_bytes[0], len_bytes[1]]) as usize;
        let start = self.pos;
        let bytes = self.read_bytes(len, what)?;

        let bad = || RecordError::BadUtf {
            offset: start,
            what,
        };
        let mut units = Vec::with_capacity(len);
        let mut i = 0;
        while i < bytes.len() {
            let b0 = u16::from(bytes[i]);
            match bytes[i] {
                0x01..=0x7F => {
                    units.push(b0);
                    i += 1;
                }
                0xC0..=0xDF => {
                    let b1 = continuation(bytes, i + 1).ok_or_else(bad)?;
                    units.push(((b0 & 0x1F) << 6) | b1);
                    i += 2;
                }
                0xE0..=0xEF => {
                    let b1 = continuation(bytes, i + 1).ok_or_else(bad)?;
                    let b2 = continuation(bytes, i + 2).ok_or_else(bad)?;
                    units.push(((b0 & 0x0F) << 12) | (b1 << 6) | b2);
                    i += 3;
                }
                _ => return Err(bad()),
            }
        }
        String::from_utf16(&units).map_err(|_| bad())
    }
}

fn continuation(bytes: &[u8], i: usize) -> Option<u16> {
    let b = *bytes.get(i)?;
    (b & 0xC0 == 0x80).then_some(u16::from(b & 0x3F))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utf(s: &str) -> Vec<u8> {
        let mut out = Vec::new();
        write_utf(&mut out, s).unwrap();
        out
    }

    #[test]
    fn ascii_layout() {
        assert_eq!(utf("a/b"), [0x00, 0x03, b'a', b'/', b'b']);
    }

    #[test]
    fn nul_uses_two_bytes() {
        assert_eq!(utf("\0"), [0x00, 0x02, 0xC0, 0x80]);
    }

    #[test]
    fn supplementary_uses_surrogate_pair() {
        // U+1F600 -> D83D DE00 -> ED A0 BD ED B8 80
        assert_eq!(
            utf("\u{1F600}"),
            [0x00, 0x06, 0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80]
        );
    }

    #[test]
    fn strings_read_back() {
        for s in ["", "net.minecraft.block.Block", "é\0\u{1F600}x", "日本"] {
            let bytes = utf(s);
            let mut r = DataReader::new(&bytes);
            assert_eq!(r.read_utf("name").unwrap(), s);
            assert_eq!(r.remaining(), 0);
        }
    }

    #[test]
    fn overlong_string_rejected() {
        let long = "x".repeat(70_000);
        let mut out = Vec::new();
        assert!(matches!(
            write_utf(&mut out, &long),
            Err(RecordError::StringTooLong { len: 70_000 })
        ));
    }

    #[test]
    fn bad_continuation_rejected() {
        let bytes = [0x00, 0x02, 0xC3, 0x41];
        assert!(matches!(
            DataReader::new(&bytes).read_utf("name"),
            Err(RecordError::BadUtf { .. })
        ));
    }

    #[test]
    fn ints_are_big_endian() {
        let mut out = Vec::new();
        write_i32(&mut out, -2);
        write_bool(&mut out, true);
        assert_eq!(out, [0xFF, 0xFF, 0xFF, 0xFE, 0x01]);
        let mut r = DataReader::new(&out);
        assert_eq!(r.read_i32("v").unwrap(), -2);
        assert!(r.read_bool("b").unwrap());
        assert!(r.read_bool("b").is_err());
    }
}
