// GDIFF wire format (W3C NOTE-gdiff-19970901).
//
// A stream is a 5-byte header followed by opcodes, terminated by EOF (0):
//
//   0          EOF
//   1..=246    DATA, that many literal bytes follow
//   247        DATA, u16 length + bytes
//   248        DATA, i32 length + bytes
//   249        COPY, u16 offset, u8 length
//   250        COPY, u16 offset, u16 length
//   251        COPY, u16 offset, i32 length
//   252        COPY, i32 offset, u8 length
//   253        COPY, i32 offset, u16 length
//   254        COPY, i32 offset, i32 length
//   255        COPY, i64 offset, i32 length
//
// All integers are big-endian. Signed fields must be non-negative.

use super::DeltaError;

/// Stream magic.
pub const GDIFF_MAGIC: [u8; 4] = [0xD1, 0xFF, 0xD1, 0xFF];

/// Format version written after the magic.
pub const GDIFF_VERSION: u8 = 4;

pub const OP_EOF: u8 = 0;
pub const OP_DATA_MAX_INLINE: u8 = 246;
pub const OP_DATA_USHORT: u8 = 247;
pub const OP_DATA_INT: u8 = 248;
pub const OP_COPY_USHORT_UBYTE: u8 = 249;
pub const OP_COPY_USHORT_USHORT: u8 = 250;
pub const OP_COPY_USHORT_INT: u8 = 251;
pub const OP_COPY_INT_UBYTE: u8 = 252;
pub const OP_COPY_INT_USHORT: u8 = 253;
pub const OP_COPY_INT_INT: u8 = 254;
pub const OP_COPY_LONG_INT: u8 = 255;

const I32_MAX: usize = i32::MAX as usize;

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

/// Write the stream header.
pub fn write_header(out: &mut Vec<u8>) {
    out.extend_from_slice(&GDIFF_MAGIC);
    out.push(GDIFF_VERSION);
}

/// Write the terminating EOF opcode.
pub fn write_eof(out: &mut Vec<u8>) {
    out.push(OP_EOF);
}

/// Emit literal bytes using the narrowest DATA form.
pub fn write_data(out: &mut Vec<u8>, mut data: &[u8]) {
    while !data.is_empty() {
        let n = data.len().min(I32_MAX);
        if n <= OP_DATA_MAX_INLINE as usize {
            out.push(n as u8);
        } else if n <= u16::MAX as usize {
            out.push(OP_DATA_USHORT);
            out.extend_from_slice(&(n as u16).to_be_bytes());
        } else {
            out.push(OP_DATA_INT);
            out.extend_from_slice(&(n as i32).to_be_bytes());
        }
        out.extend_from_slice(&data[..n]);
        data = &data[n..];
    }
}

/// Emit a copy from the base using the narrowest COPY form.
pub fn write_copy(out: &mut Vec<u8>, mut offset: usize, mut len: usize) {
    while len > 0 {
        let n = len.min(I32_MAX);
        if offset <= u16::MAX as usize {
            let off = (offset as u16).to_be_bytes();
            if n <= u8::MAX as usize {
                out.push(OP_COPY_USHORT_UBYTE);
                out.extend_from_slice(&off);
                out.push(n as u8);
            } else if n <= u16::MAX as usize {
                out.push(OP_COPY_USHORT_USHORT);
                out.extend_from_slice(&off);
                out.extend_from_slice(&(n as u16).to_be_bytes());
            } else {
                out.push(OP_COPY_USHORT_INT);
                out.extend_from_slice(&off);
                out.extend_from_slice(&(n as i32).to_be_bytes());
            }
        } else if offset <= I32_MAX {
            let off = (offset as i32).to_be_bytes();
            if n <= u8::MAX as usize {
                out.push(OP_COPY_INT_UBYTE);
                out.extend_from_slice(&off);
                out.push(n as u8);
            } else if n <= u16::MAX as usize {
                out.push(OP_COPY_INT_USHORT);
                out.extend_from_slice(&off);
                out.extend_from_slice(&(n as u16).to_be_bytes());
            } else {
                out.push(OP_COPY_INT_INT);
                out.extend_from_slice(&off);
                out.extend_from_slice(&(n as i32).to_be_bytes());
            }
        } else {
            out.push(OP_COPY_LONG_INT);
            out.extend_from_slice(&(offset as i64).to_be_bytes());
            out.extend_from_slice(&(n as i32).to_be_bytes());
        }
        offset += n;
        len -= n;
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// One decoded GDIFF operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op<'a> {
    /// Literal bytes carried in the stream.
    Data(&'a [u8]),
    /// Copy `len` bytes from the base starting at `offset`.
    Copy { offset: u64, len: usize },
}

/// Cursor over a GDIFF stream, yielding operations until EOF.
pub struct OpReader<'a> {
    buf: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> OpReader<'a> {
    /// Validate the header and position the reader on the first opcode.
    pub fn new(buf: &'a [u8]) -> Result<Self, DeltaError> {
        if buf.len() < 5 {
            return Err(DeltaError::Truncated {
                offset: 0,
                what: "header",
            });
        }
        if buf[..4] != GDIFF_MAGIC {
            return Err(DeltaError::BadMagic);
        }
        if buf[4] != GDIFF_VERSION {
            return Err(DeltaError::UnsupportedVersion(buf[4]));
        }
        Ok(Self {
            buf,
            pos: 5,
            done: false,
        })
    }

    /// Read the next operation. Returns `None` after EOF.
    ///
    /// Bytes following the EOF opcode are rejected.
    pub fn next_op(&mut self) -> Result<Option<Op<'a>>, DeltaError> {
        if self.done {
            return Ok(None);
        }
        let opcode_at = self.pos;
        let opcode = self.take_u8("opcode")?;
        let op = match opcode {
            OP_EOF => {
                self.done = true;
                if self.pos != self.buf.len() {
                    return Err(DeltaError::TrailingData { offset: self.pos });
                }
                return Ok(None);
            }
            1..=OP_DATA_MAX_INLINE => Op::Data(self.take(opcode as usize, "data")?),
            OP_DATA_USHORT => {
                let n = self.take_u16("data length")? as usize;
                Op::Data(self.take(n, "data")?)
            }
            OP_DATA_INT => {
                let n = self.take_i32(opcode_at, "data length")?;
                Op::Data(self.take(n, "data")?)
            }
            OP_COPY_USHORT_UBYTE => Op::Copy {
                offset: u64::from(self.take_u16("copy offset")?),
                len: self.take_u8("copy length")? as usize,
            },
            OP_COPY_USHORT_USHORT => Op::Copy {
                offset: u64::from(self.take_u16("copy offset")?),
                len: self.take_u16("copy length")? as usize,
            },
            OP_COPY_USHORT_INT => Op::Copy {
                offset: u64::from(self.take_u16("copy offset")?),
                len: self.take_i32(opcode_at, "copy length")?,
            },
            OP_COPY_INT_UBYTE => Op::Copy {
                offset: self.take_i32(opcode_at, "copy offset")? as u64,
                len: self.take_u8("copy length")? as usize,
            },
            OP_COPY_INT_USHORT => Op::Copy {
                offset: self.take_i32(opcode_at, "copy offset")? as u64,
                len: self.take_u16("copy length")? as usize,
            },
            OP_COPY_INT_INT => Op::Copy {
                offset: self.take_i32(opcode_at, "copy offset")? as u64,
                len: self.take_i32(opcode_at, "copy length")?,
            },
            OP_COPY_LONG_INT => {
                let raw = self.take(8, "copy offset")?;
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(raw);
                let offset = i64::from_be_bytes(bytes);
                if offset < 0 {
                    return Err(DeltaError::NegativeField {
                        offset: opcode_at,
                        what: "copy offset",
                    });
                }
                Op::Copy {
                    offset: offset as u64,
                    len: self.take_i32(opcode_at, "copy length")?,
                }
            }
        };
        Ok(Some(op))
    }

    /// Byte position of the cursor within the stream.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], DeltaError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|&end| end <= self.buf.len())
            .ok_or(DeltaError::Truncated {
                offset: self.pos,
                what,
            })?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn take_u8(&mut self, what: &'static str) -> Result<u8, DeltaError> {
        Ok(self.take(1, what)?[0])
    }

    fn take_u16(&mut self, what: &'static str) -> Result<u16, DeltaError> {
        let b = self.take(2, what)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn take_i32(&mut self, opcode_at: usize, what: &'static str) -> Result<usize, DeltaError> {
        let b = self.take(4, what)?;
        let v = i32::from_be_bytes([b[0], b[1], b[2], b[3]]);
        if v < 0 {
            return Err(DeltaError::NegativeField {
                offset: opcode_at,
                what,
            });
        }
        Ok(v as usize)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
