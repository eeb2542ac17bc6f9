// Block index over the base buffer.
//
// The base is split into non-overlapping BLOCK_SIZE blocks; each block's
// rolling checksum maps to its offset. The table keeps the first block seen
// for a checksum, so earlier base offsets are preferred on collision.
// Target windows are rolled one byte at a time and looked up here.

/// LCG multiplier used to spread checksums over buckets.
const HASH_MULT_32: u32 = 1_597_334_677;

/// Stored offsets are biased by one so that 0 marks an empty bucket.
const EMPTY: u32 = 0;

// ---------------------------------------------------------------------------
// Rolling checksum
// ---------------------------------------------------------------------------

/// Adler-style rolling checksum over a fixed window.
///
/// `a` is the byte sum and `b` the position-weighted sum, both kept with
/// wrapping arithmetic. Only the low 16 bits of each are significant, so a
/// freshly computed value and a rolled value agree exactly.
#[derive(Debug, Clone, Copy)]
pub struct RollingChecksum {
    a: u32,
    b: u32,
    window: u32,
}

impl RollingChecksum {
    /// Checksum of `window` from scratch.
    pub fn new(window: &[u8]) -> Self {
        let n = window.len() as u32;
        let mut a = 0u32;
        let mut b = 0u32;
        for (i, &byte) in window.iter().enumerate() {
            let byte = u32::from(byte);
            a = a.wrapping_add(byte);
            b = b.wrapping_add((n - i as u32).wrapping_mul(byte));
        }
        Self { a, b, window: n }
    }

    /// Slide the window one byte: drop `out`, append `incoming`.
    #[inline(always)]
    pub fn roll(&mut self, out: u8, incoming: u8) {
        let out = u32::from(out);
        self.a = self.a.wrapping_sub(out).wrapping_add(u32::from(incoming));
        self.b = self
            .b
            .wrapping_sub(self.window.wrapping_mul(out))
            .wrapping_add(self.a);
    }

    /// Packed 32-bit value: `b` in the high half, `a` in the low half.
    #[inline(always)]
    pub fn value(&self) -> u32 {
        ((self.b & 0xFFFF) << 16) | (self.a & 0xFFFF)
    }
}

// ---------------------------------------------------------------------------
// Block table
// ---------------------------------------------------------------------------

/// Open bucket table from checksum to base block offset.
///
/// No chaining: the first insert into a bucket wins and later inserts with a
/// colliding bucket are dropped.
pub struct BlockIndex {
    table: Vec<u32>,
    shift: u32,
    block_size: usize,
}

impl BlockIndex {
    /// Index every whole `block_size` block of `base`.
    pub fn new(base: &[u8], block_size: usize) -> Self {
        let blocks = base.len() / block_size.max(1);
        // Power-of-two bucket count at least twice the block count.
        let bits = (blocks.max(1) * 2).next_power_of_two().trailing_zeros().clamp(4, 30);
        let mut index = Self {
            table: vec![EMPTY; 1usize << bits],
            shift: 32 - bits,
            block_size,
        };
        for start in (0..blocks).map(|i| i * block_size) {
            // Offsets that do not fit the biased u32 slot are not indexed.
            let Some(stored) = u32::try_from(start).ok().and_then(|s| s.checked_add(1)) else {
                break;
            };
            let sum = RollingChecksum::new(&base[start..start + block_size]).value();
            let bucket = index.bucket(sum);
            if index.table[bucket] == EMPTY {
                index.table[bucket] = stored;
            }
        }
        index
    }

    /// Base offset of a block whose bytes equal `window`, if one is indexed
    /// under `checksum`.
    #[inline]
    pub fn find(&self, checksum: u32, base: &[u8], window: &[u8]) -> Option<usize> {
        debug_assert_eq!(window.len(), self.block_size);
        let stored = self.table[self.bucket(checksum)];
        if stored == EMPTY {
            return None;
        }
        let offset = (stored - 1) as usize;
        let candidate = base.get(offset..offset + self.block_size)?;
        (candidate == window).then_some(offset)
    }

    #[inline(always)]
    fn bucket(&self, checksum: u32) -> usize {
        (checksum.wrapping_mul(HASH_MULT_32) >> self.shift) as usize
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
