// Match finding and GDIFF emission.
//
// Flow: index base blocks -> roll over target -> verify + extend matches
// -> coalesce -> write opcodes.

use super::gdiff;
use super::index::{BlockIndex, RollingChecksum};

/// Size of the base blocks indexed for matching.
pub const BLOCK_SIZE: usize = 16;

/// A delta instruction, independent of its wire width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Literal bytes taken from the target.
    Add { len: usize },
    /// Bytes copied from the base.
    Copy { offset: usize, len: usize },
}

impl Instruction {
    /// Number of target bytes produced.
    pub fn len(&self) -> usize {
        match *self {
            Instruction::Add { len } | Instruction::Copy { len, .. } => len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Compute a GDIFF stream rebuilding `target` from `base`.
///
/// An empty or very short base yields a single DATA run.
pub fn compute_delta(base: &[u8], target: &[u8]) -> Vec<u8> {
    let instructions = optimize(&find_instructions(base, target));

    let mut out = Vec::with_capacity(target.len() / 4 + 16);
    gdiff::write_header(&mut out);
    let mut pos = 0usize;
    for inst in &instructions {
        match *inst {
            Instruction::Add { len } => {
                gdiff::write_data(&mut out, &target[pos..pos + len]);
            }
            Instruction::Copy { offset, len } => {
                gdiff::write_copy(&mut out, offset, len);
            }
        }
        pos += inst.len();
    }
    debug_assert_eq!(pos, target.len());
    gdiff::write_eof(&mut out);

    log::trace!(
        "delta: base={} target={} instructions={} encoded={}",
        base.len(),
        target.len(),
        instructions.len(),
        out.len()
    );
    out
}

/// Produce the instruction sequence covering `target` left to right.
pub(crate) fn find_instructions(base: &[u8], target: &[u8]) -> Vec<Instruction> {
    let mut out = Vec::new();
    if base.len() < BLOCK_SIZE || target.len() < BLOCK_SIZE {
        if !target.is_empty() {
            out.push(Instruction::Add { len: target.len() });
        }
        return out;
    }

    let index = BlockIndex::new(base, BLOCK_SIZE);
    // Start of the target region not yet covered by an instruction.
    let mut pending = 0usize;
    let mut pos = 0usize;
    let mut sum = RollingChecksum::new(&target[..BLOCK_SIZE]);

    loop {
        let window = &target[pos..pos + BLOCK_SIZE];
        if let Some(src) = index.find(sum.value(), base, window) {
            // Extend backward into the uncovered region.
            let mut back = 0usize;
            while back < pos - pending && back < src && base[src - back - 1] == target[pos - back - 1]
            {
                back += 1;
            }
            // Extend forward past the verified block.
            let mut t_end = pos + BLOCK_SIZE;
            let mut s_end = src + BLOCK_SIZE;
            while t_end < target.len() && s_end < base.len() && base[s_end] == target[t_end] {
                t_end += 1;
                s_end += 1;
            }

            let t_start = pos - back;
            if t_start > pending {
                out.push(Instruction::Add {
                    len: t_start - pending,
                });
            }
            out.push(Instruction::Copy {
                offset: src - back,
                len: t_end - t_start,
            });

            pos = t_end;
            pending = t_end;
            if pos + BLOCK_SIZE > target.len() {
                break;
            }
            sum = RollingChecksum::new(&target[pos..pos + BLOCK_SIZE]);
            continue;
        }

        if pos + BLOCK_SIZE >= target.len() {
            break;
        }
        sum.roll(target[pos], target[pos + BLOCK_SIZE]);
        pos += 1;
    }

    if pending < target.len() {
        out.push(Instruction::Add {
            len: target.len() - pending,
        });
    }
    out
}

/// Merge adjacent ADDs and contiguous COPYs, dropping empty instructions.
pub(crate) fn optimize(instructions: &[Instruction]) -> Vec<Instruction> {
    let mut result: Vec<Instruction> = Vec::with_capacity(instructions.len());
    for inst in instructions.iter().filter(|i| !i.is_empty()) {
        match (result.last_mut(), *inst) {
            (Some(Instruction::Add { len: l1 }), Instruction::Add { len: l2 }) => *l1 += l2,
            (
                Some(Instruction::Copy {
                    offset: o1,
                    len: l1,
                }),
                Instruction::Copy {
                    offset: o2,
                    len: l2,
                },
            ) if o2 == *o1 + *l1 => *l1 += l2,
            _ => result.push(*inst),
        }
    }
    result
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
