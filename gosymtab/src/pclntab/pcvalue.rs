//! pc-value program replay
//!
//! A function's line numbers and file indices are stored as compact programs
//! of `(value delta, pc delta)` pairs. The value starts at -1 and the pc at
//! the function entry; after each pair the new value covers
//! `[previous pc, new pc)`. A zero value delta ends the program, except as the
//! very first pair.

use super::reader::read_uvarint;
use crate::domain::{Address, WalkError};

/// One step of a replayed program: `value` applies to `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcRange {
    pub start: u64,
    pub end: u64,
    pub value: i32,
}

/// A pc-value program anchored at a function entry.
#[derive(Debug, Clone, Copy)]
pub struct PcValueProgram<'data> {
    data: &'data [u8],
    entry: u64,
    quantum: u8,
}

impl<'data> PcValueProgram<'data> {
    /// `data` starts at the first byte of the program and may extend past its
    /// end.
    #[must_use]
    pub fn new(data: &'data [u8], entry: u64, quantum: u8) -> Self {
        Self { data, entry, quantum }
    }

    #[must_use]
    pub fn entry(&self) -> u64 {
        self.entry
    }

    /// Iterate over the ranges the program describes, in pc order.
    #[must_use]
    pub fn ranges(&self) -> PcRanges<'data> {
        PcRanges {
            data: self.data,
            pos: 0,
            pc: self.entry,
            value: -1,
            quantum: u64::from(self.quantum),
            first: true,
            done: false,
        }
    }

    /// Value in effect at `pc`.
    ///
    /// # Errors
    /// Returns [`WalkError::AddressNotInFunction`] if `pc` lies before the
    /// entry or past the last range, and [`WalkError::Truncated`] if the
    /// program ends mid-varint
    pub fn value_at(&self, pc: u64) -> Result<i32, WalkError> {
        let not_covered = || WalkError::AddressNotInFunction {
            pc: Address(pc),
            entry: Address(self.entry),
        };
        if pc < self.entry {
            return Err(not_covered());
        }
        for range in self.ranges() {
            let range = range?;
            if pc < range.end {
                return Ok(range.value);
            }
        }
        Err(not_covered())
    }
}

/// Iterator returned by [`PcValueProgram::ranges`].
#[derive(Debug, Clone)]
pub struct PcRanges<'data> {
    data: &'data [u8],
    pos: usize,
    pc: u64,
    value: i32,
    quantum: u64,
    first: bool,
    done: bool,
}

impl PcRanges<'_> {
    fn step(&mut self) -> Result<Option<PcRange>, WalkError> {
        let uvdelta = read_uvarint(self.data, &mut self.pos).ok_or(WalkError::Truncated(self.pos))?;
        if uvdelta == 0 && !self.first {
            return Ok(None);
        }
        self.first = false;

        let vdelta = zigzag(uvdelta);
        let pcdelta = read_uvarint(self.data, &mut self.pos).ok_or(WalkError::Truncated(self.pos))?;
        let start = self.pc;
        self.pc = self
            .pc
            .checked_add(u64::from(pcdelta) * self.quantum)
            .ok_or(WalkError::Truncated(self.pos))?;
        self.value = self.value.wrapping_add(vdelta);
        Ok(Some(PcRange { start, end: self.pc, value: self.value }))
    }
}

impl Iterator for PcRanges<'_> {
    type Item = Result<PcRange, WalkError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(range)) => Some(Ok(range)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[allow(clippy::cast_possible_wrap)]
fn zigzag(uv: u32) -> i32 {
    if uv & 1 == 0 {
        (uv >> 1) as i32
    } else {
        !((uv >> 1) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Encode `(value delta, pc delta in quanta)` pairs plus the terminator.
    fn encode(steps: &[(i32, u32)]) -> Vec<u8> {
        fn uvarint(out: &mut Vec<u8>, mut v: u32) {
            while v >= 0x80 {
                out.push((v as u8 & 0x7f) | 0x80);
                v >>= 7;
            }
            out.push(v as u8);
        }
        let mut out = Vec::new();
        for &(vdelta, pcdelta) in steps {
            uvarint(&mut out, ((vdelta << 1) ^ (vdelta >> 31)) as u32);
            uvarint(&mut out, pcdelta);
        }
        out.push(0);
        out
    }

    #[test]
    fn test_line_lookup_inside_function() {
        // Lines base, base+1, base+2, base+4 over [0x1000,0x1004), [0x1004,0x1008),
        // [0x1008,0x1010), [0x1010,0x1014). The first delta is taken from -1.
        let base = 120;
        let data = encode(&[(base + 1, 4), (1, 4), (1, 8), (2, 4)]);
        let program = PcValueProgram::new(&data, 0x1000, 1);

        assert_eq!(program.value_at(0x1000), Ok(base));
        assert_eq!(program.value_at(0x1004), Ok(base + 1));
        assert_eq!(program.value_at(0x1008), Ok(base + 2));
        assert_eq!(program.value_at(0x100f), Ok(base + 2));
        assert_eq!(program.value_at(0x1010), Ok(base + 4));
    }

    #[test]
    fn test_address_outside_function() {
        let data = encode(&[(11, 4), (1, 4)]);
        let program = PcValueProgram::new(&data, 0x1000, 1);

        assert_eq!(
            program.value_at(0xfff),
            Err(WalkError::AddressNotInFunction { pc: Address(0xfff), entry: Address(0x1000) })
        );
        assert!(matches!(program.value_at(0x1008), Err(WalkError::AddressNotInFunction { .. })));
    }

    #[test]
    fn test_quantum_scales_pc_deltas() {
        let data = encode(&[(1, 2), (5, 3)]);
        let program = PcValueProgram::new(&data, 0x2000, 4);

        let ranges: Vec<_> = program.ranges().collect::<Result<_, _>>().unwrap();
        assert_eq!(
            ranges,
            vec![
                PcRange { start: 0x2000, end: 0x2008, value: 0 },
                PcRange { start: 0x2008, end: 0x2014, value: 5 },
            ]
        );
    }

    #[test]
    fn test_zero_first_delta_does_not_terminate() {
        // Value stays -1 for the first range (e.g. no file recorded yet).
        let data = encode(&[(0, 4), (3, 4)]);
        let program = PcValueProgram::new(&data, 0, 1);

        assert_eq!(program.value_at(0), Ok(-1));
        assert_eq!(program.value_at(4), Ok(2));
    }

    #[test]
    fn test_negative_deltas() {
        let data = encode(&[(41, 2), (-10, 2)]);
        let program = PcValueProgram::new(&data, 0x10, 1);

        assert_eq!(program.value_at(0x12), Ok(30));
    }

    #[test]
    fn test_truncated_program_is_an_error() {
        let data = [0x82];
        let program = PcValueProgram::new(&data, 0x1000, 1);

        assert!(matches!(program.value_at(0x1000), Err(WalkError::Truncated(_))));
        assert_eq!(program.ranges().count(), 1);
    }

    #[test]
    fn test_zigzag() {
        assert_eq!(zigzag(0), 0);
        assert_eq!(zigzag(1), -1);
        assert_eq!(zigzag(2), 1);
        assert_eq!(zigzag(3), -2);
        assert_eq!(zigzag(u32::MAX), i32::MIN);
    }
}
