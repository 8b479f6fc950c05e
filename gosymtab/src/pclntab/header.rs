//! Versioned pclntab header decoding
//!
//! Each Go release that changed the line table layout wrote a new magic
//! number. The layouts share a role, not a structure, so each one gets its
//! own decode function and [`PclntabHeader::decode`] dispatches on the magic.
//!
//! ```text
//! offset  0: magic (u32, target byte order)
//! offset  4: 0x00 0x00
//! offset  6: quantum (instruction size granularity: 1, 2 or 4)
//! offset  7: pointer size (4 or 8)
//! offset  8: layout-specific words ...
//! ```
//!
//! | magic        | layout  | words at offset 8 (pointer sized)                               |
//! |--------------|---------|------------------------------------------------------------------|
//! | `0xfffffffb` | Go 1.2  | nfunc, then the function table inline; file table offset after it |
//! | `0xfffffffa` | Go 1.16 | nfunc, nfiles, funcname, cu, filetab, pctab, funcdata             |
//! | `0xfffffff0` | Go 1.18 | nfunc, nfiles, text start, funcname, cu, filetab, pctab, funcdata |
//! | `0xfffffff1` | Go 1.20 | same as Go 1.18                                                   |

use super::reader::TableReader;
use crate::domain::PclntabError;
use log::debug;
use object::Endianness;
use serde::Serialize;
use std::fmt;

/// Smallest buffer that can hold any supported header prelude.
const MIN_HEADER_LEN: usize = 16;

/// Known line table format revisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum PclntabVersion {
    Go12,
    Go116,
    Go118,
    Go120,
}

impl PclntabVersion {
    /// Match a magic number against the known revisions.
    #[must_use]
    pub fn from_magic(magic: u32) -> Option<Self> {
        match magic {
            0xffff_fffb => Some(Self::Go12),
            0xffff_fffa => Some(Self::Go116),
            0xffff_fff0 => Some(Self::Go118),
            0xffff_fff1 => Some(Self::Go120),
            _ => None,
        }
    }

    #[must_use]
    pub fn magic(self) -> u32 {
        match self {
            Self::Go12 => 0xffff_fffb,
            Self::Go116 => 0xffff_fffa,
            Self::Go118 => 0xffff_fff0,
            Self::Go120 => 0xffff_fff1,
        }
    }

    /// Function table entries hold text-relative `u32` offsets from Go 1.18
    /// on, full pointers before.
    #[must_use]
    pub fn has_relative_entries(self) -> bool {
        self >= Self::Go118
    }
}

impl fmt::Display for PclntabVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Go12 => "go1.2",
            Self::Go116 => "go1.16",
            Self::Go118 => "go1.18",
            Self::Go120 => "go1.20",
        };
        write!(f, "{label}")
    }
}

/// Decoded line table header.
///
/// Every offset is relative to the start of the section and has been checked
/// against its length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PclntabHeader {
    pub version: PclntabVersion,
    pub endian: Endianness,
    pub quantum: u8,
    pub ptr_size: u8,
    /// Number of functions in the function table.
    pub nfunc: usize,
    /// Number of file table entries (for Go 1.16+, also the length of the
    /// compile unit table).
    pub nfiles: usize,
    /// Base of text-relative entry offsets (Go 1.18+, zero before).
    pub text_start: u64,
    pub funcname_offset: usize,
    /// Compile unit table (Go 1.16+, zero before).
    pub cu_offset: usize,
    pub filetab_offset: usize,
    pub pctab_offset: usize,
    pub funcdata_offset: usize,
    pub functab_offset: usize,
    /// Byte length of the function table including its terminating entry.
    pub functab_size: usize,
}

impl PclntabHeader {
    /// Decode the header at the start of `data`.
    ///
    /// # Errors
    /// Returns [`PclntabError::UnsupportedFormat`] for an unknown magic or an
    /// implausible prelude, and [`PclntabError::TruncatedSection`] if any
    /// table offset lies outside `data`
    pub fn decode(data: &[u8]) -> Result<Self, PclntabError> {
        if data.len() < MIN_HEADER_LEN {
            return Err(PclntabError::UnsupportedFormat(format!(
                "section too small for a header ({} bytes)",
                data.len()
            )));
        }

        let le = TableReader::new(data, Endianness::Little).u32(0)?;
        let be = TableReader::new(data, Endianness::Big).u32(0)?;
        let (version, endian) = if let Some(v) = PclntabVersion::from_magic(le) {
            (v, Endianness::Little)
        } else if let Some(v) = PclntabVersion::from_magic(be) {
            (v, Endianness::Big)
        } else {
            return Err(PclntabError::UnsupportedFormat(format!("unknown magic 0x{le:08x}")));
        };

        let reader = TableReader::new(data, endian);
        let prelude = Prelude::read(&reader)?;
        debug!(
            "pclntab {version} ({endian:?}), quantum={}, ptrsize={}",
            prelude.quantum, prelude.ptr_size
        );

        let header = match version {
            PclntabVersion::Go12 => decode_go12(&reader, prelude)?,
            PclntabVersion::Go116 => decode_go116(&reader, prelude)?,
            PclntabVersion::Go118 | PclntabVersion::Go120 => {
                decode_go118(&reader, version, prelude)?
            }
        };
        header.validate(&reader)?;
        Ok(header)
    }

    /// Size of one field of a function table entry.
    #[must_use]
    pub fn functab_field_size(&self) -> usize {
        if self.version.has_relative_entries() {
            4
        } else {
            usize::from(self.ptr_size)
        }
    }

    /// Distance between consecutive function table entries.
    #[must_use]
    pub fn functab_stride(&self) -> usize {
        2 * self.functab_field_size()
    }

    /// Size of the entry field that opens each `_func` record.
    #[must_use]
    pub fn func_entry_field_size(&self) -> usize {
        self.functab_field_size()
    }

    fn validate(&self, reader: &TableReader<'_>) -> Result<(), PclntabError> {
        for offset in [
            self.funcname_offset,
            self.cu_offset,
            self.filetab_offset,
            self.pctab_offset,
            self.funcdata_offset,
        ] {
            reader.tail(offset)?;
        }
        reader.bytes(self.functab_offset, self.functab_size)?;
        if self.version >= PclntabVersion::Go116 {
            let cutab_len = self.nfiles.checked_mul(4).ok_or(PclntabError::TruncatedSection {
                offset: self.cu_offset,
                len: usize::MAX,
                size: reader.len(),
            })?;
            reader.bytes(self.cu_offset, cutab_len)?;
        }
        Ok(())
    }
}

/// The fixed first eight bytes shared by every layout.
#[derive(Debug, Clone, Copy)]
struct Prelude {
    quantum: u8,
    ptr_size: u8,
}

impl Prelude {
    fn read(reader: &TableReader<'_>) -> Result<Self, PclntabError> {
        let (pad0, pad1) = (reader.u8(4)?, reader.u8(5)?);
        let quantum = reader.u8(6)?;
        let ptr_size = reader.u8(7)?;
        if pad0 != 0 || pad1 != 0 {
            return Err(PclntabError::UnsupportedFormat("non-zero header padding".to_string()));
        }
        if !matches!(quantum, 1 | 2 | 4) {
            return Err(PclntabError::UnsupportedFormat(format!("invalid quantum {quantum}")));
        }
        if !matches!(ptr_size, 4 | 8) {
            return Err(PclntabError::UnsupportedFormat(format!("invalid pointer size {ptr_size}")));
        }
        Ok(Self { quantum, ptr_size })
    }
}

/// Length of a function table of `nfunc` entries plus the terminator.
fn functab_size(nfunc: usize, field: usize, offset: usize, size: usize) -> Result<usize, PclntabError> {
    nfunc
        .checked_mul(2)
        .and_then(|n| n.checked_add(1))
        .and_then(|n| n.checked_mul(field))
        .ok_or(PclntabError::TruncatedSection { offset, len: usize::MAX, size })
}

fn decode_go12(reader: &TableReader<'_>, prelude: Prelude) -> Result<PclntabHeader, PclntabError> {
    let ptr = usize::from(prelude.ptr_size);
    let nfunc = reader.word_offset(8, prelude.ptr_size)?;
    let functab_offset = 8 + ptr;
    let functab_size = functab_size(nfunc, ptr, functab_offset, reader.len())?;

    let filetab_offset = functab_offset
        .checked_add(functab_size)
        .ok_or(PclntabError::TruncatedSection { offset: functab_offset, len: functab_size, size: reader.len() })?;
    let filetab_offset = reader.u32(filetab_offset)? as usize;
    let nfiles = reader.u32(filetab_offset)? as usize;
    let filetab_len = nfiles.checked_mul(4).ok_or(PclntabError::TruncatedSection {
        offset: filetab_offset,
        len: usize::MAX,
        size: reader.len(),
    })?;
    reader.bytes(filetab_offset, filetab_len)?;

    Ok(PclntabHeader {
        version: PclntabVersion::Go12,
        endian: reader.endian(),
        quantum: prelude.quantum,
        ptr_size: prelude.ptr_size,
        nfunc,
        nfiles,
        text_start: 0,
        funcname_offset: 0,
        cu_offset: 0,
        filetab_offset,
        pctab_offset: 0,
        funcdata_offset: 0,
        functab_offset,
        functab_size,
    })
}

fn decode_go116(reader: &TableReader<'_>, prelude: Prelude) -> Result<PclntabHeader, PclntabError> {
    let ptr = usize::from(prelude.ptr_size);
    let word = |i: usize| reader.word_offset(8 + i * ptr, prelude.ptr_size);

    let nfunc = word(0)?;
    let funcdata_offset = word(6)?;
    Ok(PclntabHeader {
        version: PclntabVersion::Go116,
        endian: reader.endian(),
        quantum: prelude.quantum,
        ptr_size: prelude.ptr_size,
        nfunc,
        nfiles: word(1)?,
        text_start: 0,
        funcname_offset: word(2)?,
        cu_offset: word(3)?,
        filetab_offset: word(4)?,
        pctab_offset: word(5)?,
        funcdata_offset,
        functab_offset: funcdata_offset,
        functab_size: functab_size(nfunc, ptr, funcdata_offset, reader.len())?,
    })
}

fn decode_go118(
    reader: &TableReader<'_>,
    version: PclntabVersion,
    prelude: Prelude,
) -> Result<PclntabHeader, PclntabError> {
    let ptr = usize::from(prelude.ptr_size);
    let word = |i: usize| reader.word_offset(8 + i * ptr, prelude.ptr_size);

    let nfunc = word(0)?;
    let funcdata_offset = word(7)?;
    Ok(PclntabHeader {
        version,
        endian: reader.endian(),
        quantum: prelude.quantum,
        ptr_size: prelude.ptr_size,
        nfunc,
        nfiles: word(1)?,
        text_start: reader.word(8 + 2 * ptr, prelude.ptr_size)?,
        funcname_offset: word(3)?,
        cu_offset: word(4)?,
        filetab_offset: word(5)?,
        pctab_offset: word(6)?,
        funcdata_offset,
        functab_offset: funcdata_offset,
        functab_size: functab_size(nfunc, 4, funcdata_offset, reader.len())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn go118_header(magic: u32, words: [u64; 8]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&magic.to_le_bytes());
        data.extend_from_slice(&[0, 0, 1, 8]);
        for w in words {
            data.extend_from_slice(&w.to_le_bytes());
        }
        data
    }

    #[test]
    fn test_unknown_magic_is_unsupported() {
        let mut data = go118_header(0xffff_fff5, [0; 8]);
        data.resize(128, 0);

        let err = PclntabHeader::decode(&data).unwrap_err();
        assert!(matches!(err, PclntabError::UnsupportedFormat(ref m) if m.contains("fffffff5")));
    }

    #[test]
    fn test_short_buffer_is_unsupported() {
        let err = PclntabHeader::decode(&[0xf1, 0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, PclntabError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_bad_pointer_size_is_unsupported() {
        let mut data = go118_header(0xffff_fff1, [0; 8]);
        data[7] = 3;

        let err = PclntabHeader::decode(&data).unwrap_err();
        assert!(matches!(err, PclntabError::UnsupportedFormat(ref m) if m.contains("pointer size")));
    }

    #[test]
    fn test_decode_go120_empty_table() {
        // 8-byte prelude + 8 words = 72 bytes; all tables start at the end.
        // The function table holds only its terminator (4 bytes).
        let mut data = go118_header(0xffff_fff1, [0, 0, 0x40_1000, 72, 72, 72, 72, 72]);
        data.extend_from_slice(&[0u8; 4]);

        let header = PclntabHeader::decode(&data).unwrap();
        assert_eq!(header.version, PclntabVersion::Go120);
        assert_eq!(header.endian, Endianness::Little);
        assert_eq!(header.text_start, 0x40_1000);
        assert_eq!(header.nfunc, 0);
        assert_eq!(header.functab_size, 4);
        assert_eq!(header.functab_stride(), 8);
    }

    #[test]
    fn test_offsets_past_end_are_truncation() {
        let data = go118_header(0xffff_fff0, [0, 0, 0, 72, 72, 72, 72, 9999]);

        let err = PclntabHeader::decode(&data).unwrap_err();
        assert!(matches!(err, PclntabError::TruncatedSection { .. }));
    }

    #[test]
    fn test_huge_function_count_is_truncation_not_panic() {
        let data = go118_header(0xffff_fff0, [u64::MAX / 2, 0, 0, 72, 72, 72, 72, 72]);

        let err = PclntabHeader::decode(&data).unwrap_err();
        assert!(matches!(err, PclntabError::TruncatedSection { .. }));
    }

    #[test]
    fn test_big_endian_magic_is_detected() {
        let mut data = Vec::new();
        data.extend_from_slice(&0xffff_fffa_u32.to_be_bytes());
        data.extend_from_slice(&[0, 0, 4, 4]);
        // Go 1.16 words: nfunc, nfiles, funcname, cu, filetab, pctab, funcdata
        for w in [0u32, 0, 36, 36, 36, 36, 36] {
            data.extend_from_slice(&w.to_be_bytes());
        }
        data.extend_from_slice(&[0u8; 4]);

        let header = PclntabHeader::decode(&data).unwrap();
        assert_eq!(header.version, PclntabVersion::Go116);
        assert_eq!(header.endian, Endianness::Big);
        assert_eq!(header.quantum, 4);
        assert_eq!(header.functab_field_size(), 4);
    }

    #[test]
    fn test_decode_go12_reads_file_table_after_functions() {
        let mut data = Vec::new();
        data.extend_from_slice(&0xffff_fffb_u32.to_le_bytes());
        data.extend_from_slice(&[0, 0, 1, 8]);
        data.extend_from_slice(&1u64.to_le_bytes()); // nfunc
        data.extend_from_slice(&0x1000u64.to_le_bytes()); // entry
        data.extend_from_slice(&0u64.to_le_bytes()); // funcoff
        data.extend_from_slice(&0x1100u64.to_le_bytes()); // end
        data.extend_from_slice(&44u32.to_le_bytes()); // filetab offset
        data.extend_from_slice(&1u32.to_le_bytes()); // nfiles

        let header = PclntabHeader::decode(&data).unwrap();
        assert_eq!(header.version, PclntabVersion::Go12);
        assert_eq!(header.nfunc, 1);
        assert_eq!(header.functab_offset, 16);
        assert_eq!(header.functab_size, 24);
        assert_eq!(header.filetab_offset, 44);
        assert_eq!(header.nfiles, 1);
        assert_eq!(header.functab_stride(), 16);
    }

    #[test]
    fn test_version_order_and_magic_round_trip() {
        for v in [
            PclntabVersion::Go12,
            PclntabVersion::Go116,
            PclntabVersion::Go118,
            PclntabVersion::Go120,
        ] {
            assert_eq!(PclntabVersion::from_magic(v.magic()), Some(v));
        }
        assert!(!PclntabVersion::Go116.has_relative_entries());
        assert!(PclntabVersion::Go120.has_relative_entries());
        assert_eq!(PclntabVersion::Go118.to_string(), "go1.18");
    }
}
