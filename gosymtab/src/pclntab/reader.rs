//! Bounds-checked reads over the line table section
//!
//! Every multi-byte read goes through [`TableReader`], which turns any access
//! past the end of the section into [`PclntabError::TruncatedSection`]. Offsets
//! in the table come straight from an untrusted file, so nothing here indexes
//! without checking.

use crate::domain::PclntabError;
use object::{Endian, Endianness};

/// Endian-aware view over the raw section bytes.
#[derive(Debug, Clone, Copy)]
pub struct TableReader<'data> {
    data: &'data [u8],
    endian: Endianness,
}

impl<'data> TableReader<'data> {
    #[must_use]
    pub fn new(data: &'data [u8], endian: Endianness) -> Self {
        Self { data, endian }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn endian(&self) -> Endianness {
        self.endian
    }

    /// `len` bytes starting at `offset`.
    ///
    /// # Errors
    /// Returns [`PclntabError::TruncatedSection`] if the range leaves the section
    pub fn bytes(&self, offset: usize, len: usize) -> Result<&'data [u8], PclntabError> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or(PclntabError::TruncatedSection { offset, len, size: self.data.len() })
    }

    /// Everything from `offset` to the end of the section.
    ///
    /// # Errors
    /// Returns [`PclntabError::TruncatedSection`] if `offset` is past the end
    pub fn tail(&self, offset: usize) -> Result<&'data [u8], PclntabError> {
        self.data.get(offset..).ok_or(PclntabError::TruncatedSection {
            offset,
            len: 0,
            size: self.data.len(),
        })
    }

    /// # Errors
    /// Returns [`PclntabError::TruncatedSection`] on out-of-range reads
    pub fn u8(&self, offset: usize) -> Result<u8, PclntabError> {
        Ok(self.bytes(offset, 1)?[0])
    }

    /// # Errors
    /// Returns [`PclntabError::TruncatedSection`] on out-of-range reads
    pub fn u32(&self, offset: usize) -> Result<u32, PclntabError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.bytes(offset, 4)?);
        Ok(self.endian.read_u32_bytes(raw))
    }

    /// # Errors
    /// Returns [`PclntabError::TruncatedSection`] on out-of-range reads
    pub fn u64(&self, offset: usize) -> Result<u64, PclntabError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.bytes(offset, 8)?);
        Ok(self.endian.read_u64_bytes(raw))
    }

    /// Read a target-pointer-sized word (`ptr_size` is 4 or 8).
    ///
    /// # Errors
    /// Returns [`PclntabError::TruncatedSection`] on out-of-range reads
    pub fn word(&self, offset: usize, ptr_size: u8) -> Result<u64, PclntabError> {
        if ptr_size == 8 {
            self.u64(offset)
        } else {
            self.u32(offset).map(u64::from)
        }
    }

    /// A word used as an offset or count into this section.
    ///
    /// # Errors
    /// Returns [`PclntabError::TruncatedSection`] if the read fails or the
    /// value does not fit the host's address space
    pub fn word_offset(&self, offset: usize, ptr_size: u8) -> Result<usize, PclntabError> {
        let value = self.word(offset, ptr_size)?;
        usize::try_from(value).map_err(|_| PclntabError::TruncatedSection {
            offset,
            len: usize::MAX,
            size: self.data.len(),
        })
    }

    /// NUL-terminated string starting at `offset`, without the terminator.
    ///
    /// # Errors
    /// Returns [`PclntabError::TruncatedSection`] if `offset` is out of range
    /// or no terminator follows
    pub fn cstr(&self, offset: usize) -> Result<&'data [u8], PclntabError> {
        let tail = self.tail(offset)?;
        let len = tail.iter().position(|&b| b == 0).ok_or(PclntabError::TruncatedSection {
            offset,
            len: tail.len() + 1,
            size: self.data.len(),
        })?;
        Ok(&tail[..len])
    }
}

/// Decode an unsigned LEB128 varint of at most 32 bits at `*pos`, advancing
/// `pos` past it.
///
/// Returns `None` if the input ends mid-varint or the value overflows.
pub fn read_uvarint(data: &[u8], pos: &mut usize) -> Option<u32> {
    let mut value: u32 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *data.get(*pos)?;
        *pos += 1;
        if shift == 28 && byte > 0x0f {
            return None;
        }
        value |= u32::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Some(value);
        }
        shift += 7;
    }
}
