//! # Go Line Table Decoding
//!
//! The Go runtime embeds a table mapping program counters to functions,
//! source files and lines (`runtime.pclntab`). This module decodes it in
//! place without copying:
//!
//! ```text
//! ┌────────┬──────────┬─────────┬─────────┬───────┬──────────┬─────────────┐
//! │ header │ funcname │ cu tab  │ filetab │ pctab │ functab  │ _func data  │
//! └────────┴──────────┴─────────┴─────────┴───────┴──────────┴─────────────┘
//!     │         ▲          │         ▲        ▲      │  ▲         │
//!     │         │          └─────────┘        │      │  └─────────┘
//!     └─ offsets of every table ──────────────┴──────┘   nameoff, pcln, pcfile, cuoff
//! ```
//!
//! [`header`] identifies the layout, [`Pclntab`] resolves individual
//! function entries, and [`pcvalue`] replays the per-function line and file
//! programs.

pub mod funcname;
pub mod header;
pub mod pcvalue;
pub mod reader;

use crate::container::Container;
use crate::domain::{ByteRange, ContainerError, PclntabError};
use log::debug;
use std::borrow::Cow;

pub use funcname::FuncName;
pub use header::{PclntabHeader, PclntabVersion};
pub use pcvalue::{PcRange, PcValueProgram};
use reader::TableReader;

/// Section names that hold the line table, in lookup order.
pub const SECTION_NAMES: &[&str] = &[".gopclntab", ".data.rel.ro.gopclntab", "__gopclntab"];

/// Symbols bracketing the line table when no dedicated section exists.
pub const START_SYMBOL: &str = "runtime.pclntab";
pub const END_SYMBOL: &str = "runtime.epclntab";

/// Field indices inside a `_func` record (after the entry field).
const FUNC_NAME_OFF: usize = 1;
const FUNC_PCFILE: usize = 5;
const FUNC_PCLN: usize = 6;
const FUNC_CU_OFFSET: usize = 8;

/// Find the line table bytes in `container`.
///
/// # Errors
/// Returns [`ContainerError::SectionNotFound`] if neither a named section nor
/// the bracketing symbol pair is present
pub fn locate(container: &Container) -> Result<ByteRange, ContainerError> {
    match container.find_any_section(SECTION_NAMES) {
        Ok((_, range)) => Ok(range),
        Err(section_err) => {
            debug!("No line table section, trying {START_SYMBOL}..{END_SYMBOL}");
            container.find_symbol_range(START_SYMBOL, END_SYMBOL).map_err(|_| section_err)
        }
    }
}

/// One function table slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuncTableEntry {
    pub index: usize,
    pub entry: u64,
    /// Entry of the next function (or the table's end address).
    pub end: u64,
    /// Offset of the `_func` record relative to the function data table.
    pub func_offset: usize,
}

/// The `_func` fields needed to symbolize a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuncData {
    pub name_offset: u32,
    pub pcfile: u32,
    pub pcln: u32,
    /// Compile unit index (Go 1.16+, zero before).
    pub cu_offset: u32,
}

/// Decoded view over a line table section.
#[derive(Debug, Clone)]
pub struct Pclntab<'data> {
    header: PclntabHeader,
    reader: TableReader<'data>,
}

impl<'data> Pclntab<'data> {
    /// Decode the header of `data` and wrap it.
    ///
    /// # Errors
    /// See [`PclntabHeader::decode`]
    pub fn parse(data: &'data [u8]) -> Result<Self, PclntabError> {
        let header = PclntabHeader::decode(data)?;
        Ok(Self::with_header(data, header))
    }

    /// Wrap `data` with an already decoded header.
    #[must_use]
    pub fn with_header(data: &'data [u8], header: PclntabHeader) -> Self {
        let reader = TableReader::new(data, header.endian);
        Self { header, reader }
    }

    #[must_use]
    pub fn header(&self) -> &PclntabHeader {
        &self.header
    }

    #[must_use]
    pub fn func_count(&self) -> usize {
        self.header.nfunc
    }

    /// Read function table slot `index`.
    ///
    /// # Errors
    /// Returns [`PclntabError::TruncatedSection`] if the slot cannot be read
    pub fn func_entry(&self, index: usize) -> Result<FuncTableEntry, PclntabError> {
        let stride = self.header.functab_stride();
        let offset = self.header.functab_offset + index * stride;
        let entry = self.entry_at(offset)?;
        let end = self.entry_at(offset + stride)?;
        let func_offset = self.field_offset(offset + self.header.functab_field_size())?;
        Ok(FuncTableEntry { index, entry, end, func_offset })
    }

    fn entry_at(&self, offset: usize) -> Result<u64, PclntabError> {
        if self.header.version.has_relative_entries() {
            let rel = self.reader.u32(offset)?;
            Ok(self.header.text_start.wrapping_add(u64::from(rel)))
        } else {
            self.reader.word(offset, self.header.ptr_size)
        }
    }

    fn field_offset(&self, offset: usize) -> Result<usize, PclntabError> {
        if self.header.version.has_relative_entries() {
            Ok(self.reader.u32(offset)? as usize)
        } else {
            self.reader.word_offset(offset, self.header.ptr_size)
        }
    }

    /// Read the `_func` record of a function table slot.
    ///
    /// # Errors
    /// Returns [`PclntabError::TruncatedSection`] if the record lies outside
    /// the section
    pub fn func_data(&self, slot: &FuncTableEntry) -> Result<FuncData, PclntabError> {
        let base = self
            .header
            .funcdata_offset
            .checked_add(slot.func_offset)
            .ok_or(PclntabError::TruncatedSection {
                offset: slot.func_offset,
                len: 0,
                size: self.reader.len(),
            })?;
        let field = |n: usize| {
            let offset = base
                .checked_add(self.header.func_entry_field_size() + (n - 1) * 4)
                .ok_or(PclntabError::TruncatedSection { offset: base, len: 4, size: self.reader.len() })?;
            self.reader.u32(offset)
        };

        let cu_offset = if self.header.version >= PclntabVersion::Go116 {
            field(FUNC_CU_OFFSET)?
        } else {
            0
        };
        Ok(FuncData {
            name_offset: field(FUNC_NAME_OFF)?,
            pcfile: field(FUNC_PCFILE)?,
            pcln: field(FUNC_PCLN)?,
            cu_offset,
        })
    }

    /// NUL-terminated name of function `index`.
    ///
    /// # Errors
    /// Returns [`PclntabError::MalformedNameOffset`] if `name_offset` does not
    /// point at a terminated string inside the section
    pub fn func_name(&self, index: usize, name_offset: u32) -> Result<Cow<'data, str>, PclntabError> {
        let malformed = || PclntabError::MalformedNameOffset { index, offset: name_offset as usize };
        let offset = self
            .header
            .funcname_offset
            .checked_add(name_offset as usize)
            .ok_or_else(malformed)?;
        let bytes = self.reader.cstr(offset).map_err(|_| malformed())?;
        Ok(String::from_utf8_lossy(bytes))
    }

    /// The pc-value program at `offset` in the pc table, anchored at `entry`.
    ///
    /// Offset zero means the function carries no such program.
    ///
    /// # Errors
    /// Returns [`PclntabError::TruncatedSection`] if the offset is out of
    /// range
    pub fn pc_program(&self, offset: u32, entry: u64) -> Result<Option<PcValueProgram<'data>>, PclntabError> {
        if offset == 0 {
            return Ok(None);
        }
        let start = self.header.pctab_offset.checked_add(offset as usize).ok_or(
            PclntabError::TruncatedSection { offset: offset as usize, len: 0, size: self.reader.len() },
        )?;
        let data = self.reader.tail(start)?;
        Ok(Some(PcValueProgram::new(data, entry, self.header.quantum)))
    }

    /// Source file for a pc-file value.
    ///
    /// Returns `Ok(None)` for negative values and for file slots the table
    /// marks as unused.
    ///
    /// # Errors
    /// Returns [`PclntabError::TruncatedSection`] if a referenced table entry
    /// or string lies outside the section
    pub fn file_name(&self, cu_offset: u32, file_value: i32) -> Result<Option<Cow<'data, str>>, PclntabError> {
        let Ok(fno) = usize::try_from(file_value) else {
            return Ok(None);
        };

        let string_offset = if self.header.version == PclntabVersion::Go12 {
            // Slot 0 holds the table length, so valid indices start at 1.
            if fno == 0 || fno >= self.header.nfiles {
                return Ok(None);
            }
            self.reader.u32(self.header.filetab_offset + fno * 4)? as usize
        } else {
            let slot = (cu_offset as usize).saturating_add(fno);
            let name_off = self.reader.u32(self.header.cu_offset.saturating_add(slot.saturating_mul(4)))?;
            if name_off == u32::MAX {
                return Ok(None);
            }
            self.header.filetab_offset.saturating_add(name_off as usize)
        };

        let bytes = self.reader.cstr(string_offset)?;
        Ok(Some(String::from_utf8_lossy(bytes)))
    }
}
