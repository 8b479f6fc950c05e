//! # Executable Container Access
//!
//! A [`Container`] owns the raw bytes of one executable (ELF, Mach-O or PE)
//! together with a directory of its sections and symbols. It is opened once
//! per analysis run and never mutated afterwards; every decoder receives
//! shared slices of its bytes.
//!
//! ## Locating Go data
//!
//! ```text
//! .gopclntab / __gopclntab        ─┐
//! runtime.pclntab..epclntab (PE)  ─┴─► line table bytes  ──► pclntab decoder
//!
//! .go.buildinfo / __go_buildinfo ─┐
//! writable data sections (scan)  ─┴─► manifest blob     ──► buildinfo reader
//! ```
//!
//! Section lookups are pure directory queries and never read section
//! contents. A missing section is reported as
//! [`ContainerError::SectionNotFound`], which callers treat as "feature not
//! present" rather than as a failure.

pub mod sections;

use crate::domain::{ByteRange, ContainerError};
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};

pub use sections::{RawSymbol, SectionClass, SectionDirectory, SectionInfo, SymbolClass};

/// Read access to memory at virtual addresses of the analyzed image.
///
/// Older build manifests store pointers rather than inline strings; this is
/// the seam through which they are followed.
pub trait AddressSpace {
    /// Read `len` bytes at virtual address `addr`, if they are backed by file
    /// contents.
    fn read_at(&self, addr: u64, len: usize) -> Option<&[u8]>;
}

/// An opened executable container.
pub struct Container {
    path: PathBuf,
    data: Vec<u8>,
    format: object::BinaryFormat,
    little_endian: bool,
    is_64: bool,
    directory: SectionDirectory,
}

impl Container {
    /// Read and parse the executable at `path`.
    ///
    /// # Errors
    /// Returns [`ContainerError::Open`] if the file cannot be read and
    /// [`ContainerError::Parse`] if it is not a recognized object file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ContainerError> {
        let path = path.as_ref();
        let data = fs::read(path)
            .map_err(|source| ContainerError::Open { path: path.to_path_buf(), source })?;
        Self::from_bytes(path, data)
    }

    /// Parse an in-memory executable image.
    ///
    /// # Errors
    /// Returns [`ContainerError::Parse`] if the bytes are not a recognized
    /// object file
    pub fn from_bytes(path: impl Into<PathBuf>, data: Vec<u8>) -> Result<Self, ContainerError> {
        use object::Object;

        let path = path.into();
        let (format, little_endian, is_64, directory) = {
            let obj = object::File::parse(&*data).map_err(|e| ContainerError::Parse {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            let directory = SectionDirectory::from_object(&obj, data.len() as u64);
            (obj.format(), obj.is_little_endian(), obj.is_64(), directory)
        };

        info!(
            "Opened {} ({:?}, {} sections, {} symbols, {} KB)",
            path.display(),
            format,
            directory.sections().count(),
            directory.symbols().len(),
            data.len() / 1024
        );

        Ok(Self { path, data, format, little_endian, is_64, directory })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All bytes of the file.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    #[must_use]
    pub fn format(&self) -> object::BinaryFormat {
        self.format
    }

    #[must_use]
    pub fn is_little_endian(&self) -> bool {
        self.little_endian
    }

    #[must_use]
    pub fn is_64(&self) -> bool {
        self.is_64
    }

    /// Locate a section by name.
    ///
    /// # Errors
    /// Returns [`ContainerError::SectionNotFound`] if there is no such section
    /// or it has no file contents
    pub fn find_section(&self, name: &str) -> Result<ByteRange, ContainerError> {
        self.directory
            .section(name)
            .and_then(|s| s.range)
            .ok_or_else(|| ContainerError::SectionNotFound(name.to_string()))
    }

    /// Locate the first of several alternative section names.
    ///
    /// # Errors
    /// Returns [`ContainerError::SectionNotFound`] naming all alternatives if
    /// none is present
    pub fn find_any_section<'n>(
        &self,
        names: &[&'n str],
    ) -> Result<(&'n str, ByteRange), ContainerError> {
        for &name in names {
            if let Ok(range) = self.find_section(name) {
                debug!("Found section {name} at file offset 0x{:x}", range.offset);
                return Ok((name, range));
            }
        }
        Err(ContainerError::SectionNotFound(names.join(" | ")))
    }

    /// Locate the bytes delimited by two symbols.
    ///
    /// # Errors
    /// Returns [`ContainerError::SectionNotFound`] if either symbol is missing
    /// or the pair does not describe a range inside one section
    pub fn find_symbol_range(&self, start: &str, end: &str) -> Result<ByteRange, ContainerError> {
        self.directory
            .symbol_range(start, end)
            .ok_or_else(|| ContainerError::SectionNotFound(format!("{start}..{end}")))
    }

    /// Bytes covered by `range`.
    ///
    /// Ranges handed out by this container are always in bounds; a foreign
    /// range that is not yields an empty slice.
    #[must_use]
    pub fn section_data(&self, range: &ByteRange) -> &[u8] {
        let (Ok(start), Ok(end)) = (usize::try_from(range.offset), usize::try_from(range.end()))
        else {
            return &[];
        };
        self.data.get(start..end).unwrap_or(&[])
    }

    pub fn sections(&self) -> impl Iterator<Item = &SectionInfo> + '_ {
        self.directory.sections()
    }

    /// Raw entries of the container's symbol table.
    #[must_use]
    pub fn symbols(&self) -> &[RawSymbol] {
        self.directory.symbols()
    }

    /// Load address of the text section, if any.
    #[must_use]
    pub fn text_address(&self) -> Option<u64> {
        [".text", "__text"]
            .iter()
            .find_map(|name| self.directory.section(name))
            .map(|s| s.address)
            .filter(|&addr| addr != 0)
    }
}

impl AddressSpace for Container {
    fn read_at(&self, addr: u64, len: usize) -> Option<&[u8]> {
        self.read_at_address(addr, len)
    }
}

impl Container {
    /// Bytes loaded at virtual address `addr`, mapped through the section
    /// directory.
    ///
    /// Returns `None` unless all `len` bytes lie inside one section's file
    /// contents.
    #[must_use]
    pub fn read_at_address(&self, addr: u64, len: usize) -> Option<&[u8]> {
        let section = self.directory.section_containing(addr)?;
        let range = section.range?;
        let rel = addr - range.address;
        if rel.checked_add(len as u64)? > range.size {
            return None;
        }
        let start = usize::try_from(range.offset + rel).ok()?;
        self.data.get(start..start.checked_add(len)?)
    }
}
