//! Section and symbol directory extracted from an object file
//!
//! The directory is computed once at open time so lookups never touch the
//! `object` parser again and the container can own its bytes outright.

use crate::domain::ByteRange;
use object::{Object, ObjectSection, ObjectSymbol, SectionKind, SymbolKind};
use serde::Serialize;
use std::collections::BTreeMap;

/// Coarse classification of a section's contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionClass {
    Text,
    /// Writable initialized data.
    Data,
    ReadOnlyData,
    Other,
}

impl From<SectionKind> for SectionClass {
    fn from(kind: SectionKind) -> Self {
        match kind {
            SectionKind::Text => SectionClass::Text,
            SectionKind::Data => SectionClass::Data,
            SectionKind::ReadOnlyData
            | SectionKind::ReadOnlyDataWithRel
            | SectionKind::ReadOnlyString => SectionClass::ReadOnlyData,
            _ => SectionClass::Other,
        }
    }
}

/// One section of the container.
#[derive(Debug, Clone)]
pub struct SectionInfo {
    pub name: String,
    pub class: SectionClass,
    pub address: u64,
    /// `None` for sections that occupy no file space (e.g. `.bss`).
    pub range: Option<ByteRange>,
}

/// Kind of a raw symbol table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolClass {
    Text,
    Data,
    Other,
}

/// A raw entry from the container's own symbol table.
///
/// These are kept next to the pclntab functions for completeness; stripped
/// binaries simply have none.
#[derive(Debug, Clone, Serialize)]
pub struct RawSymbol {
    pub name: String,
    pub address: u64,
    pub size: u64,
    pub class: SymbolClass,
}

/// Precomputed directory of sections and symbols.
#[derive(Debug, Clone, Default)]
pub struct SectionDirectory {
    sections: Vec<SectionInfo>,
    by_name: BTreeMap<String, usize>,
    symbols: Vec<RawSymbol>,
}

impl SectionDirectory {
    /// Build the directory from a parsed object file.
    ///
    /// Sections whose file range lies outside `file_len` are kept without a
    /// range so later slicing can never go out of bounds.
    pub fn from_object(obj: &object::File<'_>, file_len: u64) -> Self {
        let mut dir = Self::default();

        for section in obj.sections() {
            let Ok(name) = section.name() else {
                continue;
            };
            let range = section
                .file_range()
                .filter(|&(offset, size)| offset.checked_add(size).is_some_and(|end| end <= file_len))
                .map(|(offset, size)| ByteRange { offset, size, address: section.address() });

            dir.push_section(SectionInfo {
                name: name.to_string(),
                class: section.kind().into(),
                address: section.address(),
                range,
            });
        }

        for symbol in obj.symbols() {
            let Ok(name) = symbol.name() else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let class = match symbol.kind() {
                SymbolKind::Text => SymbolClass::Text,
                SymbolKind::Data | SymbolKind::Tls => SymbolClass::Data,
                _ => SymbolClass::Other,
            };
            dir.symbols.push(RawSymbol {
                name: name.to_string(),
                address: symbol.address(),
                size: symbol.size(),
                class,
            });
        }

        dir
    }

    /// Add a section; the first section with a given name wins lookups.
    pub fn push_section(&mut self, info: SectionInfo) {
        let index = self.sections.len();
        self.by_name.entry(info.name.clone()).or_insert(index);
        self.sections.push(info);
    }

    pub fn push_symbol(&mut self, symbol: RawSymbol) {
        self.symbols.push(symbol);
    }

    #[must_use]
    pub fn section(&self, name: &str) -> Option<&SectionInfo> {
        self.by_name.get(name).map(|&i| &self.sections[i])
    }

    pub fn sections(&self) -> impl Iterator<Item = &SectionInfo> + '_ {
        self.sections.iter()
    }

    #[must_use]
    pub fn symbols(&self) -> &[RawSymbol] {
        &self.symbols
    }

    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<&RawSymbol> {
        self.symbols.iter().find(|s| s.name == name)
    }

    /// File bytes between two symbols, e.g. `runtime.pclntab` and
    /// `runtime.epclntab` in containers that carry no dedicated section.
    #[must_use]
    pub fn symbol_range(&self, start: &str, end: &str) -> Option<ByteRange> {
        let start = self.symbol(start)?.address;
        let end = self.symbol(end)?.address;
        if end <= start {
            return None;
        }
        let section = self.section_containing(start)?;
        let base = section.range?;
        let size = end - start;
        if start - base.address + size > base.size {
            return None;
        }
        Some(ByteRange { offset: base.offset + (start - base.address), size, address: start })
    }

    /// Section whose loaded image contains `addr`.
    #[must_use]
    pub fn section_containing(&self, addr: u64) -> Option<&SectionInfo> {
        self.sections
            .iter()
            .find(|s| s.range.is_some_and(|r| r.address != 0 && r.contains_address(addr)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(name: &str, address: u64, offset: u64, size: u64) -> SectionInfo {
        SectionInfo {
            name: name.to_string(),
            class: SectionClass::Data,
            address,
            range: Some(ByteRange { offset, size, address }),
        }
    }

    #[test]
    fn test_first_section_with_name_wins() {
        let mut dir = SectionDirectory::default();
        dir.push_section(section(".data", 0x1000, 0x100, 0x10));
        dir.push_section(section(".data", 0x2000, 0x200, 0x10));

        assert_eq!(dir.section(".data").map(|s| s.address), Some(0x1000));
        assert_eq!(dir.sections().count(), 2);
    }

    #[test]
    fn test_section_containing_ignores_unloaded_sections() {
        let mut dir = SectionDirectory::default();
        dir.push_section(section(".comment", 0, 0x80, 0x40));
        dir.push_section(section(".rodata", 0x40_0000, 0x1000, 0x100));

        assert_eq!(dir.section_containing(0x40_0010).map(|s| s.name.as_str()), Some(".rodata"));
        assert!(dir.section_containing(0x10).is_none());
        assert!(dir.section_containing(0x40_0100).is_none());
    }

    #[test]
    fn test_symbol_range_maps_addresses_to_file_offsets() {
        let mut dir = SectionDirectory::default();
        dir.push_section(section(".rdata", 0x50_0000, 0x4000, 0x1000));
        for (name, address) in [("runtime.pclntab", 0x50_0100), ("runtime.epclntab", 0x50_0180)] {
            dir.push_symbol(RawSymbol {
                name: name.to_string(),
                address,
                size: 0,
                class: SymbolClass::Data,
            });
        }

        let range = dir.symbol_range("runtime.pclntab", "runtime.epclntab").unwrap();
        assert_eq!(range, ByteRange { offset: 0x4100, size: 0x80, address: 0x50_0100 });
        assert!(dir.symbol_range("runtime.epclntab", "runtime.pclntab").is_none());
        assert!(dir.symbol_range("runtime.pclntab", "missing").is_none());
    }

    #[test]
    fn test_section_class_from_kind() {
        assert_eq!(SectionClass::from(SectionKind::Text), SectionClass::Text);
        assert_eq!(SectionClass::from(SectionKind::Data), SectionClass::Data);
        assert_eq!(SectionClass::from(SectionKind::ReadOnlyData), SectionClass::ReadOnlyData);
        assert_eq!(SectionClass::from(SectionKind::UninitializedData), SectionClass::Other);
    }
}
