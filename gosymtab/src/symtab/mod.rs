//! # Address-Indexed Symbol Table
//!
//! The decoded line table, reorganized for queries:
//!
//! ```text
//!   funcs   [FuncRecord sorted by entry] ◄── partition_point(pc) ── resolve()
//!     │
//!     ├── objects  package path ─► ObjectGroup { func indices, file indices }
//!     └── files    IndexSet<String>  (first reference wins the slot)
//! ```
//!
//! A [`SymbolTable`] owns a copy of the line table bytes so per-function
//! programs can be replayed lazily during resolution. It is immutable once
//! built and can be shared between threads freely.

pub mod builder;
pub mod resolver;

use crate::container::RawSymbol;
use crate::domain::{Address, ResolveError, WalkError};
use crate::pclntab::{FuncName, Pclntab, PclntabHeader, PclntabVersion};
use indexmap::{IndexSet, set::Iter as IndexSetIter};
use serde::Serialize;
use std::collections::BTreeMap;

pub use builder::{build, load};
pub use resolver::{AddressResolver, Resolution};

/// One function from the line table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FuncRecord {
    pub entry: Address,
    /// Entry of the following function.
    pub end: Address,
    pub name: String,
    #[serde(flatten)]
    pub parts: FuncName,
    #[serde(skip)]
    pub pcln: u32,
    #[serde(skip)]
    pub pcfile: u32,
    #[serde(skip)]
    pub cu_offset: u32,
    #[serde(skip)]
    pub func_offset: usize,
}

impl FuncRecord {
    #[must_use]
    pub fn contains(&self, pc: u64) -> bool {
        self.entry.0 <= pc && pc < self.end.0
    }
}

/// Functions and files belonging to one package.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ObjectGroup {
    /// Indices into [`SymbolTable::funcs`].
    pub funcs: Vec<usize>,
    /// Indices into [`SymbolTable::files`], in first-reference order.
    pub files: IndexSet<usize>,
}

/// Symbol table built from one binary's line table.
#[derive(Debug, Clone)]
pub struct SymbolTable {
    data: Vec<u8>,
    header: PclntabHeader,
    funcs: Vec<FuncRecord>,
    files: IndexSet<String>,
    objects: BTreeMap<String, ObjectGroup>,
    syms: Vec<RawSymbol>,
    skipped: usize,
}

impl SymbolTable {
    #[must_use]
    pub fn version(&self) -> PclntabVersion {
        self.header.version
    }

    #[must_use]
    pub fn header(&self) -> &PclntabHeader {
        &self.header
    }

    /// Functions sorted by entry address.
    #[must_use]
    pub fn funcs(&self) -> &[FuncRecord] {
        &self.funcs
    }

    /// Source files referenced by any function, deduplicated.
    pub fn files(&self) -> IndexSetIter<'_, String> {
        self.files.iter()
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn file(&self, index: usize) -> Option<&str> {
        self.files.get_index(index).map(String::as_str)
    }

    #[must_use]
    pub fn objects(&self) -> &BTreeMap<String, ObjectGroup> {
        &self.objects
    }

    #[must_use]
    pub fn object(&self, package: &str) -> Option<&ObjectGroup> {
        self.objects.get(package)
    }

    /// Package paths in sorted order, without the unnamed group.
    #[must_use]
    pub fn packages(&self) -> Vec<&str> {
        self.objects.keys().map(String::as_str).filter(|p| !p.is_empty()).collect()
    }

    /// Raw entries of the container's symbol table.
    #[must_use]
    pub fn syms(&self) -> &[RawSymbol] {
        &self.syms
    }

    /// Function table entries dropped as malformed during construction.
    #[must_use]
    pub fn skipped_entries(&self) -> usize {
        self.skipped
    }

    /// Function whose range contains `pc`.
    #[must_use]
    pub fn func_at(&self, pc: u64) -> Option<&FuncRecord> {
        let idx = self.funcs.partition_point(|f| f.entry.0 <= pc);
        let func = self.funcs.get(idx.checked_sub(1)?)?;
        func.contains(pc).then_some(func)
    }

    /// Resolve `pc` to function, file and line.
    ///
    /// Line and file are left empty when the function carries no program or
    /// its program is truncated.
    ///
    /// # Errors
    /// Returns [`ResolveError::NotFound`] if no function contains `pc`, or if
    /// the function's line program ends before reaching `pc`
    pub fn resolve(&self, pc: u64) -> Result<Resolution, ResolveError> {
        let not_found = ResolveError::NotFound(Address(pc));
        let func = self.func_at(pc).ok_or(not_found.clone())?;
        let table = self.pclntab();
        let program = |offset: u32| table.pc_program(offset, func.entry.0).ok().flatten();

        let line = match program(func.pcln).map(|p| p.value_at(pc)) {
            None | Some(Err(WalkError::Truncated(_))) => None,
            Some(Err(WalkError::AddressNotInFunction { .. })) => return Err(not_found),
            Some(Ok(v)) => u32::try_from(v).ok(),
        };
        let file = program(func.pcfile)
            .and_then(|p| p.value_at(pc).ok())
            .and_then(|v| table.file_name(func.cu_offset, v).ok().flatten())
            .map(std::borrow::Cow::into_owned);

        Ok(Resolution {
            address: Address(pc),
            function: func.name.clone(),
            entry: func.entry,
            file,
            line,
        })
    }

    fn pclntab(&self) -> Pclntab<'_> {
        Pclntab::with_header(&self.data, self.header.clone())
    }
}
