// String formatting intentionally uses format! for clarity
#![allow(clippy::format_push_string)]

use super::SymbolTable;
use crate::domain::{Address, ResolveError};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Resolver for turning program counters into source locations
///
/// Includes a cache to avoid re-resolving the same addresses repeatedly,
/// which matters when symbolizing many samples from one profile. The cache
/// sits behind a mutex so a resolver can be shared across threads.
pub struct AddressResolver<'t> {
    table: &'t SymbolTable,
    /// Cache of resolutions by address
    cache: Mutex<HashMap<u64, Result<Resolution, ResolveError>>>,
}

impl<'t> AddressResolver<'t> {
    #[must_use]
    pub fn new(table: &'t SymbolTable) -> Self {
        Self { table, cache: Mutex::new(HashMap::new()) }
    }

    #[must_use]
    pub fn table(&self) -> &'t SymbolTable {
        self.table
    }

    /// Resolve a program counter to function, file and line
    ///
    /// Uses a cache to avoid replaying line programs for repeated addresses.
    ///
    /// # Errors
    /// Returns [`ResolveError::NotFound`] if no function contains `pc`
    pub fn resolve(&self, pc: u64) -> Result<Resolution, ResolveError> {
        // A poisoned cache only loses memoization
        if let Ok(cache) = self.cache.lock() {
            if let Some(cached) = cache.get(&pc) {
                return cached.clone();
            }
        }

        let resolved = self.table.resolve(pc);

        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(pc, resolved.clone());
        }
        resolved
    }

    /// Number of distinct addresses resolved so far.
    #[must_use]
    pub fn cached(&self) -> usize {
        self.cache.lock().map_or(0, |c| c.len())
    }
}

/// A program counter resolved against the symbol table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub address: Address,
    pub function: String,
    /// Entry address of `function`.
    pub entry: Address,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl Resolution {
    /// Byte offset of the address from the function entry.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.address.0 - self.entry.0
    }

    /// Format the frame for display
    #[must_use]
    pub fn format(&self, frame_num: usize) -> String {
        let mut output = format!(
            "#{frame_num:<2} 0x{:016x} {}+0x{:x}",
            self.address.0,
            self.function,
            self.offset()
        );

        if let Some(ref file) = self.file {
            output.push_str(&format!("\n                      at {file}"));
            if let Some(line) = self.line {
                output.push_str(&format!(":{line}"));
            }
        }

        output
    }
}
