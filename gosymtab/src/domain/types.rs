//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep virtual addresses apart from file offsets and
//! plain counters in function signatures.

use serde::Serialize;
use std::fmt;

/// Virtual address inside the analyzed binary (a program counter or an
/// entry point).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Address(pub u64);

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

impl From<u64> for Address {
    fn from(addr: u64) -> Self {
        Address(addr)
    }
}

impl Address {
    /// Parse an address given on the command line.
    ///
    /// Accepts `0x`-prefixed hexadecimal or plain decimal.
    ///
    /// # Errors
    /// Returns an error message if the text is not a valid number
    pub fn parse(text: &str) -> Result<Self, String> {
        let text = text.trim();
        let parsed = if let Some(hex) =
            text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
        {
            u64::from_str_radix(&hex.replace('_', ""), 16)
        } else {
            text.replace('_', "").parse::<u64>()
        };
        parsed.map(Address).map_err(|e| format!("invalid address '{text}': {e}"))
    }
}

/// Location of a section's bytes inside the container file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    /// File offset of the first byte.
    pub offset: u64,
    /// Number of bytes.
    pub size: u64,
    /// Virtual address the bytes are loaded at (0 for unloaded sections).
    pub address: u64,
}

impl ByteRange {
    /// One past the last file offset covered by this range.
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.size)
    }

    /// Check if a virtual address falls within the loaded image of this range
    #[must_use]
    pub fn contains_address(&self, addr: u64) -> bool {
        addr >= self.address && addr - self.address < self.size
    }
}
