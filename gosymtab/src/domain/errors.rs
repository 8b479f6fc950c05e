//! Structured error types for gosymtab
//!
//! Using thiserror for automatic Display implementation and error chaining.
//! Only [`ContainerError::Open`] and [`ContainerError::Parse`] are fatal to a
//! run; everything else is recorded as a diagnostic and the affected feature
//! is skipped.

use super::types::Address;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContainerError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path} as an executable container: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Section {0} not found")]
    SectionNotFound(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PclntabError {
    #[error("Unsupported pclntab format: {0}")]
    UnsupportedFormat(String),

    #[error("Truncated pclntab: {len} bytes at offset 0x{offset:x} exceed section size 0x{size:x}")]
    TruncatedSection { offset: usize, len: usize, size: usize },

    #[error("Function #{index} has name offset 0x{offset:x} outside the name table")]
    MalformedNameOffset { index: usize, offset: usize },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalkError {
    #[error("Address {pc} is not covered by the function starting at {entry}")]
    AddressNotInFunction { pc: Address, entry: Address },

    #[error("pc-value program truncated at offset 0x{0:x}")]
    Truncated(usize),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No function covers address {0}")]
    NotFound(Address),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("No build manifest found")]
    NotFound,

    #[error("Build manifest is corrupt: {0}")]
    Corrupt(String),
}
