//! # gosymtab - Go Binary Symbol Extraction
//!
//! gosymtab turns a compiled Go binary into symbol and provenance
//! information without running it. It decodes the runtime's own line table
//! (`pclntab`) to map program counters to functions, files and lines, and
//! reads the build manifest the Go toolchain embeds (module path, version,
//! dependencies). Offline profilers and crash tooling use it to turn raw
//! addresses into readable locations and to audit what went into a build.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  Executable (ELF / Mach-O / PE)                 │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ Container::open (object crate)
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                 Container (bytes + section directory)           │
//! └──────────┬───────────────────────────────────────┬──────────────┘
//!            │ .gopclntab                            │ .go.buildinfo
//!            ▼                                       ▼
//! ┌──────────────────────┐               ┌──────────────────────┐
//! │   Pclntab Decoder    │               │  Build-Manifest      │
//! │  (header, pcvalue)   │               │  Reader (modinfo)    │
//! └──────────┬───────────┘               └──────────┬───────────┘
//!            ▼                                      │
//! ┌──────────────────────┐                          │
//! │ Symbol Table Builder │                          │
//! └──────────┬───────────┘                          │
//!            ▼                                      ▼
//! ┌──────────────────────┐   ┌──────────────────────────────────┐
//! │  Address Resolver    │──▶│  Report (text / JSON export)     │
//! └──────────────────────┘   └──────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`container`]: Opens the binary and locates sections and symbols
//! - [`pclntab`]: Decodes the versioned line table and replays pc-value programs
//!   - `header`: Magic-number dispatch over the Go 1.2, 1.16, 1.18 and 1.20 layouts
//!   - `pcvalue`: Line and file lookups within one function
//!   - `funcname`: Package / receiver / base name decomposition
//! - [`symtab`]: Address-ordered symbol table, package groups, resolver
//! - [`buildinfo`]: Build manifest decoding with module replacements
//! - [`analysis`]: Runs both pipelines over one container
//! - [`export`]: Text and JSON reports
//! - [`diagnostics`]: Structured record of everything skipped or missing
//! - [`cli`]: Command-line argument parsing
//! - [`domain`]: Core domain types and errors
//!
//! ## Typical Usage
//!
//! ```bash
//! # Summarize a binary
//! gosymtab ./server
//!
//! # Resolve addresses from a crash report
//! gosymtab ./server --resolve 0x4a2f10 --resolve 0x4a3000
//!
//! # Machine-readable output, with decoding traced to stderr
//! RUST_LOG=debug gosymtab ./server --json
//! ```
//!
//! ## Key Concepts
//!
//! - **pclntab**: Table the Go runtime uses for stack traces; present even in stripped binaries
//! - **Quantum**: Instruction size granularity that scales pc deltas (1 on x86, 4 on arm64)
//! - **Compile unit table**: Per-package file index indirection (Go 1.16+)
//! - **Build manifest**: `\xff Go buildinf:` header plus tab-separated module lines

// Expose modules for testing
pub mod analysis;
pub mod buildinfo;
pub mod cli;
pub mod container;
pub mod diagnostics;
pub mod domain;
pub mod export;
pub mod pclntab;
pub mod symtab;
