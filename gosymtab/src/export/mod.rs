//! Report export functionality
//!
//! This module renders an [`Analysis`](crate::analysis::Analysis) for humans
//! (plain text) or for other tools (JSON via `serde_json`).

pub mod report;

pub use report::{ModuleLine, Report, ResolvedAddress, TableSummary};
