//! Explicit diagnostics sink
//!
//! Every pipeline stage receives a `&mut Diagnostics` and records what it
//! skipped or could not find. The caller gets the records back as data
//! (for the text or JSON report) instead of having to scrape log output.
//! Each record is also forwarded to the `log` facade so `RUST_LOG=debug`
//! shows the same events in order.

use crate::domain::{ManifestError, PclntabError};
use log::{info, warn};
use serde::Serialize;

/// Pipeline stage a diagnostic originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Container,
    Pclntab,
    SymbolTable,
    Manifest,
}

/// Kind of condition recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    SectionNotFound,
    UnsupportedFormat,
    TruncatedSection,
    MalformedNameOffset,
    MalformedEntry,
    ManifestNotFound,
    ManifestCorrupt,
}

impl From<&PclntabError> for DiagnosticKind {
    fn from(err: &PclntabError) -> Self {
        match err {
            PclntabError::UnsupportedFormat(_) => DiagnosticKind::UnsupportedFormat,
            PclntabError::TruncatedSection { .. } => DiagnosticKind::TruncatedSection,
            PclntabError::MalformedNameOffset { .. } => DiagnosticKind::MalformedNameOffset,
        }
    }
}

impl From<&ManifestError> for DiagnosticKind {
    fn from(err: &ManifestError) -> Self {
        match err {
            ManifestError::NotFound => DiagnosticKind::ManifestNotFound,
            ManifestError::Corrupt(_) => DiagnosticKind::ManifestCorrupt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Expected absence of optional data (no pclntab, no manifest).
    Info,
    /// Data was present but (partly) undecodable.
    Warning,
}

/// A single structured diagnostic record.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub stage: Stage,
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub message: String,
}

/// Accumulates diagnostics for one analysis run.
#[derive(Debug, Default, Serialize)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
    skipped_entries: usize,
}

impl Diagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an informational condition.
    pub fn info(&mut self, stage: Stage, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        info!("{stage:?}: {message}");
        self.records.push(Diagnostic { stage, kind, severity: Severity::Info, message });
    }

    /// Record a decoding problem.
    pub fn warn(&mut self, stage: Stage, kind: DiagnosticKind, message: impl Into<String>) {
        let message = message.into();
        warn!("{stage:?}: {message}");
        self.records.push(Diagnostic { stage, kind, severity: Severity::Warning, message });
    }

    /// Record a function-table entry that was skipped during symbol table
    /// construction.
    pub fn skipped_entry(&mut self, kind: DiagnosticKind, message: impl Into<String>) {
        self.skipped_entries += 1;
        self.warn(Stage::SymbolTable, kind, message);
    }

    #[must_use]
    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    /// Number of function-table entries skipped as malformed.
    #[must_use]
    pub fn skipped_entries(&self) -> usize {
        self.skipped_entries
    }

    /// Number of records of the given kind.
    #[must_use]
    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }

    #[must_use]
    pub fn has_warnings(&self) -> bool {
        self.records.iter().any(|r| r.severity == Severity::Warning)
    }
}
