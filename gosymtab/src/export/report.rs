//! Report assembly and rendering

use crate::analysis::Analysis;
use crate::buildinfo::{BuildManifest, BuildSetting, ModuleRecord};
use crate::diagnostics::{Diagnostic, Severity};
use crate::domain::Address;
use crate::symtab::{Resolution, SymbolTable};
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;

/// Counts and listings from the symbol table
#[derive(Debug, Serialize)]
pub struct TableSummary<'a> {
    pub version: String,
    pub syms: usize,
    pub funcs: usize,
    pub objects: usize,
    pub skipped_entries: usize,
    /// Source files in first-reference order
    pub files: Vec<&'a str>,
    /// Package paths, sorted
    pub packages: Vec<&'a str>,
}

impl<'a> TableSummary<'a> {
    #[must_use]
    pub fn new(table: &'a SymbolTable) -> Self {
        Self {
            version: table.version().to_string(),
            syms: table.syms().len(),
            funcs: table.funcs().len(),
            objects: table.objects().len(),
            skipped_entries: table.skipped_entries(),
            files: table.files().map(String::as_str).collect(),
            packages: table.packages(),
        }
    }
}

/// One module as it was built
#[derive(Debug, Serialize)]
pub struct ModuleLine<'a> {
    /// Path the module was required under
    pub module: &'a str,
    pub version: &'a str,
    pub sum: &'a str,
    /// Replacement path when it differs from `module`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replaced_by: Option<&'a str>,
}

/// Build manifest contents
#[derive(Debug, Serialize)]
pub struct ManifestSummary<'a> {
    pub go_version: &'a str,
    pub path: &'a str,
    /// Main module first, then dependencies sorted by path
    pub modules: Vec<ModuleLine<'a>>,
    pub settings: &'a [BuildSetting],
}

impl<'a> ManifestSummary<'a> {
    #[must_use]
    pub fn new(manifest: &'a BuildManifest) -> Self {
        let line = |module: &'a str, effective: &'a ModuleRecord| ModuleLine {
            module,
            version: &effective.version,
            sum: &effective.sum,
            replaced_by: (effective.path != module).then_some(effective.path.as_str()),
        };

        let mut modules = Vec::with_capacity(manifest.deps.len() + 1);
        if let (Some(main), Some(effective)) = (&manifest.main, manifest.main_effective()) {
            if !main.path.is_empty() {
                modules.push(line(&main.path, effective));
            }
        }
        modules.extend(
            manifest
                .dependencies()
                .filter(|(path, _)| !path.is_empty())
                .map(|(path, effective)| line(path, effective)),
        );

        Self {
            go_version: &manifest.go_version,
            path: &manifest.path,
            modules,
            settings: &manifest.settings,
        }
    }
}

/// Outcome of one `--resolve` query
#[derive(Debug, Serialize)]
pub struct ResolvedAddress {
    pub address: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Resolution>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Full report for one binary
#[derive(Debug, Serialize)]
pub struct Report<'a> {
    pub file: String,
    pub format: String,
    pub symbols: Option<TableSummary<'a>>,
    pub manifest: Option<ManifestSummary<'a>>,
    pub resolved: Vec<ResolvedAddress>,
    pub diagnostics: &'a [Diagnostic],
}

impl<'a> Report<'a> {
    /// Build the report, resolving `addresses` against the symbol table.
    #[must_use]
    pub fn new(analysis: &'a Analysis, addresses: &[Address]) -> Self {
        let resolver = analysis.resolver();
        let resolved = addresses
            .iter()
            .map(|&address| match &resolver {
                Some(resolver) => match resolver.resolve(address.0) {
                    Ok(res) => ResolvedAddress { address, resolution: Some(res), error: None },
                    Err(e) => ResolvedAddress { address, resolution: None, error: Some(e.to_string()) },
                },
                None => ResolvedAddress {
                    address,
                    resolution: None,
                    error: Some("binary has no line table".to_string()),
                },
            })
            .collect();

        Self {
            file: analysis.path.display().to_string(),
            format: format!("{:?}", analysis.format),
            symbols: analysis.symbols.as_ref().map(TableSummary::new),
            manifest: analysis.manifest.as_ref().map(ManifestSummary::new),
            resolved,
            diagnostics: analysis.diagnostics.records(),
        }
    }

    /// Export the report as JSON to any writer (file, stdout, buffer, etc.)
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails
    pub fn write_json<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer_pretty(writer, self).context("Failed to write report JSON")?;
        Ok(())
    }

    /// Render the report as text.
    ///
    /// With `quiet`, file and package listings and informational
    /// diagnostics are left out.
    ///
    /// # Errors
    /// Returns an error if writing fails
    pub fn write_text<W: Write>(&self, mut w: W, quiet: bool) -> Result<()> {
        writeln!(w, "{} ({})", self.file, self.format)?;

        match &self.symbols {
            Some(table) => {
                writeln!(
                    w,
                    "\nLine table {}: {} syms, {} funcs, {} objects, {} files, {} skipped",
                    table.version,
                    table.syms,
                    table.funcs,
                    table.objects,
                    table.files.len(),
                    table.skipped_entries
                )?;
                if !quiet {
                    writeln!(w, "\nFiles:")?;
                    for file in &table.files {
                        writeln!(w, "  {file}")?;
                    }
                    writeln!(w, "\nPackages:")?;
                    for package in &table.packages {
                        writeln!(w, "  package={package}")?;
                    }
                }
            }
            None => writeln!(w, "\nLine table: none (0 syms, 0 funcs, 0 objects, 0 files)")?,
        }

        match &self.manifest {
            Some(manifest) => {
                writeln!(w, "\nModules ({}, {}):", manifest.go_version, manifest.path)?;
                for m in &manifest.modules {
                    write!(w, "  module={}, version={}, hash={}", m.module, m.version, m.sum)?;
                    if let Some(replacement) = m.replaced_by {
                        write!(w, " => {replacement}")?;
                    }
                    writeln!(w)?;
                }
            }
            None => writeln!(w, "\nModules: none")?,
        }

        if !self.resolved.is_empty() {
            writeln!(w, "\nResolved:")?;
            for (i, r) in self.resolved.iter().enumerate() {
                match (&r.resolution, &r.error) {
                    (Some(res), _) => writeln!(w, "{}", res.format(i))?,
                    (None, error) => writeln!(
                        w,
                        "#{i:<2} 0x{:016x} <{}>",
                        r.address.0,
                        error.as_deref().unwrap_or("unresolved")
                    )?,
                }
            }
        }

        let shown: Vec<_> = self
            .diagnostics
            .iter()
            .filter(|d| !quiet || d.severity == Severity::Warning)
            .collect();
        if !shown.is_empty() {
            writeln!(w, "\nDiagnostics:")?;
            for d in shown {
                let level = match d.severity {
                    Severity::Info => "info",
                    Severity::Warning => "warning",
                };
                writeln!(w, "  {level:<7} {:?}: {}", d.stage, d.message)?;
            }
        }

        Ok(())
    }
}
