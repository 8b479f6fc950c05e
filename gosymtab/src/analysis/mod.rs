//! Analysis of one binary
//!
//! Opens the container once and runs the two independent pipelines over it:
//!
//! ```text
//!                 ┌──► pclntab::locate ─► symtab::build ──► SymbolTable
//! Container::open ┤
//!                 └──► buildinfo::read ─────────────────► BuildManifest
//! ```
//!
//! Only failing to open or parse the container is an error. Everything the
//! pipelines could not find or decode ends up in [`Analysis::diagnostics`].

use crate::buildinfo::{self, BuildManifest};
use crate::container::Container;
use crate::diagnostics::Diagnostics;
use crate::domain::ContainerError;
use crate::symtab::{self, AddressResolver, SymbolTable};
use std::path::{Path, PathBuf};

/// Results of analyzing one binary.
#[derive(Debug)]
pub struct Analysis {
    pub path: PathBuf,
    pub format: object::BinaryFormat,
    pub symbols: Option<SymbolTable>,
    pub manifest: Option<BuildManifest>,
    pub diagnostics: Diagnostics,
}

impl Analysis {
    /// Resolver over the symbol table, if the binary has one.
    #[must_use]
    pub fn resolver(&self) -> Option<AddressResolver<'_>> {
        self.symbols.as_ref().map(AddressResolver::new)
    }
}

/// Open the binary at `path` and analyze it.
///
/// # Errors
/// Returns [`ContainerError`] if the file cannot be read or is not a
/// recognized executable container
pub fn analyze<P: AsRef<Path>>(path: P) -> Result<Analysis, ContainerError> {
    let container = Container::open(path)?;
    Ok(analyze_container(&container))
}

/// Run both pipelines over an already opened container.
#[must_use]
pub fn analyze_container(container: &Container) -> Analysis {
    let mut diagnostics = Diagnostics::new();
    let symbols = symtab::load(container, &mut diagnostics);
    let manifest = buildinfo::load(container, &mut diagnostics);

    Analysis {
        path: container.path().to_path_buf(),
        format: container.format(),
        symbols,
        manifest,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{DiagnosticKind, Severity};
    use object::write::Object as WriteObject;
    use object::{Architecture, BinaryFormat, Endianness, SectionKind};

    #[test]
    fn test_binary_without_go_data_reports_absence() {
        let mut obj = WriteObject::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
        let id = obj.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
        obj.section_mut(id).set_data(vec![0xc3; 16], 16);
        let container = Container::from_bytes("plain", obj.write().unwrap()).unwrap();

        let analysis = analyze_container(&container);

        assert!(analysis.symbols.is_none());
        assert!(analysis.manifest.is_none());
        assert!(analysis.resolver().is_none());
        assert_eq!(analysis.diagnostics.count(DiagnosticKind::SectionNotFound), 1);
        assert_eq!(analysis.diagnostics.count(DiagnosticKind::ManifestNotFound), 1);
        assert!(analysis.diagnostics.records().iter().all(|r| r.severity == Severity::Info));
    }

    #[test]
    fn test_unsupported_table_is_a_warning() {
        let mut obj = WriteObject::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
        let id = obj.add_section(Vec::new(), b".gopclntab".to_vec(), SectionKind::ReadOnlyData);
        obj.section_mut(id).set_data(vec![0xab; 64], 8);
        let container = Container::from_bytes("odd", obj.write().unwrap()).unwrap();

        let analysis = analyze_container(&container);

        assert!(analysis.symbols.is_none());
        assert_eq!(analysis.diagnostics.count(DiagnosticKind::UnsupportedFormat), 1);
        assert!(analysis.diagnostics.has_warnings());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(matches!(analyze("/nonexistent/go-binary"), Err(ContainerError::Open { .. })));
    }
}
