//! Symbol table construction
//!
//! Walks every function table slot, decodes its `_func` record and name, and
//! groups the results by package. A slot that cannot be decoded is skipped
//! and counted; only a header that cannot be decoded at all fails the build.

use super::{FuncRecord, ObjectGroup, SymbolTable};
use crate::container::{Container, RawSymbol};
use crate::diagnostics::{DiagnosticKind, Diagnostics, Stage};
use crate::domain::{Address, PclntabError};
use crate::pclntab::{self, FuncName, Pclntab, PclntabHeader};
use indexmap::IndexSet;
use log::{debug, info};
use std::collections::BTreeMap;

/// Locate and decode the line table of `container`.
///
/// Returns `None` when the binary has no usable line table; the reason is
/// recorded in `diag`.
pub fn load(container: &Container, diag: &mut Diagnostics) -> Option<SymbolTable> {
    let range = match pclntab::locate(container) {
        Ok(range) => range,
        Err(e) => {
            diag.info(Stage::Container, DiagnosticKind::SectionNotFound, e.to_string());
            return None;
        }
    };
    debug!("Line table: {} bytes at file offset 0x{:x}", range.size, range.offset);

    let data = container.section_data(&range).to_vec();
    match build(data, container.symbols().to_vec(), container.text_address(), diag) {
        Ok(table) => Some(table),
        Err(e) => {
            diag.warn(Stage::Pclntab, DiagnosticKind::from(&e), e.to_string());
            None
        }
    }
}

/// Build a symbol table from raw line table bytes.
///
/// `text_fallback` supplies the text start for Go 1.18+ tables whose header
/// leaves it zero.
///
/// # Errors
/// Returns the header decoding error if `data` is not a supported line table
pub fn build(
    data: Vec<u8>,
    syms: Vec<RawSymbol>,
    text_fallback: Option<u64>,
    diag: &mut Diagnostics,
) -> Result<SymbolTable, PclntabError> {
    let mut header = PclntabHeader::decode(&data)?;
    if header.version.has_relative_entries() && header.text_start == 0 {
        if let Some(text) = text_fallback {
            debug!("Header text start is zero, using text section at 0x{text:x}");
            header.text_start = text;
        }
    }

    let table = Pclntab::with_header(&data, header.clone());
    let mut funcs = Vec::with_capacity(table.func_count());
    let mut skipped = 0;
    for index in 0..table.func_count() {
        match decode_func(&table, index) {
            Ok(record) => funcs.push(record),
            Err(e) => {
                skipped += 1;
                let kind = match e {
                    PclntabError::MalformedNameOffset { .. } => DiagnosticKind::MalformedNameOffset,
                    _ => DiagnosticKind::MalformedEntry,
                };
                diag.skipped_entry(kind, format!("function #{index}: {e}"));
            }
        }
    }
    funcs.sort_by_key(|f| f.entry);

    let (files, objects) = group_by_package(&table, &funcs, diag);

    info!(
        "Symbol table ({}): {} funcs, {} packages, {} files, {} skipped",
        header.version,
        funcs.len(),
        objects.len(),
        files.len(),
        skipped
    );

    Ok(SymbolTable { data, header, funcs, files, objects, syms, skipped })
}

fn decode_func(table: &Pclntab<'_>, index: usize) -> Result<FuncRecord, PclntabError> {
    let slot = table.func_entry(index)?;
    let data = table.func_data(&slot)?;
    let name = table.func_name(index, data.name_offset)?.into_owned();
    let parts = FuncName::parse(&name, table.header().version);

    Ok(FuncRecord {
        entry: Address(slot.entry),
        end: Address(slot.end),
        name,
        parts,
        pcln: data.pcln,
        pcfile: data.pcfile,
        cu_offset: data.cu_offset,
        func_offset: slot.func_offset,
    })
}

/// Assign functions to package groups and collect the files each one
/// references by replaying its pc-file program once.
fn group_by_package(
    table: &Pclntab<'_>,
    funcs: &[FuncRecord],
    diag: &mut Diagnostics,
) -> (IndexSet<String>, BTreeMap<String, ObjectGroup>) {
    let mut files = IndexSet::new();
    let mut objects: BTreeMap<String, ObjectGroup> = BTreeMap::new();

    for (index, func) in funcs.iter().enumerate() {
        let group = objects.entry(func.parts.package.clone()).or_default();
        group.funcs.push(index);

        let program = match table.pc_program(func.pcfile, func.entry.0) {
            Ok(Some(program)) => program,
            Ok(None) => continue,
            Err(e) => {
                diag.warn(Stage::SymbolTable, DiagnosticKind::MalformedEntry, format!("{}: {e}", func.name));
                continue;
            }
        };
        for range in program.ranges() {
            let resolved = range
                .map_err(|e| e.to_string())
                .and_then(|r| table.file_name(func.cu_offset, r.value).map_err(|e| e.to_string()));
            match resolved {
                Ok(Some(name)) => {
                    let (file_index, _) = files.insert_full(name.into_owned());
                    group.files.insert(file_index);
                }
                Ok(None) => {}
                Err(e) => {
                    diag.warn(
                        Stage::SymbolTable,
                        DiagnosticKind::MalformedEntry,
                        format!("{}: file table: {e}", func.name),
                    );
                    break;
                }
            }
        }
    }

    (files, objects)
}
