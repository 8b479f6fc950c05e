//! Synthetic Go binaries for integration tests
//!
//! Builds relocatable ELF files with `object::write` that carry a
//! hand-assembled line table and build manifest.

#![allow(dead_code, clippy::cast_possible_truncation)]

use object::write::Object as WriteObject;
use object::{Architecture, BinaryFormat, Endianness, SectionKind};
use std::io::Write;
use tempfile::NamedTempFile;

pub const TEXT_START: u64 = 0x40_1000;

/// One function of a synthetic line table.
pub struct FuncFixture {
    pub name: &'static str,
    /// Offset from the text start (Go 1.18+) or absolute address (Go 1.2).
    pub entry: u64,
    /// `(value delta, pc delta)` pairs of the line program.
    pub lines: Vec<(i32, u32)>,
    /// `(value delta, pc delta)` pairs of the file program.
    pub files: Vec<(i32, u32)>,
}

fn uvarint(out: &mut Vec<u8>, mut v: u32) {
    while v >= 0x80 {
        out.push((v as u8 & 0x7f) | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

fn program(steps: &[(i32, u32)]) -> Vec<u8> {
    let mut out = Vec::new();
    for &(vdelta, pcdelta) in steps {
        uvarint(&mut out, ((vdelta << 1) ^ (vdelta >> 31)) as u32);
        uvarint(&mut out, pcdelta);
    }
    out.push(0);
    out
}

/// Go 1.20 line table (little-endian, 64-bit, quantum 1). All functions use
/// compile unit 0, whose file slots are `files`. The last function ends at
/// `end` (text-relative).
pub fn go120_pclntab(funcs: &[FuncFixture], files: &[&str], end: u32) -> Vec<u8> {
    let mut names = Vec::new();
    let mut name_offsets = Vec::new();
    for f in funcs {
        name_offsets.push(names.len() as u32);
        names.extend_from_slice(f.name.as_bytes());
        names.push(0);
    }

    let mut filetab = Vec::new();
    let mut cutab = Vec::new();
    for file in files {
        cutab.extend_from_slice(&(filetab.len() as u32).to_le_bytes());
        filetab.extend_from_slice(file.as_bytes());
        filetab.push(0);
    }

    let mut pctab = vec![0u8];
    let mut programs = Vec::new();
    for f in funcs {
        let pcln = pctab.len() as u32;
        pctab.extend(program(&f.lines));
        let pcfile = pctab.len() as u32;
        pctab.extend(program(&f.files));
        programs.push((pcln, pcfile));
    }

    let funcname = 72usize;
    let cu = funcname + names.len();
    let filetab_off = cu + cutab.len();
    let pctab_off = filetab_off + filetab.len();
    let funcdata = pctab_off + pctab.len();

    let mut t = Vec::new();
    t.extend_from_slice(&0xffff_fff1_u32.to_le_bytes());
    t.extend_from_slice(&[0, 0, 1, 8]);
    for w in [
        funcs.len() as u64,
        files.len() as u64,
        TEXT_START,
        funcname as u64,
        cu as u64,
        filetab_off as u64,
        pctab_off as u64,
        funcdata as u64,
    ] {
        t.extend_from_slice(&w.to_le_bytes());
    }
    t.extend(names);
    t.extend(cutab);
    t.extend(filetab);
    t.extend(pctab);

    let functab_len = ((funcs.len() * 2 + 1) * 4) as u32;
    for (i, f) in funcs.iter().enumerate() {
        t.extend_from_slice(&(f.entry as u32).to_le_bytes());
        t.extend_from_slice(&(functab_len + i as u32 * 40).to_le_bytes());
    }
    t.extend_from_slice(&end.to_le_bytes());
    for (i, f) in funcs.iter().enumerate() {
        let (pcln, pcfile) = programs[i];
        for v in [f.entry as u32, name_offsets[i], 0, 0, 0, pcfile, pcln, 0, 0, 0] {
            t.extend_from_slice(&v.to_le_bytes());
        }
    }
    t
}

/// Go 1.2 line table (little-endian, 64-bit, quantum 1). File values in the
/// file programs are 1-based indices into `files`.
pub fn go12_pclntab(funcs: &[FuncFixture], files: &[&str], end: u64) -> Vec<u8> {
    let n = funcs.len();
    let functab_off = 16;
    let functab_len = (2 * n + 1) * 8;
    let funcs_off = functab_off + functab_len + 8; // filetab offset word, padded
    let names_off = funcs_off + n * 40;

    let mut names = Vec::new();
    let mut name_offsets = Vec::new();
    for f in funcs {
        name_offsets.push((names_off + names.len()) as u32);
        names.extend_from_slice(f.name.as_bytes());
        names.push(0);
    }

    let pctab_off = names_off + names.len();
    let mut pctab = Vec::new();
    let mut programs = Vec::new();
    for f in funcs {
        let pcln = (pctab_off + pctab.len()) as u32;
        pctab.extend(program(&f.lines));
        let pcfile = (pctab_off + pctab.len()) as u32;
        pctab.extend(program(&f.files));
        programs.push((pcln, pcfile));
    }

    let filetab_off = pctab_off + pctab.len();
    let strings_off = filetab_off + 4 * (files.len() + 1);
    let mut filetab = Vec::new();
    let mut strings = Vec::new();
    filetab.extend_from_slice(&((files.len() + 1) as u32).to_le_bytes());
    for file in files {
        filetab.extend_from_slice(&((strings_off + strings.len()) as u32).to_le_bytes());
        strings.extend_from_slice(file.as_bytes());
        strings.push(0);
    }

    let mut t = Vec::new();
    t.extend_from_slice(&0xffff_fffb_u32.to_le_bytes());
    t.extend_from_slice(&[0, 0, 1, 8]);
    t.extend_from_slice(&(n as u64).to_le_bytes());
    for (i, f) in funcs.iter().enumerate() {
        t.extend_from_slice(&f.entry.to_le_bytes());
        t.extend_from_slice(&((funcs_off + i * 40) as u64).to_le_bytes());
    }
    t.extend_from_slice(&end.to_le_bytes());
    t.extend_from_slice(&(filetab_off as u32).to_le_bytes());
    t.extend_from_slice(&[0u8; 4]);
    for (i, f) in funcs.iter().enumerate() {
        let (pcln, pcfile) = programs[i];
        t.extend_from_slice(&f.entry.to_le_bytes());
        for v in [name_offsets[i], 0, 0, 0, pcfile, pcln, 0, 0] {
            t.extend_from_slice(&v.to_le_bytes());
        }
    }
    t.extend(names);
    t.extend(pctab);
    t.extend(filetab);
    t.extend(strings);
    t
}

/// Inline-string build manifest blob (Go 1.18+ style).
pub fn buildinfo(go_version: &str, modinfo: &str) -> Vec<u8> {
    let mut framed = vec![0x30u8; 16];
    framed.extend_from_slice(modinfo.as_bytes());
    framed.extend_from_slice(&[0xf9u8; 16]);

    let mut blob = b"\xff Go buildinf:".to_vec();
    blob.extend_from_slice(&[8, 0x2]);
    blob.resize(32, 0);
    for s in [go_version.as_bytes(), framed.as_slice()] {
        uvarint(&mut blob, s.len() as u32);
        blob.extend_from_slice(s);
    }
    blob
}

/// A relocatable x86-64 ELF file with the given sections.
pub fn elf(sections: &[(&str, SectionKind, Vec<u8>)]) -> Vec<u8> {
    let mut obj = WriteObject::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
    for (name, kind, data) in sections {
        let id = obj.add_section(Vec::new(), name.as_bytes().to_vec(), *kind);
        obj.section_mut(id).set_data(data.clone(), 16);
    }
    obj.write().expect("Failed to write ELF fixture")
}

pub fn write_temp(bytes: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(bytes).expect("Failed to write fixture");
    file.flush().expect("Failed to flush fixture");
    file
}

pub const MODINFO: &str = "path\texample.com/server/cmd/server\n\
mod\texample.com/server\t(devel)\t\n\
dep\tgithub.com/pkg/errors\tv0.9.1\th1:FEBLx1zS214owpjy7qsBeixbURkuhQAwrK5UwLGTwt4=\n\
dep\tgolang.org/x/sys\tv0.15.0\th1:h48lPFYpsTvQJZF4EKyI4aLHaev3CxivZmv7yZig9pc=\n\
=>\tgolang.org/x/sys\tv0.16.0\th1:replaced=\n\
build\tGOOS=linux\n\
build\tGOARCH=amd64\n";

/// Functions of the standard fixture: `main.main`, a pointer-receiver method
/// and a linker-synthesized symbol.
pub fn standard_funcs() -> Vec<FuncFixture> {
    vec![
        FuncFixture {
            name: "main.main",
            entry: 0x0,
            // Lines 10, 11, 12 over [0,4), [4,8), [8,16)
            lines: vec![(11, 4), (1, 4), (1, 8)],
            files: vec![(1, 16)],
        },
        FuncFixture {
            name: "example.com/server/internal/db.(*Conn).Query",
            entry: 0x10,
            lines: vec![(43, 0x20)],
            files: vec![(2, 0x20)],
        },
        FuncFixture {
            name: "go:buildid",
            entry: 0x30,
            lines: vec![(1, 0x10)],
            files: vec![(1, 0x10)],
        },
    ]
}

pub const STANDARD_FILES: &[&str] = &["/src/server/main.go", "/src/server/internal/db/conn.go"];

/// ELF with a Go 1.20 line table and a build manifest.
pub fn standard_binary() -> Vec<u8> {
    elf(&[
        (".text", SectionKind::Text, vec![0xc3; 0x40]),
        (".gopclntab", SectionKind::ReadOnlyData, go120_pclntab(&standard_funcs(), STANDARD_FILES, 0x40)),
        (".go.buildinfo", SectionKind::Data, buildinfo("go1.21.5", MODINFO)),
    ])
}
