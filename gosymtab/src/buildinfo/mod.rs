//! # Build Manifest Reader
//!
//! `go build` embeds a small header in a writable data section:
//!
//! ```text
//! offset  0..14  magic "\xff Go buildinf:"
//! offset     14  pointer size
//! offset     15  flags (bit 0: big-endian, bit 1: inline strings)
//! offset 16..32  pointers to the version and module text string headers
//! offset 32..    inline strings: uvarint length + bytes, twice
//! ```
//!
//! The header sits at a 16-byte aligned offset inside `.go.buildinfo`
//! (`__go_buildinfo` on Mach-O). Binaries without that section are scanned
//! section by section. Older toolchains store two pointers to Go string
//! headers instead of inline strings; those are followed through an
//! [`AddressSpace`].

pub mod modinfo;

use crate::container::{AddressSpace, Container, SectionClass};
use crate::diagnostics::{DiagnosticKind, Diagnostics, Stage};
use crate::domain::ManifestError;
use crate::pclntab::reader::read_uvarint;
use log::{debug, info};

pub use modinfo::{BuildManifest, BuildSetting, ModuleRecord};

pub const MAGIC: &[u8; 14] = b"\xff Go buildinf:";
pub const SECTION_NAMES: &[&str] = &[".go.buildinfo", "__go_buildinfo"];

const HEADER_LEN: usize = 32;
const ALIGN: usize = 16;
/// The header is expected within the first 64 KiB of a section.
const SCAN_LIMIT: usize = 64 * 1024;

const FLAG_BIG_ENDIAN: u8 = 0x1;
const FLAG_INLINE: u8 = 0x2;

/// Decode the build manifest of `container`.
///
/// Returns `None` when there is none or it cannot be decoded; the reason is
/// recorded in `diag`.
pub fn load(container: &Container, diag: &mut Diagnostics) -> Option<BuildManifest> {
    match read(container) {
        Ok(manifest) => {
            info!(
                "Build manifest: {} with {} dependencies",
                manifest.go_version,
                manifest.deps.len()
            );
            Some(manifest)
        }
        Err(e @ ManifestError::NotFound) => {
            diag.info(Stage::Manifest, DiagnosticKind::from(&e), e.to_string());
            None
        }
        Err(e) => {
            diag.warn(Stage::Manifest, DiagnosticKind::from(&e), e.to_string());
            None
        }
    }
}

/// Locate and decode the build manifest of `container`.
///
/// # Errors
/// Returns [`ManifestError::NotFound`] if no section carries the magic and
/// [`ManifestError::Corrupt`] if the header or module text is malformed
pub fn read(container: &Container) -> Result<BuildManifest, ManifestError> {
    let candidates: Vec<&[u8]> = match container.find_any_section(SECTION_NAMES) {
        Ok((_, range)) => vec![container.section_data(&range)],
        Err(_) => {
            debug!("No build info section, scanning data sections");
            container
                .sections()
                .filter(|s| s.class == SectionClass::Data)
                .filter_map(|s| s.range)
                .map(|range| container.section_data(&range))
                .collect()
        }
    };

    let blob = candidates
        .into_iter()
        .find_map(find_blob)
        .ok_or(ManifestError::NotFound)?;
    decode(blob, container)
}

/// Decode a blob starting at the magic.
///
/// # Errors
/// Returns [`ManifestError::Corrupt`] if the strings cannot be read
pub fn decode<S: AddressSpace + ?Sized>(blob: &[u8], space: &S) -> Result<BuildManifest, ManifestError> {
    let (version, text) = read_strings(blob, space)?;
    let version = utf8(version, "version")?;
    if version.is_empty() {
        return Err(ManifestError::Corrupt("empty Go version".to_string()));
    }
    let text = utf8(modinfo::strip_sentinels(text), "module text")?;
    BuildManifest::parse(version, text)
}

/// Find the header: the first occurrence of the magic at an aligned offset
/// within the scan window, followed by a complete header.
#[must_use]
pub fn find_blob(data: &[u8]) -> Option<&[u8]> {
    let window = &data[..data.len().min(SCAN_LIMIT)];
    let mut start = 0;
    loop {
        let i = start + window.get(start..)?.windows(MAGIC.len()).position(|w| w == MAGIC)?;
        if data.len() - i < HEADER_LEN {
            return None;
        }
        if i % ALIGN == 0 {
            return Some(&data[i..]);
        }
        start = (i + ALIGN - 1) & !(ALIGN - 1);
    }
}

fn read_strings<'a, S: AddressSpace + ?Sized>(
    blob: &'a [u8],
    space: &'a S,
) -> Result<(&'a [u8], &'a [u8]), ManifestError> {
    if blob.len() < HEADER_LEN {
        return Err(ManifestError::Corrupt(format!("header truncated to {} bytes", blob.len())));
    }
    let ptr_size = blob[14];
    let flags = blob[15];

    if flags & FLAG_INLINE != 0 {
        let mut pos = HEADER_LEN;
        let version = inline_string(blob, &mut pos)?;
        let modinfo = inline_string(blob, &mut pos)?;
        return Ok((version, modinfo));
    }

    if !matches!(ptr_size, 4 | 8) {
        return Err(ManifestError::Corrupt(format!("invalid pointer size {ptr_size}")));
    }
    let big_endian = flags & FLAG_BIG_ENDIAN != 0;
    let ptr = usize::from(ptr_size);
    let read_ptr = |bytes: &[u8]| -> u64 {
        let mut raw = [0u8; 8];
        if big_endian {
            raw[8 - ptr..].copy_from_slice(&bytes[..ptr]);
            u64::from_be_bytes(raw)
        } else {
            raw[..ptr].copy_from_slice(&bytes[..ptr]);
            u64::from_le_bytes(raw)
        }
    };

    let string_at = |header_addr: u64| -> Result<&'a [u8], ManifestError> {
        let header = space
            .read_at(header_addr, 2 * ptr)
            .ok_or_else(|| ManifestError::Corrupt(format!("unmapped string header at 0x{header_addr:x}")))?;
        let (addr, len) = (read_ptr(header), read_ptr(&header[ptr..]));
        let len = usize::try_from(len)
            .ok()
            .filter(|&l| l <= u32::MAX as usize)
            .ok_or_else(|| ManifestError::Corrupt(format!("implausible string length {len}")))?;
        if len == 0 {
            return Ok(&[]);
        }
        space
            .read_at(addr, len)
            .ok_or_else(|| ManifestError::Corrupt(format!("unmapped string data at 0x{addr:x}")))
    };

    let version = string_at(read_ptr(&blob[16..]))?;
    let modinfo = string_at(read_ptr(&blob[16 + ptr..]))?;
    Ok((version, modinfo))
}

fn inline_string<'a>(blob: &'a [u8], pos: &mut usize) -> Result<&'a [u8], ManifestError> {
    let len = read_uvarint(blob, pos)
        .ok_or_else(|| ManifestError::Corrupt(format!("bad string length at offset {pos}")))?;
    let start = *pos;
    let end = start
        .checked_add(len as usize)
        .filter(|&end| end <= blob.len())
        .ok_or_else(|| ManifestError::Corrupt(format!("string of {len} bytes at offset {start} overruns section")))?;
    *pos = end;
    Ok(&blob[start..end])
}

fn utf8<'a>(bytes: &'a [u8], what: &str) -> Result<&'a str, ManifestError> {
    std::str::from_utf8(bytes).map_err(|e| ManifestError::Corrupt(format!("{what} is not UTF-8: {e}")))
}
