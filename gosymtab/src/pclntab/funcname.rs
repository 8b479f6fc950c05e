//! Go symbol name decomposition
//!
//! Splits a fully qualified function name such as
//! `github.com/x/y.(*T).Method` into package path, receiver and base name.

use super::header::PclntabVersion;
use serde::Serialize;

/// Parts of a function symbol name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FuncName {
    /// Import path of the defining package, empty for linker-synthesized
    /// symbols.
    pub package: String,
    /// Receiver type for methods, without parentheses (`*T`).
    pub receiver: Option<String>,
    pub base: String,
}

impl FuncName {
    /// Decompose `raw` following the naming rules of `version`.
    #[must_use]
    pub fn parse(raw: &str, version: PclntabVersion) -> Self {
        let name = strip_instantiation(raw);

        // Compiler-generated symbols belong to no package. Go 1.20 moved
        // their prefixes from `go.`/`type.` to `go:`/`type:`.
        let generated = if version >= PclntabVersion::Go120 {
            name.starts_with("go:") || name.starts_with("type:")
        } else {
            name.starts_with("go.") || name.starts_with("type.")
        };
        if generated {
            return Self { package: String::new(), receiver: None, base: base_name(&name).to_string() };
        }

        let path_end = name.rfind('/').unwrap_or(0);
        let tail = &name[path_end..];
        let (package, receiver) = match (tail.find('.'), tail.rfind('.')) {
            (Some(first), Some(last)) => {
                let package = unescape_package(&name[..path_end + first]);
                let receiver = (first != last)
                    .then(|| {
                        let inner = &tail[first + 1..last];
                        inner.strip_prefix('(').and_then(|r| r.strip_suffix(')')).unwrap_or(inner)
                    })
                    .filter(|r| !r.is_empty())
                    .map(str::to_string);
                (package, receiver)
            }
            _ => (String::new(), None),
        };

        Self { package, receiver, base: base_name(&name).to_string() }
    }
}

fn base_name(name: &str) -> &str {
    name.rfind('.').map_or(name, |i| &name[i + 1..])
}

/// Remove generic type arguments: everything from the first `[` to the last
/// `]`.
fn strip_instantiation(raw: &str) -> String {
    match (raw.find('['), raw.rfind(']')) {
        (Some(open), Some(close)) if open < close => {
            let mut out = String::with_capacity(raw.len());
            out.push_str(&raw[..open]);
            out.push_str(&raw[close + 1..]);
            out
        }
        _ => raw.to_string(),
    }
}

/// Decode `%xx` escapes the linker applies to package paths.
fn unescape_package(path: &str) -> String {
    if !path.contains('%') {
        return path.to_string();
    }
    let bytes = path.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let decoded = path
                .get(i + 1..i + 3)
                .and_then(|hex| u8::from_str_radix(hex, 16).ok());
            if let Some(byte) = decoded {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
