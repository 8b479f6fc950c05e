//! Module information text embedded by `go build`
//!
//! ```text
//! path    example.com/cmd/app
//! mod     example.com/cmd     v1.2.0  h1:...
//! dep     golang.org/x/sys    v0.1.0  h1:...
//! =>      ../sys              (replacement of the line above)
//! build   GOOS=linux
//! ```
//!
//! Columns are tab separated. The blob is framed by two 16-byte sentinels
//! which [`strip_sentinels`] removes.

use crate::domain::ManifestError;
use serde::Serialize;
use std::collections::BTreeMap;

/// Length of each framing sentinel around the module text.
const SENTINEL_LEN: usize = 16;

/// One module, optionally replaced by another.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModuleRecord {
    pub path: String,
    pub version: String,
    pub sum: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace: Option<Box<ModuleRecord>>,
}

impl ModuleRecord {
    /// The record that was actually built: the replacement if present.
    #[must_use]
    pub fn effective(&self) -> &ModuleRecord {
        self.replace.as_deref().unwrap_or(self)
    }
}

/// A `build` setting line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSetting {
    pub key: String,
    pub value: String,
}

/// Decoded build manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildManifest {
    pub go_version: String,
    /// Import path of the main package.
    pub path: String,
    pub main: Option<ModuleRecord>,
    /// Dependencies keyed by their original module path.
    pub deps: BTreeMap<String, ModuleRecord>,
    pub settings: Vec<BuildSetting>,
}

/// Module line most recently seen, target of a following `=>` line.
enum Previous {
    None,
    Main,
    Dep(String),
}

impl BuildManifest {
    /// Parse module text (already stripped of sentinels).
    ///
    /// # Errors
    /// Returns [`ManifestError::Corrupt`] for lines with the wrong number of
    /// columns, a replacement that follows no module, or a malformed build
    /// setting
    pub fn parse(go_version: &str, modinfo: &str) -> Result<Self, ManifestError> {
        let mut manifest = Self { go_version: go_version.to_string(), ..Self::default() };
        let mut previous = Previous::None;

        for (lineno, line) in modinfo.lines().enumerate() {
            let corrupt = |what: &str| ManifestError::Corrupt(format!("line {}: {what}", lineno + 1));
            let Some((tag, rest)) = line.split_once('\t') else {
                continue;
            };

            match tag {
                "go" => {
                    if manifest.go_version.is_empty() {
                        manifest.go_version = rest.to_string();
                    }
                }
                "path" => manifest.path = rest.to_string(),
                "mod" => {
                    manifest.main = Some(module(rest).ok_or_else(|| corrupt("expected 2 or 3 columns for mod"))?);
                    previous = Previous::Main;
                }
                "dep" => {
                    let dep = module(rest).ok_or_else(|| corrupt("expected 2 or 3 columns for dep"))?;
                    let path = dep.path.clone();
                    manifest.deps.insert(path.clone(), dep);
                    previous = Previous::Dep(path);
                }
                "=>" => {
                    let replacement =
                        module(rest).ok_or_else(|| corrupt("expected 2 or 3 columns for replacement"))?;
                    let target = match &previous {
                        Previous::None => None,
                        Previous::Main => manifest.main.as_mut(),
                        Previous::Dep(path) => manifest.deps.get_mut(path),
                    };
                    let target = target.ok_or_else(|| corrupt("replacement with no module on previous line"))?;
                    target.replace = Some(Box::new(replacement));
                    previous = Previous::None;
                }
                "build" => {
                    let (key, value) = rest
                        .split_once('=')
                        .ok_or_else(|| corrupt("build setting without '='"))?;
                    if key.is_empty() {
                        return Err(corrupt("empty build setting key"));
                    }
                    manifest.settings.push(BuildSetting { key: unquote(key), value: unquote(value) });
                }
                _ => {}
            }
        }

        Ok(manifest)
    }

    /// The main module as built (its replacement if it has one).
    #[must_use]
    pub fn main_effective(&self) -> Option<&ModuleRecord> {
        self.main.as_ref().map(ModuleRecord::effective)
    }

    /// Effective record of the dependency originally named `path`.
    #[must_use]
    pub fn dependency(&self, path: &str) -> Option<&ModuleRecord> {
        self.deps.get(path).map(ModuleRecord::effective)
    }

    /// `(original path, effective record)` for every dependency, sorted by
    /// path.
    pub fn dependencies(&self) -> impl Iterator<Item = (&str, &ModuleRecord)> + '_ {
        self.deps.iter().map(|(path, m)| (path.as_str(), m.effective()))
    }

    /// Value of a build setting such as `GOOS`.
    #[must_use]
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.iter().find(|s| s.key == key).map(|s| s.value.as_str())
    }
}

/// `path \t version [\t sum]`; a trailing empty column is dropped.
fn module(rest: &str) -> Option<ModuleRecord> {
    let mut cols: Vec<&str> = rest.split('\t').collect();
    if cols.len() == 3 && cols[2].is_empty() {
        cols.pop();
    }
    match cols.as_slice() {
        [path, version] => Some(ModuleRecord {
            path: (*path).to_string(),
            version: (*version).to_string(),
            ..ModuleRecord::default()
        }),
        [path, version, sum] => Some(ModuleRecord {
            path: (*path).to_string(),
            version: (*version).to_string(),
            sum: (*sum).to_string(),
            replace: None,
        }),
        _ => None,
    }
}

fn unquote(s: &str) -> String {
    match s.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => s.to_string(),
    }
}

/// Remove the framing sentinels, or return an empty string when the text is
/// not framed.
#[must_use]
pub fn strip_sentinels(modinfo: &[u8]) -> &[u8] {
    let len = modinfo.len();
    if len > 2 * SENTINEL_LEN && modinfo[len - SENTINEL_LEN - 1] == b'\n' {
        &modinfo[SENTINEL_LEN..len - SENTINEL_LEN]
    } else {
        &[]
    }
}
