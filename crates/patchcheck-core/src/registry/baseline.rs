//! Baselines: named sets of expected file entries.

use crate::checksum::{self, HashAlgorithm};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Expected state of one relative path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Relative, slash-separated path.
    pub path: String,
    /// Hex content digest; algorithm inferred from its length.
    pub hash: String,
    pub size: u64,
    /// The path is expected to be absent (listed as a deletion).
    #[serde(default, rename = "deleted")]
    pub is_deleted: bool,
}

impl Entry {
    pub fn new(path: impl AsRef<str>, hash: impl Into<String>, size: u64) -> Self {
        Self {
            path: normalize_path(path.as_ref()),
            hash: hash.into(),
            size,
            is_deleted: false,
        }
    }

    pub fn deleted(path: impl AsRef<str>) -> Self {
        Self {
            path: normalize_path(path.as_ref()),
            hash: String::new(),
            size: 0,
            is_deleted: true,
        }
    }
}

/// Normalize a manifest or baseline path: `\` becomes `/`, leading `./` and
/// `/` are dropped and empty or `.` segments collapse.
pub fn normalize_path(path: &str) -> String {
    path.replace('\\', "/")
        .split('/')
        .filter(|seg| !seg.is_empty() && *seg != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether a normalized path stays inside the directory it is joined to: no
/// `..` segment and no drive prefix such as `C:`.
pub fn is_confined(normalized: &str) -> bool {
    !normalized
        .split('/')
        .enumerate()
        .any(|(i, seg)| seg == ".." || (i == 0 && seg.contains(':')))
}

/// A named mapping of path to entry. Immutable once built; the registry swaps
/// whole baselines behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Baseline {
    name: String,
    entries: BTreeMap<String, Entry>,
}

impl Baseline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: BTreeMap::new(),
        }
    }

    /// Build from entries; paths are normalized and a later duplicate replaces
    /// an earlier one.
    pub fn from_entries<I>(name: impl Into<String>, entries: I) -> Self
    where
        I: IntoIterator<Item = Entry>,
    {
        let mut baseline = Self::new(name);
        for mut entry in entries {
            entry.path = normalize_path(&entry.path);
            if entry.path.is_empty() {
                continue;
            }
            baseline.entries.insert(entry.path.clone(), entry);
        }
        baseline
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, path: &str) -> Option<&Entry> {
        self.entries.get(path)
    }

    /// Entries in ascending path order.
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write as a JSON baseline file (see [`load_json`]).
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let file = BaselineFile {
            name: self.name.clone(),
            entries: self.entries.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::Internal(format!("encode baseline {}: {e}", self.name)))?;
        fs::write(path, json).map_err(|e| Error::io(format!("write {}", path.display()), e))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct BaselineFile {
    name: String,
    entries: Vec<Entry>,
}

/// Load a baseline from a JSON file of the form
/// `{"name": "...", "entries": [{"path", "hash", "size", "deleted"}]}`.
pub fn load_json(path: &Path) -> Result<Baseline> {
    let data =
        fs::read_to_string(path).map_err(|e| Error::io(format!("read {}", path.display()), e))?;
    parse_json(&data).map_err(|e| match e {
        Error::InvalidInput(msg) => Error::InvalidInput(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// Parse a JSON baseline document.
pub fn parse_json(data: &str) -> Result<Baseline> {
    let file: BaselineFile = serde_json::from_str(data)
        .map_err(|e| Error::InvalidInput(format!("parse baseline: {e}")))?;
    Ok(Baseline::from_entries(file.name, file.entries))
}

/// Walk `root` and hash every regular file into a baseline named `name`.
/// Relative paths containing any of `excludes` as a substring are skipped.
pub fn scan(
    name: &str,
    root: &Path,
    algorithm: HashAlgorithm,
    excludes: &[String],
) -> Result<Baseline> {
    let mut entries = Vec::new();
    for item in WalkDir::new(root).follow_links(false) {
        let item = item.map_err(|e| Error::io(format!("walk {}", root.display()), e.into()))?;
        if !item.file_type().is_file() {
            continue;
        }
        let rel = item
            .path()
            .strip_prefix(root)
            .map_err(|e| Error::Internal(format!("strip prefix: {e}")))?;
        let rel = normalize_path(&rel.to_string_lossy());
        if excludes.iter().any(|pat| rel.contains(pat.as_str())) {
            continue;
        }
        let size = item
            .metadata()
            .map_err(|e| Error::io(format!("stat {}", item.path().display()), e.into()))?
            .len();
        let hash = checksum::hash_path(item.path(), algorithm)
            .map_err(|e| Error::Internal(format!("{e:#}")))?;
        entries.push(Entry::new(rel, hash, size));
    }
    tracing::debug!(baseline = name, root = %root.display(), files = entries.len(), "scanned baseline");
    Ok(Baseline::from_entries(name, entries))
}
