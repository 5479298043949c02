//! Checksum registry: named baselines plus the precedence rules used to
//! resolve a relative path to its expected size and hash.
//!
//! The overlay (manifest-derived) baseline is always consulted first, then
//! the secondary baselines in the order they were first loaded. Exclusions
//! are cumulative and only suppress fallback; stored entries never change.
//! In limited mode a lookup sees exactly the requested baseline.

mod baseline;
mod resolve;

pub use baseline::{
    is_confined, load_json, normalize_path, parse_json, scan, Baseline, Entry,
};
pub use resolve::{Resolved, Resolver};

use crate::error::{Error, Result};
use crate::manifest::Manifest;
use std::collections::BTreeSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Name under which the manifest overlay baseline is registered.
pub const OVERLAY: &str = "manifest";

#[derive(Debug)]
struct State {
    overlay: Arc<Baseline>,
    /// Secondary baselines in declaration order.
    secondary: Vec<Arc<Baseline>>,
    excluded: BTreeSet<String>,
    limited: bool,
}

/// Thread-safe registry of baselines. Share it behind an `Arc`.
#[derive(Debug)]
pub struct ChecksumRegistry {
    state: RwLock<State>,
}

impl Default for ChecksumRegistry {
    fn default() -> Self {
        Self {
            state: RwLock::new(State {
                overlay: Arc::new(Baseline::new(OVERLAY)),
                secondary: Vec::new(),
                excluded: BTreeSet::new(),
                limited: false,
            }),
        }
    }
}

impl ChecksumRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace (or declare) the baseline `name` with `entries`.
    pub fn load_baseline<I>(&self, name: &str, entries: I)
    where
        I: IntoIterator<Item = Entry>,
    {
        self.insert_baseline(Baseline::from_entries(name, entries));
    }

    /// Install a prebuilt baseline. The new baseline is built before the write
    /// lock is taken, so readers see either the old or the new one.
    pub fn insert_baseline(&self, baseline: Baseline) {
        let baseline = Arc::new(baseline);
        let mut state = self.write();
        if baseline.name() == OVERLAY {
            state.overlay = baseline;
            return;
        }
        match state
            .secondary
            .iter_mut()
            .find(|b| b.name() == baseline.name())
        {
            Some(slot) => *slot = baseline,
            None => state.secondary.push(baseline),
        }
    }

    /// Parse manifest bytes and install them as the overlay baseline.
    pub fn set_manifest_overlay(&self, data: &[u8]) -> Result<Manifest> {
        let manifest = Manifest::parse(data)?;
        self.set_manifest(&manifest);
        Ok(manifest)
    }

    /// Install an already-parsed manifest as the overlay baseline.
    pub fn set_manifest(&self, manifest: &Manifest) {
        let overlay = manifest.to_baseline(OVERLAY);
        tracing::debug!(
            version = %manifest.version,
            entries = overlay.len(),
            "installing manifest overlay"
        );
        self.insert_baseline(overlay);
    }

    /// Add baselines to the exclusion set. Previous exclusions are kept.
    pub fn exclude_baselines<S: AsRef<str>>(&self, names: &[S]) {
        let mut state = self.write();
        state
            .excluded
            .extend(names.iter().map(|n| n.as_ref().to_string()));
    }

    pub fn excluded(&self) -> Vec<String> {
        self.read().excluded.iter().cloned().collect()
    }

    /// Limited mode restricts every lookup to the requested baseline.
    pub fn set_limited(&self, limited: bool) {
        self.write().limited = limited;
    }

    pub fn is_limited(&self) -> bool {
        self.read().limited
    }

    /// Names of the declared secondary baselines in precedence order.
    pub fn secondary_names(&self) -> Vec<String> {
        self.read()
            .secondary
            .iter()
            .map(|b| b.name().to_string())
            .collect()
    }

    /// Stored baseline by name, regardless of exclusions.
    pub fn baseline(&self, name: &str) -> Option<Arc<Baseline>> {
        let state = self.read();
        if name == OVERLAY {
            return Some(Arc::clone(&state.overlay));
        }
        state.secondary.iter().find(|b| b.name() == name).cloned()
    }

    /// Snapshot of the baselines a lookup against `target` consults.
    pub fn resolver(&self, target: &str) -> Result<Resolver> {
        let state = self.read();
        let known = target == OVERLAY || state.secondary.iter().any(|b| b.name() == target);
        if !known {
            return Err(Error::UnknownBaseline(target.to_string()));
        }
        let layers: Vec<Arc<Baseline>> = if state.limited {
            std::iter::once(&state.overlay)
                .chain(&state.secondary)
                .filter(|b| b.name() == target)
                .cloned()
                .collect()
        } else {
            std::iter::once(&state.overlay)
                .chain(&state.secondary)
                .filter(|b| !state.excluded.contains(b.name()))
                .cloned()
                .collect()
        };
        Ok(Resolver::new(target, layers))
    }

    /// Expected size of `path`; `None` if untracked (or `target` unknown).
    pub fn resolve_size(&self, target: &str, path: &str) -> Option<u64> {
        self.resolver(target).ok()?.size(&normalize_path(path))
    }

    /// Expected hash of `path`; `None` if untracked (or `target` unknown).
    pub fn resolve_hash(&self, target: &str, path: &str) -> Option<String> {
        self.resolver(target)
            .ok()?
            .hash(&normalize_path(path))
            .map(str::to_string)
    }

    /// Expected entry of `path` together with the baseline that supplied it.
    pub fn resolve(&self, target: &str, path: &str) -> Option<(Entry, String)> {
        let resolver = self.resolver(target).ok()?;
        let resolved = resolver.resolve(&normalize_path(path))?;
        Some((resolved.entry.clone(), resolved.baseline.to_string()))
    }

    /// The entries a verification of `target` walks, ascending by path.
    pub fn iterate(&self, target: &str) -> Result<Vec<Entry>> {
        let resolver = self.resolver(target)?;
        Ok(resolver
            .entries()
            .into_iter()
            .map(|r| r.entry.clone())
            .collect())
    }
}
