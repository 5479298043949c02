//! Point-in-time view of the registry used for one verification run.

use super::baseline::{Baseline, Entry};
use std::collections::BTreeMap;
use std::sync::Arc;

/// An entry together with the baseline that supplied it.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    pub entry: &'a Entry,
    pub baseline: &'a str,
}

/// Ordered list of baselines to consult, already filtered by mode and
/// exclusions. Cheap to clone; holds `Arc`s of the baselines as they were
/// when the snapshot was taken, so later registry writes are not observed.
#[derive(Debug, Clone)]
pub struct Resolver {
    target: String,
    layers: Vec<Arc<Baseline>>,
}

impl Resolver {
    pub(super) fn new(target: impl Into<String>, layers: Vec<Arc<Baseline>>) -> Self {
        Self {
            target: target.into(),
            layers,
        }
    }

    /// Baseline the run was requested against.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Names of the consulted baselines in precedence order.
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|b| b.name()).collect()
    }

    /// Drop the named baselines from this snapshot only.
    pub fn excluding<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        self.layers
            .retain(|b| !names.iter().any(|n| n.as_ref() == b.name()));
        self
    }

    /// First match in precedence order; `None` means the path is untracked.
    pub fn resolve(&self, path: &str) -> Option<Resolved<'_>> {
        self.layers.iter().find_map(|b| {
            b.get(path).map(|entry| Resolved {
                entry,
                baseline: b.name(),
            })
        })
    }

    pub fn size(&self, path: &str) -> Option<u64> {
        self.resolve(path).map(|r| r.entry.size)
    }

    pub fn hash(&self, path: &str) -> Option<&str> {
        self.resolve(path).map(|r| r.entry.hash.as_str())
    }

    /// Union of all consulted baselines, one entry per path (the one
    /// [`resolve`](Self::resolve) would return), ascending by path.
    pub fn entries(&self) -> Vec<Resolved<'_>> {
        let mut merged: BTreeMap<&str, Resolved<'_>> = BTreeMap::new();
        for b in &self.layers {
            for entry in b.iter() {
                merged.entry(entry.path.as_str()).or_insert(Resolved {
                    entry,
                    baseline: b.name(),
                });
            }
        }
        merged.into_values().collect()
    }
}
