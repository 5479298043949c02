//! Per-path outcomes and the sorted report built from them.

use std::fmt;

/// What a single path check concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeKind {
    /// File present and matching.
    Ok,
    /// Entry is a deletion; never a failure whether or not the file exists.
    Deleted,
    NotFound,
    TypeMismatch { is_dir: bool },
    IntegrityMismatch,
    Cancelled,
    /// No consulted baseline lists the path.
    Untracked,
}

impl OutcomeKind {
    pub fn is_failure(self) -> bool {
        !matches!(self, OutcomeKind::Ok | OutcomeKind::Deleted)
    }
}

/// Result of checking one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub path: String,
    pub kind: OutcomeKind,
    /// Human-readable reason, e.g. "File not found".
    pub detail: String,
    /// Baseline the path was checked against.
    pub baseline: String,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.detail)
    }
}

/// Immutable summary of one verification run. Failures and successes are
/// each sorted ascending by path, independent of completion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    total: usize,
    failures: Vec<Outcome>,
    successes: Vec<Outcome>,
}

impl Report {
    pub fn from_outcomes<I>(outcomes: I) -> Self
    where
        I: IntoIterator<Item = Outcome>,
    {
        let (mut failures, mut successes): (Vec<_>, Vec<_>) =
            outcomes.into_iter().partition(|o| o.kind.is_failure());
        failures.sort_by(|a, b| a.path.cmp(&b.path));
        successes.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            total: failures.len() + successes.len(),
            failures,
            successes,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn ok_count(&self) -> usize {
        self.successes.len()
    }

    pub fn fail_count(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> &[Outcome] {
        &self.failures
    }

    pub fn successes(&self) -> &[Outcome] {
        &self.successes
    }

    /// Failures of one kind, in path order.
    pub fn failures_of(&self, kind: OutcomeKind) -> impl Iterator<Item = &Outcome> {
        self.failures.iter().filter(move |o| o.kind == kind)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Total: {} OK: {} Fail: {}",
            self.total,
            self.ok_count(),
            self.fail_count()
        )?;
        if let Some(first) = self.failures.first() {
            write!(
                f,
                " (First Failure: Baseline: {}, Path: {}, Reason: {})",
                first.baseline, first.path, first.detail
            )?;
        }
        Ok(())
    }
}
