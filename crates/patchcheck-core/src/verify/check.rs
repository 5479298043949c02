//! Check of a single tracked path against local state.

use super::report::{Outcome, OutcomeKind};
use crate::checksum::{self, HashAlgorithm};
use crate::control::CancelToken;
use crate::fs::Filesystem;
use crate::registry::{Entry, Resolver};
use std::io;
use std::path::Path;

/// Compare `entry` with the file under `root`. Never fails: every problem is
/// folded into the returned outcome.
pub(super) fn check_path(
    fs: &dyn Filesystem,
    root: &Path,
    resolver: &Resolver,
    entry: &Entry,
    baseline: &str,
    token: &CancelToken,
) -> Outcome {
    let outcome = |kind, detail: String| Outcome {
        path: entry.path.clone(),
        kind,
        detail,
        baseline: baseline.to_string(),
    };
    let full_path = root.join(&entry.path);

    let md = match fs.stat(&full_path) {
        Ok(md) => md,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if entry.is_deleted {
                return outcome(OutcomeKind::Deleted, "Deleted".into());
            }
            return outcome(OutcomeKind::NotFound, "File not found".into());
        }
        Err(e) => return outcome(OutcomeKind::NotFound, format!("File not found: {e}")),
    };
    // Orphaned copies of deleted files are tolerated.
    if entry.is_deleted {
        return outcome(OutcomeKind::Deleted, "Deleted upstream, local copy kept".into());
    }
    if md.is_dir {
        return outcome(
            OutcomeKind::TypeMismatch { is_dir: true },
            "Is a directory".into(),
        );
    }
    if token.is_cancelled() {
        return outcome(OutcomeKind::Cancelled, "Job cancelled".into());
    }

    let expected = match resolver.resolve(&entry.path) {
        Some(r) => r.entry,
        None => {
            return outcome(
                OutcomeKind::Untracked,
                "Untracked: no consulted baseline lists this path".into(),
            )
        }
    };
    if expected.size == md.len {
        return outcome(OutcomeKind::Ok, "OK".into());
    }

    let algorithm = HashAlgorithm::for_digest(&expected.hash);
    let actual_hash = match fs
        .open_read(&full_path)
        .and_then(|r| checksum::hash_reader(r, algorithm))
    {
        Ok(h) => h,
        Err(e) => {
            return outcome(
                OutcomeKind::IntegrityMismatch,
                format!(
                    "Hash failure: {e} (sizes {} vs {})",
                    expected.size, md.len
                ),
            )
        }
    };
    if !checksum::digests_match(&actual_hash, &expected.hash) {
        return outcome(
            OutcomeKind::IntegrityMismatch,
            format!(
                "Hash mismatch: expected size {} hash {}, found size {} hash {}",
                expected.size, expected.hash, md.len, actual_hash
            ),
        );
    }
    outcome(OutcomeKind::Ok, "OK (size differs, hash matches)".into())
}
