//! Verification engine: compares every tracked path of a baseline with the
//! local tree and builds a sorted [`Report`].
//!
//! Paths are checked by a bounded pool of worker threads pulling from a
//! shared queue; results are fanned in over one channel and the caller blocks
//! until every path has reported. Per-path problems never abort the run.

mod check;
mod report;

pub use report::{Outcome, OutcomeKind, Report};

use crate::control::{CancelToken, RunControl};
use crate::error::{Error, Result};
use crate::fs::Filesystem;
use crate::registry::{ChecksumRegistry, Entry, Resolver};
use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Instant;

/// Tuning for verification runs.
#[derive(Debug, Clone, Copy)]
pub struct VerifyOptions {
    /// Worker threads checking paths concurrently.
    pub workers: usize,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self { workers: 32 }
    }
}

/// Runs verifications and keeps the report of the most recent one.
pub struct Verifier {
    fs: Arc<dyn Filesystem>,
    options: VerifyOptions,
    control: RunControl,
    last_report: RwLock<Option<Arc<Report>>>,
}

impl Verifier {
    pub fn new(fs: Arc<dyn Filesystem>) -> Self {
        Self::with_options(fs, VerifyOptions::default())
    }

    pub fn with_options(fs: Arc<dyn Filesystem>, options: VerifyOptions) -> Self {
        Self {
            fs,
            options,
            control: RunControl::new(),
            last_report: RwLock::new(None),
        }
    }

    /// Verify `root` against `baseline` as resolved by `registry`.
    pub fn verify(
        &self,
        registry: &ChecksumRegistry,
        baseline: &str,
        root: &Path,
    ) -> Result<Arc<Report>> {
        self.validate_root(root)?;
        let resolver = registry.resolver(baseline)?;
        self.run(&resolver, root)
    }

    /// Verify `root` against an explicit resolver snapshot.
    pub fn verify_with(&self, resolver: &Resolver, root: &Path) -> Result<Arc<Report>> {
        self.validate_root(root)?;
        self.run(resolver, root)
    }

    /// Report of the last completed run, if any.
    pub fn report(&self) -> Option<Arc<Report>> {
        self.last_report
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Cancel every run in progress. Paths not yet checked report `Cancelled`.
    pub fn close(&self) {
        self.control.cancel_all();
    }

    fn validate_root(&self, root: &Path) -> Result<()> {
        if root.as_os_str().is_empty() {
            return Err(Error::InvalidInput("path is empty".into()));
        }
        match self.fs.stat(root) {
            Ok(md) if md.is_dir => Ok(()),
            Ok(_) => Err(Error::InvalidInput(format!(
                "path is not a directory: {}",
                root.display()
            ))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(Error::InvalidInput(format!(
                "path does not exist: {}",
                root.display()
            ))),
            Err(e) => Err(Error::InvalidInput(format!(
                "stat path {}: {e}",
                root.display()
            ))),
        }
    }

    fn run(&self, resolver: &Resolver, root: &Path) -> Result<Arc<Report>> {
        let guard = self.control.register();
        let start = Instant::now();
        let work: VecDeque<(Entry, String)> = resolver
            .entries()
            .into_iter()
            .map(|r| (r.entry.clone(), r.baseline.to_string()))
            .collect();
        tracing::debug!(
            target_baseline = resolver.target(),
            layers = ?resolver.layer_names(),
            paths = work.len(),
            root = %root.display(),
            "verification started"
        );

        let outcomes = run_pool(
            Arc::clone(&self.fs),
            resolver.clone(),
            root.to_path_buf(),
            work,
            self.options.workers,
            guard.token().clone(),
        )?;
        let report = Arc::new(Report::from_outcomes(outcomes));
        tracing::info!(
            target_baseline = resolver.target(),
            elapsed_secs = start.elapsed().as_secs_f64(),
            "{}",
            report
        );
        *self
            .last_report
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(Arc::clone(&report));
        Ok(report)
    }
}

/// Check every queued path with at most `max_workers` threads and collect the
/// outcomes in completion order.
fn run_pool(
    fs: Arc<dyn Filesystem>,
    resolver: Resolver,
    root: PathBuf,
    work: VecDeque<(Entry, String)>,
    max_workers: usize,
    token: CancelToken,
) -> Result<Vec<Outcome>> {
    let count = work.len();
    if count == 0 {
        return Ok(Vec::new());
    }
    let work = Arc::new(Mutex::new(work));
    let (tx, rx) = mpsc::channel();
    let num_workers = max_workers.max(1).min(count);
    let mut handles = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        let work = Arc::clone(&work);
        let tx = tx.clone();
        let fs = Arc::clone(&fs);
        let resolver = resolver.clone();
        let root = root.clone();
        let token = token.clone();
        handles.push(std::thread::spawn(move || loop {
            let next = work.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
            let Some((entry, baseline)) = next else {
                break;
            };
            let outcome = check::check_path(fs.as_ref(), &root, &resolver, &entry, &baseline, &token);
            if tx.send(outcome).is_err() {
                break;
            }
        }));
    }
    drop(tx);

    let mut outcomes = Vec::with_capacity(count);
    let mut first_error: Option<Error> = None;
    for _ in 0..count {
        match rx.recv() {
            Ok(outcome) => outcomes.push(outcome),
            Err(_) => {
                first_error = Some(Error::Internal(
                    "verification result channel closed (worker may have panicked)".into(),
                ));
                break;
            }
        }
    }
    for h in handles {
        if let Err(e) = h.join() {
            if first_error.is_none() {
                first_error = Some(Error::Internal(format!("verify worker panicked: {e:?}")));
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(outcomes),
    }
}
