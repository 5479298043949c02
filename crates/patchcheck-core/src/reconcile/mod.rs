//! Reconciliation: verify a tree against a manifest and download exactly the
//! files the manifest adds that are missing locally.
//!
//! Pipeline: manifest -> overlay baseline -> verification -> selection of
//! `NotFound` paths -> bounded download pool. All-or-nothing: the first
//! download failure cancels the rest and is returned to the caller.

mod pool;
mod progress;

pub use progress::{human_size, percent, ReconcileProgress};

use crate::control::RunControl;
use crate::error::{Error, Result};
use crate::fs::Filesystem;
use crate::manifest::{FileDescriptor, Manifest};
use crate::registry::{is_confined, normalize_path, ChecksumRegistry, OVERLAY};
use crate::transport::{self, Fetcher};
use crate::verify::{OutcomeKind, Report, Verifier, VerifyOptions};
use pool::DownloadTask;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::mpsc::UnboundedSender;

/// Tuning for reconciliation runs.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileOptions {
    /// Concurrent downloads.
    pub workers: usize,
    pub verify: VerifyOptions,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            workers: 100,
            verify: VerifyOptions::default(),
        }
    }
}

/// What a successful reconciliation did.
#[derive(Debug, Clone)]
pub struct ReconcileSummary {
    pub files_downloaded: usize,
    pub bytes_downloaded: u64,
    /// Verification report the download selection was made from.
    pub report: Arc<Report>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
}

/// Resets the phase to `Idle` on every exit path, panics included.
struct FlightGuard<'a> {
    phase: &'a Mutex<Phase>,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        *lock(self.phase) = Phase::Idle;
    }
}

fn lock(phase: &Mutex<Phase>) -> MutexGuard<'_, Phase> {
    phase.lock().unwrap_or_else(|e| e.into_inner())
}

/// Owns the verifier used for reconciliation and the single-flight state.
pub struct Reconciler {
    registry: Arc<ChecksumRegistry>,
    fs: Arc<dyn Filesystem>,
    fetcher: Arc<dyn Fetcher>,
    verifier: Verifier,
    options: ReconcileOptions,
    phase: Mutex<Phase>,
    control: RunControl,
}

impl Reconciler {
    pub fn new(
        registry: Arc<ChecksumRegistry>,
        fs: Arc<dyn Filesystem>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self::with_options(registry, fs, fetcher, ReconcileOptions::default())
    }

    pub fn with_options(
        registry: Arc<ChecksumRegistry>,
        fs: Arc<dyn Filesystem>,
        fetcher: Arc<dyn Fetcher>,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            registry,
            verifier: Verifier::with_options(Arc::clone(&fs), options.verify),
            fs,
            fetcher,
            options,
            phase: Mutex::new(Phase::Idle),
            control: RunControl::new(),
        }
    }

    /// Whether a reconciliation is currently running on this instance.
    pub fn is_running(&self) -> bool {
        *lock(&self.phase) == Phase::Running
    }

    /// Report of the verification run made by the last reconciliation.
    pub fn last_report(&self) -> Option<Arc<Report>> {
        self.verifier.report()
    }

    /// Cancel the reconciliation in progress, if any. In-flight transfers
    /// abort and no new download starts.
    pub fn close(&self) {
        self.control.cancel_all();
        self.verifier.close();
    }

    fn begin(&self) -> Result<FlightGuard<'_>> {
        let mut phase = lock(&self.phase);
        if *phase == Phase::Running {
            return Err(Error::AlreadyInProgress);
        }
        *phase = Phase::Running;
        Ok(FlightGuard { phase: &self.phase })
    }

    /// Bring `root` in line with `manifest`, downloading only missing files.
    /// Progress events, one per completed file, go to `progress_tx` if given.
    pub fn reconcile(
        &self,
        manifest: &Manifest,
        root: &Path,
        progress_tx: Option<&UnboundedSender<ReconcileProgress>>,
    ) -> Result<ReconcileSummary> {
        let _flight = self.begin()?;
        let run = self.control.register();

        self.registry.set_manifest(manifest);
        let unrelated = self.registry.secondary_names();
        let resolver = self.registry.resolver(OVERLAY)?.excluding(&unrelated);
        let report = self.verifier.verify_with(&resolver, root)?;

        let additions: HashMap<String, &FileDescriptor> = manifest
            .additions
            .iter()
            .map(|f| (normalize_path(&f.name), f))
            .collect();
        let mut selected: Vec<&FileDescriptor> = Vec::new();
        for failure in report.failures_of(OutcomeKind::NotFound) {
            match additions.get(&failure.path) {
                Some(file) => selected.push(file),
                None => return Err(Error::ManifestMismatch(failure.path.clone())),
            }
        }
        if selected.is_empty() {
            tracing::info!("no patch needed: {}", report);
            return Ok(ReconcileSummary {
                files_downloaded: 0,
                bytes_downloaded: 0,
                report,
            });
        }
        if run.token().is_cancelled() {
            return Err(Error::Cancelled);
        }

        transport::validate_base_url(&manifest.download_base_url)?;
        let mut tasks = Vec::with_capacity(selected.len());
        for file in &selected {
            let path = normalize_path(&file.name);
            if !is_confined(&path) {
                return Err(Error::InvalidInput(format!(
                    "manifest entry {:?} escapes {}",
                    file.name,
                    root.display()
                )));
            }
            let dest = root.join(&path);
            if let Some(parent) = dest.parent() {
                self.fs
                    .create_dir_all(parent)
                    .map_err(|e| Error::io(format!("create dir {}", parent.display()), e))?;
            }
            tasks.push(DownloadTask {
                url: manifest.url_for(&path),
                path,
                dest,
                expected_size: file.size,
            });
        }

        let start = Instant::now();
        tracing::info!(
            files = tasks.len(),
            size = %human_size(Manifest::total_size(selected.iter().copied())),
            workers = self.options.workers,
            "downloading"
        );
        let totals = pool::run_downloads(
            Arc::clone(&self.fs),
            Arc::clone(&self.fetcher),
            tasks,
            self.options.workers,
            run.token(),
            progress_tx,
        )?;
        tracing::info!(
            "downloaded {} files ({}) in {:.2}s",
            totals.files,
            human_size(totals.bytes),
            start.elapsed().as_secs_f64()
        );
        Ok(ReconcileSummary {
            files_downloaded: totals.files,
            bytes_downloaded: totals.bytes,
            report,
        })
    }
}

#[cfg(test)]
mod tests;
