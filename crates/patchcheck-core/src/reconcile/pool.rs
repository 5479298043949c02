//! Bounded download worker pool with a single coordinator.
//!
//! Workers pull tasks from a shared queue and push outcomes to one channel.
//! A worker whose download fails raises the pool's failure flag and exits, so
//! no worker starts another task afterwards. The coordinator (the calling
//! thread) drains outcomes, accounts progress, and on the first error cancels
//! the shared token so transfers still in flight abort.

use super::progress::{percent, ReconcileProgress};
use crate::control::CancelToken;
use crate::error::{Error, Result, TransportError};
use crate::fs::Filesystem;
use crate::transport::Fetcher;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;

/// One file to fetch.
#[derive(Debug, Clone)]
pub(super) struct DownloadTask {
    pub path: String,
    pub url: String,
    pub dest: PathBuf,
    /// Size the manifest announces, used for percentage accounting.
    pub expected_size: u64,
}

type TaskResult = (String, Result<u64>);

/// Bytes and files transferred by a successful pool run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct PoolTotals {
    pub files: usize,
    pub bytes: u64,
}

/// Run every task with at most `max_workers` concurrent downloads.
pub(super) fn run_downloads(
    fs: Arc<dyn Filesystem>,
    fetcher: Arc<dyn Fetcher>,
    tasks: Vec<DownloadTask>,
    max_workers: usize,
    token: &CancelToken,
    progress_tx: Option<&UnboundedSender<ReconcileProgress>>,
) -> Result<PoolTotals> {
    let count = tasks.len();
    let bytes_total: u64 = tasks.iter().map(|t| t.expected_size).sum();
    let work: Arc<Mutex<VecDeque<DownloadTask>>> = Arc::new(Mutex::new(tasks.into()));
    let (tx, rx) = mpsc::channel::<TaskResult>();
    let num_workers = max_workers.max(1).min(count.max(1));
    // Set by the first failing worker; `token` stays reserved for the caller.
    let failed = Arc::new(AtomicBool::new(false));
    let mut handles = Vec::with_capacity(num_workers);
    for _ in 0..num_workers {
        let work = Arc::clone(&work);
        let tx = tx.clone();
        let fs = Arc::clone(&fs);
        let fetcher = Arc::clone(&fetcher);
        let token = token.clone();
        let failed = Arc::clone(&failed);
        handles.push(std::thread::spawn(move || loop {
            let next = {
                let mut queue = work.lock().unwrap_or_else(|e| e.into_inner());
                if token.is_cancelled() || failed.load(Ordering::SeqCst) {
                    break;
                }
                queue.pop_front()
            };
            let Some(task) = next else {
                break;
            };
            let res = download_one(fs.as_ref(), fetcher.as_ref(), &task, &token);
            let is_err = res.is_err();
            if is_err {
                failed.store(true, Ordering::SeqCst);
            }
            if tx.send((task.path, res)).is_err() || is_err {
                break;
            }
        }));
    }
    drop(tx);

    let mut totals = PoolTotals::default();
    let mut first_error: Option<Error> = None;
    while totals.files < count {
        let (path, res) = match rx.recv() {
            Ok(pair) => pair,
            // Every worker exited early: the token was cancelled.
            Err(_) => break,
        };
        match res {
            Ok(bytes) => {
                totals.files += 1;
                totals.bytes += bytes;
                let pct = percent(totals.bytes, bytes_total);
                tracing::debug!(
                    path = %path,
                    size = %super::progress::human_size(bytes),
                    done = totals.files,
                    total = count,
                    percent = pct,
                    "downloaded"
                );
                if let Some(tx) = progress_tx {
                    let _ = tx.send(ReconcileProgress {
                        path,
                        bytes,
                        files_done: totals.files,
                        files_total: count,
                        bytes_done: totals.bytes,
                        bytes_total,
                        percent: pct,
                    });
                }
            }
            Err(e) => {
                let cancelled_by_caller = token.is_cancelled();
                token.cancel();
                tracing::warn!(path = %path, error = %e, "download failed; cancelling remaining");
                first_error = Some(if cancelled_by_caller {
                    Error::Cancelled
                } else {
                    e
                });
                break;
            }
        }
    }
    // Workers stop before their next task; wait so nothing writes after return.
    for h in handles {
        if let Err(e) = h.join() {
            if first_error.is_none() {
                first_error = Some(Error::Internal(format!("download worker panicked: {e:?}")));
            }
        }
    }
    if let Some(e) = first_error {
        return Err(e);
    }
    if totals.files < count {
        return Err(Error::Cancelled);
    }
    Ok(totals)
}

/// Fetch one file into `<dest>.part`, then rename over `dest`. A failed
/// download removes its partial file.
fn download_one(
    fs: &dyn Filesystem,
    fetcher: &dyn Fetcher,
    task: &DownloadTask,
    token: &CancelToken,
) -> Result<u64> {
    let part = part_path(&task.dest);
    let mut writer = fs
        .create(&part)
        .map_err(|e| Error::io(format!("create file {}", part.display()), e))?;
    let fetched = fetcher.fetch(&task.url, &mut *writer, token.flag());
    drop(writer);
    match fetched {
        Ok(bytes) => {
            fs.rename(&part, &task.dest).map_err(|e| {
                let _ = fs.remove_file(&part);
                Error::io(format!("rename into {}", task.dest.display()), e)
            })?;
            Ok(bytes)
        }
        Err(e) => {
            if let Err(rm) = fs.remove_file(&part) {
                tracing::debug!(path = %part.display(), error = %rm, "could not remove partial file");
            }
            Err(match e {
                TransportError::Aborted { .. } if token.is_cancelled() => Error::Cancelled,
                other => Error::Transport(other),
            })
        }
    }
}

fn part_path(dest: &std::path::Path) -> PathBuf {
    let mut name: OsString = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}
