//! Reconciler tests against an in-memory tree and a fake content store.

use super::*;
use crate::checksum::{hash_reader, HashAlgorithm};
use crate::error::TransportError;
use crate::fs::MemoryFs;
use crate::registry::Entry;
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc as std_mpsc;
use std::time::Duration;

const ROOT: &str = "/bundle";
const BASE: &str = "http://store.test/patch";

/// Serves bodies keyed by path under `BASE`; anything else is a 404.
#[derive(Default)]
struct FakeStore {
    bodies: HashMap<String, Vec<u8>>,
    calls: AtomicUsize,
}

impl FakeStore {
    fn with(files: &[(&str, &[u8])]) -> Self {
        Self {
            bodies: files
                .iter()
                .map(|(p, b)| (format!("{BASE}/{p}"), b.to_vec()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Fetcher for FakeStore {
    fn fetch(
        &self,
        url: &str,
        sink: &mut dyn Write,
        _abort: &AtomicBool,
    ) -> std::result::Result<u64, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.bodies.get(url) {
            Some(body) => {
                sink.write_all(body).unwrap();
                Ok(body.len() as u64)
            }
            None => Err(TransportError::Status {
                url: url.to_string(),
                code: 404,
            }),
        }
    }
}

/// Blocks every fetch until released (or aborted), announcing each start.
struct Gate {
    started: Mutex<std_mpsc::Sender<()>>,
    release: AtomicBool,
}

impl Fetcher for Gate {
    fn fetch(
        &self,
        url: &str,
        sink: &mut dyn Write,
        abort: &AtomicBool,
    ) -> std::result::Result<u64, TransportError> {
        let _ = self.started.lock().unwrap().send(());
        loop {
            if abort.load(Ordering::Relaxed) {
                return Err(TransportError::Aborted {
                    url: url.to_string(),
                });
            }
            if self.release.load(Ordering::Relaxed) {
                sink.write_all(b"ok").unwrap();
                return Ok(2);
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}

fn md5(data: &[u8]) -> String {
    hash_reader(data, HashAlgorithm::Md5).unwrap()
}

fn manifest(files: &[(&str, &[u8])]) -> Manifest {
    Manifest {
        version: "1".into(),
        download_base_url: format!("{BASE}/"),
        deletions: vec![FileDescriptor {
            name: "old.dll".into(),
            hash: "DELETE".into(),
            size: 0,
        }],
        additions: files
            .iter()
            .map(|(name, body)| FileDescriptor {
                name: name.to_string(),
                hash: md5(body),
                size: body.len() as u64,
            })
            .collect(),
    }
}

fn setup(
    fetcher: Arc<dyn Fetcher>,
    workers: usize,
) -> (MemoryFs, Arc<ChecksumRegistry>, Reconciler) {
    let fs = MemoryFs::new();
    fs.add_dir(ROOT);
    let registry = Arc::new(ChecksumRegistry::new());
    registry.load_baseline("rof2", vec![Entry::new("unrelated.txt", md5(b"u"), 1)]);
    let reconciler = Reconciler::with_options(
        Arc::clone(&registry),
        Arc::new(fs.clone()),
        fetcher,
        ReconcileOptions {
            workers,
            verify: VerifyOptions { workers: 4 },
        },
    );
    (fs, registry, reconciler)
}

#[test]
fn scenario_c_downloads_missing_file() {
    let body = vec![7u8; 100];
    let store = Arc::new(FakeStore::with(&[("c.dat", &body)]));
    let (fs, registry, reconciler) = setup(store.clone(), 8);
    let m = manifest(&[("c.dat", &body)]);

    let summary = reconciler.reconcile(&m, Path::new(ROOT), None).unwrap();
    assert_eq!(summary.files_downloaded, 1);
    assert_eq!(summary.bytes_downloaded, 100);
    assert_eq!(summary.report.failures()[0].path, "c.dat");
    assert_eq!(summary.report.failures()[0].kind, OutcomeKind::NotFound);
    assert_eq!(fs.read("/bundle/c.dat").unwrap().len(), 100);
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);

    // Secondary baselines were excluded for this run only.
    assert!(registry.excluded().is_empty());
    assert_eq!(summary.report.total(), 2);
}

#[test]
fn up_to_date_tree_makes_no_network_calls() {
    let store = Arc::new(FakeStore::default());
    let (fs, _registry, reconciler) = setup(store.clone(), 8);
    fs.add_file("/bundle/a.txt", &b"aaa"[..]);
    let m = manifest(&[("a.txt", b"aaa")]);

    let summary = reconciler.reconcile(&m, Path::new(ROOT), None).unwrap();
    assert_eq!(summary.files_downloaded, 0);
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    assert!(!reconciler.is_running());
}

#[test]
fn creates_nested_directories_and_normalizes_names() {
    let store = Arc::new(FakeStore::with(&[("Resources/BaseData.txt", b"base")]));
    let (fs, _registry, reconciler) = setup(store, 8);
    let m = manifest(&[("Resources\\BaseData.txt", b"base")]);

    reconciler.reconcile(&m, Path::new(ROOT), None).unwrap();
    assert_eq!(fs.read("/bundle/Resources/BaseData.txt").unwrap(), b"base");
}

#[test]
fn first_failure_aborts_remaining_downloads() {
    // Only b.txt and c.txt exist remotely; a.txt sorts first and 404s.
    let store = Arc::new(FakeStore::with(&[("b.txt", b"b"), ("c.txt", b"c")]));
    let (fs, _registry, reconciler) = setup(store.clone(), 1);
    let m = manifest(&[("a.txt", b"a"), ("b.txt", b"b"), ("c.txt", b"c")]);

    let err = reconciler.reconcile(&m, Path::new(ROOT), None).unwrap_err();
    assert!(
        matches!(err, Error::Transport(TransportError::Status { code: 404, .. })),
        "{err}"
    );
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    assert!(!fs.exists("/bundle/a.txt"));
    assert!(!fs.exists("/bundle/a.txt.part"));
    assert!(!fs.exists("/bundle/b.txt"));
    assert!(!fs.exists("/bundle/c.txt"));
    assert!(!reconciler.is_running());
}

#[test]
fn entry_leaving_the_root_is_never_written() {
    let store = Arc::new(FakeStore::with(&[("../escape.txt", b"x")]));
    let (fs, _registry, reconciler) = setup(store.clone(), 4);
    let m = manifest(&[("../escape.txt", b"x")]);

    let err = reconciler.reconcile(&m, Path::new(ROOT), None).unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)), "{err}");
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    assert!(!fs.exists("/bundle/../escape.txt"));
    assert!(!fs.exists("/escape.txt"));
    assert!(!reconciler.is_running());
}

#[test]
fn hash_mismatch_is_not_redownloaded() {
    let store = Arc::new(FakeStore::with(&[("a.txt", b"good")]));
    let (fs, _registry, reconciler) = setup(store.clone(), 8);
    fs.add_file("/bundle/a.txt", &b"corrupted!"[..]);
    let m = manifest(&[("a.txt", b"good")]);

    let summary = reconciler.reconcile(&m, Path::new(ROOT), None).unwrap();
    assert_eq!(summary.files_downloaded, 0);
    assert_eq!(summary.report.fail_count(), 1);
    assert_eq!(
        summary.report.failures()[0].kind,
        OutcomeKind::IntegrityMismatch
    );
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn progress_events_one_per_file() {
    let files: Vec<(String, Vec<u8>)> = (0..10)
        .map(|i| (format!("f{i}.bin"), vec![i as u8; 10]))
        .collect();
    let refs: Vec<(&str, &[u8])> = files
        .iter()
        .map(|(n, b)| (n.as_str(), b.as_slice()))
        .collect();
    let store = Arc::new(FakeStore::with(&refs));
    let (_fs, _registry, reconciler) = setup(store, 3);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

    reconciler
        .reconcile(&manifest(&refs), Path::new(ROOT), Some(&tx))
        .unwrap();
    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        events.push(ev);
    }
    assert_eq!(events.len(), 10);
    assert!(events.windows(2).all(|w| w[0].percent <= w[1].percent));
    let last = events.last().unwrap();
    assert_eq!((last.files_done, last.bytes_done, last.percent), (10, 100, 100));
}

#[test]
fn invalid_base_url_fails_before_any_download() {
    let store = Arc::new(FakeStore::default());
    let (_fs, _registry, reconciler) = setup(store.clone(), 8);
    let mut m = manifest(&[("a.txt", b"a")]);
    m.download_base_url = "not a url".into();
    assert!(matches!(
        reconciler.reconcile(&m, Path::new(ROOT), None),
        Err(Error::InvalidInput(_))
    ));
    assert_eq!(store.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn missing_root_is_invalid_input_and_clears_flight() {
    let (_fs, _registry, reconciler) = setup(Arc::new(FakeStore::default()), 8);
    let m = manifest(&[("a.txt", b"a")]);
    assert!(matches!(
        reconciler.reconcile(&m, Path::new("/elsewhere"), None),
        Err(Error::InvalidInput(_))
    ));
    assert!(!reconciler.is_running());
}

#[test]
fn scenario_d_concurrent_call_is_rejected() {
    let (started_tx, started_rx) = std_mpsc::channel();
    let gate = Arc::new(Gate {
        started: Mutex::new(started_tx),
        release: AtomicBool::new(false),
    });
    let (_fs, _registry, reconciler) = setup(gate.clone(), 4);
    let reconciler = Arc::new(reconciler);
    let m = manifest(&[("slow.bin", b"ok")]);

    let first = {
        let reconciler = Arc::clone(&reconciler);
        let m = m.clone();
        std::thread::spawn(move || reconciler.reconcile(&m, Path::new(ROOT), None))
    };
    started_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    assert!(reconciler.is_running());
    assert!(matches!(
        reconciler.reconcile(&m, Path::new(ROOT), None),
        Err(Error::AlreadyInProgress)
    ));

    gate.release.store(true, Ordering::Relaxed);
    let summary = first.join().unwrap().unwrap();
    assert_eq!(summary.files_downloaded, 1);
    assert!(!reconciler.is_running());
}

#[test]
fn close_cancels_in_flight_reconciliation() {
    let (started_tx, started_rx) = std_mpsc::channel();
    let gate = Arc::new(Gate {
        started: Mutex::new(started_tx),
        release: AtomicBool::new(false),
    });
    let (fs, _registry, reconciler) = setup(gate, 2);
    let reconciler = Arc::new(reconciler);
    let m = manifest(&[("a.bin", b"ok"), ("b.bin", b"ok"), ("c.bin", b"ok")]);

    let run = {
        let reconciler = Arc::clone(&reconciler);
        std::thread::spawn(move || reconciler.reconcile(&m, Path::new(ROOT), None))
    };
    started_rx.recv_timeout(Duration::from_secs(10)).unwrap();
    reconciler.close();
    let err = run.join().unwrap().unwrap_err();
    assert!(matches!(err, Error::Cancelled), "{err}");
    assert!(!fs.exists("/bundle/a.bin"));
    assert!(!reconciler.is_running());
}
