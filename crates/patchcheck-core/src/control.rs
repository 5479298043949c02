//! Cancellation tokens and the table of active runs.
//!
//! Every verify or reconcile call registers its own token; `close()` on the
//! owning component sets every registered token. Workers check the token
//! before starting blocking work and curl transfers poll it while running.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Shared cooperative cancellation flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Raw flag, for callbacks that only take `&AtomicBool`.
    pub fn flag(&self) -> &AtomicBool {
        &self.0
    }
}

/// Registry of run id -> token for one component instance.
#[derive(Debug, Default)]
pub struct RunControl {
    next_id: AtomicU64,
    runs: Mutex<HashMap<u64, CancelToken>>,
}

impl RunControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new run; the returned guard unregisters it when dropped.
    pub fn register(&self) -> RunGuard<'_> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancelToken::new();
        self.runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, token.clone());
        RunGuard {
            control: self,
            id,
            token,
        }
    }

    fn unregister(&self, id: u64) {
        self.runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    /// Cancel every active run. Safe to call repeatedly or with no run active.
    pub fn cancel_all(&self) {
        for token in self
            .runs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .values()
        {
            token.cancel();
        }
    }

    pub fn active(&self) -> usize {
        self.runs.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Keeps a run registered for its lifetime.
pub struct RunGuard<'a> {
    control: &'a RunControl,
    id: u64,
    token: CancelToken,
}

impl RunGuard<'_> {
    pub fn token(&self) -> &CancelToken {
        &self.token
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.control.unregister(self.id);
    }
}
