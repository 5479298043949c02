//! Error taxonomy shared by the registry, verifier and reconciler.
//!
//! Per-path verification problems never surface here; they are recorded as
//! outcomes in the [`Report`](crate::verify::Report). These errors abort a
//! whole call.

use std::path::PathBuf;

/// Result alias used across the core crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Caller supplied an unusable argument (empty root, root is a file, bad URL).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(PathBuf),

    #[error("type mismatch: {0} is a directory")]
    TypeMismatch(PathBuf),

    #[error("integrity mismatch: {0}")]
    IntegrityMismatch(String),

    /// The run's cancellation token was set before the work finished.
    #[error("operation cancelled")]
    Cancelled,

    /// Manifest could not be parsed.
    #[error("malformed manifest: {0}")]
    Manifest(String),

    /// A missing file has no matching addition in the manifest.
    #[error("file {0} not found in manifest additions")]
    ManifestMismatch(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("reconciliation already in progress")]
    AlreadyInProgress,

    #[error("unknown baseline: {0}")]
    UnknownBaseline(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap an I/O error with a short description of what was attempted.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Error::Io {
            context: context.into(),
            source,
        }
    }
}

/// Failure of a single GET against the remote content store.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Curl reported an error (timeout, connection, abort by callback, ...).
    #[error("GET {url}: {source}")]
    Curl {
        url: String,
        #[source]
        source: curl::Error,
    },
    /// Server answered with something other than 200.
    #[error("GET {url} responded HTTP status code {code}")]
    Status { url: String, code: u32 },
    /// Writing the body to the destination failed.
    #[error("write {url}: {source}")]
    Write {
        url: String,
        #[source]
        source: std::io::Error,
    },
    /// Transfer was aborted because the shared token was set.
    #[error("GET {url} aborted")]
    Aborted { url: String },
}
