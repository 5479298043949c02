//! Filesystem seam used by the verifier and reconciler.
//!
//! Production code runs on [`LocalFs`]; tests can swap in [`MemoryFs`] to
//! exercise verification without touching disk.

mod local;
mod memory;

pub use local::LocalFs;
pub use memory::MemoryFs;

use std::io::{self, Read, Write};
use std::path::Path;

/// The subset of file metadata verification needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub is_dir: bool,
    pub len: u64,
}

/// Operations the core performs against a directory tree.
pub trait Filesystem: Send + Sync {
    fn stat(&self, path: &Path) -> io::Result<Metadata>;

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>>;

    /// Create or truncate `path` for writing. The parent must exist.
    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>>;

    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Move `from` over `to`, replacing any existing file.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn remove_file(&self, path: &Path) -> io::Result<()>;
}
