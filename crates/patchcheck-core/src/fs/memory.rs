//! In-memory [`Filesystem`] for tests and dry runs.

use super::{Filesystem, Metadata};
use std::collections::BTreeMap;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Arc<Mutex<Vec<u8>>>),
}

/// A tree of directories and byte buffers keyed by absolute path.
#[derive(Debug, Default, Clone)]
pub struct MemoryFs {
    nodes: Arc<Mutex<BTreeMap<PathBuf, Node>>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a file, creating its parent directories.
    pub fn add_file(&self, path: impl AsRef<Path>, contents: impl Into<Vec<u8>>) {
        let path = path.as_ref();
        let mut nodes = lock(&self.nodes);
        if let Some(parent) = path.parent() {
            insert_dirs(&mut nodes, parent);
        }
        nodes.insert(
            path.to_path_buf(),
            Node::File(Arc::new(Mutex::new(contents.into()))),
        );
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        insert_dirs(&mut lock(&self.nodes), path.as_ref());
    }

    /// Contents of a file, if present.
    pub fn read(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match lock(&self.nodes).get(path.as_ref()) {
            Some(Node::File(buf)) => Some(lock(buf).clone()),
            _ => None,
        }
    }

    pub fn exists(&self, path: impl AsRef<Path>) -> bool {
        lock(&self.nodes).contains_key(path.as_ref())
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn insert_dirs(nodes: &mut BTreeMap<PathBuf, Node>, dir: &Path) {
    for ancestor in dir.ancestors() {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        nodes.entry(ancestor.to_path_buf()).or_insert(Node::Dir);
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{}: no such file or directory", path.display()),
    )
}

struct MemoryWriter(Arc<Mutex<Vec<u8>>>);

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        lock(&self.0).extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Filesystem for MemoryFs {
    fn stat(&self, path: &Path) -> io::Result<Metadata> {
        match lock(&self.nodes).get(path) {
            Some(Node::Dir) => Ok(Metadata {
                is_dir: true,
                len: 0,
            }),
            Some(Node::File(buf)) => Ok(Metadata {
                is_dir: false,
                len: lock(buf).len() as u64,
            }),
            None => Err(not_found(path)),
        }
    }

    fn open_read(&self, path: &Path) -> io::Result<Box<dyn Read + Send>> {
        match lock(&self.nodes).get(path) {
            Some(Node::File(buf)) => Ok(Box::new(Cursor::new(lock(buf).clone()))),
            Some(Node::Dir) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{}: is a directory", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }

    fn create(&self, path: &Path) -> io::Result<Box<dyn Write + Send>> {
        let mut nodes = lock(&self.nodes);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            match nodes.get(parent) {
                Some(Node::Dir) => {}
                _ => return Err(not_found(parent)),
            }
        }
        if let Some(Node::Dir) = nodes.get(path) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{}: is a directory", path.display()),
            ));
        }
        let buf = Arc::new(Mutex::new(Vec::new()));
        nodes.insert(path.to_path_buf(), Node::File(Arc::clone(&buf)));
        Ok(Box::new(MemoryWriter(buf)))
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let mut nodes = lock(&self.nodes);
        for ancestor in path.ancestors() {
            if let Some(Node::File(_)) = nodes.get(ancestor) {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{}: is a file", ancestor.display()),
                ));
            }
        }
        insert_dirs(&mut nodes, path);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut nodes = lock(&self.nodes);
        let node = nodes.remove(from).ok_or_else(|| not_found(from))?;
        nodes.insert(to.to_path_buf(), node);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        let mut nodes = lock(&self.nodes);
        match nodes.get(path) {
            Some(Node::File(_)) => {
                nodes.remove(path);
                Ok(())
            }
            Some(Node::Dir) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{}: is a directory", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }
}
