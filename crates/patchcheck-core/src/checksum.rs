//! Content hashing for verification and baseline snapshots.
//!
//! Hashing is only done when sizes disagree or a snapshot is requested, so it
//! stays off the common verification path.

use anyhow::{Context, Result};
use md5::Md5;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Digest algorithm of an expected content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// Patch manifests carry MD5 digests.
    #[default]
    Md5,
    Sha256,
}

impl HashAlgorithm {
    /// Infer the algorithm from a hex digest's length. Unknown lengths fall
    /// back to MD5 so the comparison fails visibly instead of being skipped.
    pub fn for_digest(hex_digest: &str) -> Self {
        match hex_digest.trim().len() {
            64 => HashAlgorithm::Sha256,
            _ => HashAlgorithm::Md5,
        }
    }
}

/// Hash everything `reader` yields and return the digest as lowercase hex.
pub fn hash_reader<R: Read>(reader: R, algorithm: HashAlgorithm) -> io::Result<String> {
    match algorithm {
        HashAlgorithm::Md5 => digest_reader::<Md5, R>(reader),
        HashAlgorithm::Sha256 => digest_reader::<Sha256, R>(reader),
    }
}

fn digest_reader<D: Digest, R: Read>(mut reader: R) -> io::Result<String> {
    let mut hasher = D::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Hash a file on disk in chunks; suitable for large files.
pub fn hash_path(path: &Path, algorithm: HashAlgorithm) -> Result<String> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    hash_reader(f, algorithm).with_context(|| format!("read {}", path.display()))
}

/// Compare two hex digests ignoring case and surrounding whitespace.
pub fn digests_match(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
