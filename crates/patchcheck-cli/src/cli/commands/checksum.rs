//! `patchcheck checksum`: print the MD5 or SHA-256 of a file.

use anyhow::Result;
use patchcheck_core::checksum::{self, HashAlgorithm};
use std::path::PathBuf;

pub async fn run_checksum(path: PathBuf, sha256: bool) -> Result<()> {
    let algorithm = if sha256 {
        HashAlgorithm::Sha256
    } else {
        HashAlgorithm::Md5
    };
    let digest = {
        let path = path.clone();
        tokio::task::spawn_blocking(move || checksum::hash_path(&path, algorithm)).await??
    };
    println!("{}  {}", digest, path.display());
    Ok(())
}
