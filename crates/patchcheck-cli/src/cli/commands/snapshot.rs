//! `patchcheck snapshot`: record a directory as a JSON baseline.

use anyhow::Result;
use patchcheck_core::checksum::HashAlgorithm;
use patchcheck_core::registry;
use std::path::PathBuf;

pub async fn run_snapshot(
    dir: PathBuf,
    name: &str,
    out: Option<PathBuf>,
    exclude: Vec<String>,
    sha256: bool,
) -> Result<()> {
    let algorithm = if sha256 {
        HashAlgorithm::Sha256
    } else {
        HashAlgorithm::Md5
    };
    let out = out.unwrap_or_else(|| PathBuf::from(format!("{name}.json")));
    let count = {
        let name = name.to_string();
        let out = out.clone();
        tokio::task::spawn_blocking(move || -> Result<usize> {
            let baseline = registry::scan(&name, &dir, algorithm, &exclude)?;
            baseline.save_json(&out)?;
            Ok(baseline.len())
        })
        .await??
    };
    println!("Wrote {} entries to {}", count, out.display());
    Ok(())
}
