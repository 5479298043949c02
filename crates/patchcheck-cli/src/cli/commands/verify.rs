//! `patchcheck verify`: check a directory against a baseline and list failures.

use anyhow::{bail, Context, Result};
use patchcheck_core::config::PatchConfig;
use patchcheck_core::fs::LocalFs;
use patchcheck_core::verify::Verifier;
use std::path::PathBuf;
use std::sync::Arc;

/// Options of the `verify` subcommand beyond the directory.
#[derive(Debug, Clone)]
pub struct VerifyArgs {
    pub baseline: String,
    pub manifest: Option<PathBuf>,
    pub limited: bool,
    pub exclude: Vec<String>,
}

pub async fn run_verify(cfg: &PatchConfig, dir: PathBuf, args: VerifyArgs) -> Result<()> {
    let registry = cfg.build_registry()?;
    if args.limited {
        registry.set_limited(true);
    }
    registry.exclude_baselines(&args.exclude);
    if let Some(path) = &args.manifest {
        let data = std::fs::read(path).with_context(|| format!("read {}", path.display()))?;
        let manifest = registry.set_manifest_overlay(&data)?;
        tracing::info!(version = %manifest.version, "installed manifest overlay");
    }

    let verifier = Verifier::with_options(Arc::new(LocalFs), cfg.verify_options());
    let baseline = args.baseline.clone();
    let report = tokio::task::spawn_blocking(move || verifier.verify(&registry, &baseline, &dir))
        .await??;

    for failure in report.failures() {
        println!("FAIL [{}] {}", failure.baseline, failure);
    }
    println!("{}", report);
    if report.fail_count() > 0 {
        bail!("{} of {} files failed verification", report.fail_count(), report.total());
    }
    Ok(())
}
