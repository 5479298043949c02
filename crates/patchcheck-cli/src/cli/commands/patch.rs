//! `patchcheck patch`: fetch the manifest and download whatever is missing.

use anyhow::{Context, Result};
use patchcheck_core::config::PatchConfig;
use patchcheck_core::fs::LocalFs;
use patchcheck_core::manifest;
use patchcheck_core::reconcile::{human_size, ReconcileProgress, Reconciler};
use patchcheck_core::transport;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn run_patch(
    cfg: &PatchConfig,
    dir: PathBuf,
    url: &str,
    manifest_dir: Option<PathBuf>,
) -> Result<()> {
    transport::validate_base_url(url)?;
    let fetcher = cfg.fetcher();
    let override_dir = manifest_dir.or_else(|| std::env::current_dir().ok());
    let mut manifest = {
        let remote = url.to_string();
        let name = cfg.manifest_name.clone();
        tokio::task::spawn_blocking(move || {
            manifest::fetch(&fetcher, &remote, &name, override_dir.as_deref())
        })
        .await?
        .with_context(|| format!("fetch manifest from {url}"))?
    };
    if manifest.download_base_url.trim().is_empty() {
        manifest.download_base_url = url.to_string();
    }
    println!(
        "Manifest {}: {} files, {} deletions",
        manifest.version,
        manifest.additions.len(),
        manifest.deletions.len()
    );

    let registry = Arc::new(cfg.build_registry()?);
    let reconciler = Reconciler::with_options(
        registry,
        Arc::new(LocalFs),
        Arc::new(fetcher),
        cfg.reconcile_options(),
    );

    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel::<ReconcileProgress>();
    let progress_handle = tokio::spawn(async move {
        while let Some(p) = progress_rx.recv().await {
            println!(
                "  [{:>3}%] {}/{} {} ({})",
                p.percent,
                p.files_done,
                p.files_total,
                p.path,
                human_size(p.bytes)
            );
        }
    });

    let summary = tokio::task::spawn_blocking(move || {
        reconciler.reconcile(&manifest, &dir, Some(&progress_tx))
    })
    .await??;
    let _ = progress_handle.await;

    println!("{}", summary.report);
    if summary.files_downloaded == 0 {
        println!("Up to date.");
    } else {
        println!(
            "Downloaded {} files ({}).",
            summary.files_downloaded,
            human_size(summary.bytes_downloaded)
        );
    }
    Ok(())
}
