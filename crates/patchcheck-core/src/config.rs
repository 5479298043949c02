use crate::manifest::DEFAULT_MANIFEST_NAME;
use crate::reconcile::ReconcileOptions;
use crate::registry::{self, ChecksumRegistry};
use crate::transport::CurlFetcher;
use crate::verify::VerifyOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// A named JSON baseline file to load at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineSource {
    pub name: String,
    pub path: PathBuf,
}

/// Global configuration loaded from `~/.config/patchcheck/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    /// Worker threads hashing files during verification.
    pub verify_workers: usize,
    /// Concurrent downloads during reconciliation.
    pub download_workers: usize,
    /// Manifest file name fetched from the patch server.
    pub manifest_name: String,
    pub connect_timeout_secs: u64,
    /// Resolve against the target baseline only, ignoring the overlay and
    /// every secondary baseline.
    pub limited: bool,
    /// Baseline names skipped during resolution.
    pub exclude: Vec<String>,
    /// Secondary baselines, highest precedence first.
    pub baselines: Vec<BaselineSource>,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            verify_workers: 32,
            download_workers: 100,
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            connect_timeout_secs: 30,
            limited: false,
            exclude: Vec::new(),
            baselines: Vec::new(),
        }
    }
}

impl PatchConfig {
    pub fn verify_options(&self) -> VerifyOptions {
        VerifyOptions {
            workers: self.verify_workers.max(1),
        }
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            workers: self.download_workers.max(1),
            verify: self.verify_options(),
        }
    }

    pub fn fetcher(&self) -> CurlFetcher {
        CurlFetcher::new(Duration::from_secs(self.connect_timeout_secs))
    }

    /// Build a registry from the configured baseline files, in order, with
    /// the configured exclusions and limited mode applied.
    pub fn build_registry(&self) -> Result<ChecksumRegistry> {
        let reg = ChecksumRegistry::new();
        for source in &self.baselines {
            let mut baseline = registry::load_json(&source.path)
                .with_context(|| format!("load baseline {}", source.name))?;
            if baseline.name() != source.name {
                baseline = registry::Baseline::from_entries(
                    source.name.clone(),
                    baseline.iter().cloned().collect::<Vec<_>>(),
                );
            }
            tracing::debug!(
                baseline = %source.name,
                entries = baseline.len(),
                "loaded baseline"
            );
            reg.insert_baseline(baseline);
        }
        reg.exclude_baselines(&self.exclude);
        reg.set_limited(self.limited);
        Ok(reg)
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("patchcheck")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<PatchConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = PatchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(&path)?;
    let cfg: PatchConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
