//! CLI for patchcheck.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use patchcheck_core::config;
use patchcheck_core::registry::OVERLAY;
use std::path::PathBuf;

use commands::{run_checksum, run_patch, run_snapshot, run_verify};

/// Top-level CLI for patchcheck.
#[derive(Debug, Parser)]
#[command(name = "patchcheck")]
#[command(about = "patchcheck: verify a file tree against baselines and patch missing files", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Verify a directory against a baseline.
    Verify {
        /// Root directory to verify.
        dir: PathBuf,
        /// Baseline to verify against.
        #[arg(long, default_value = OVERLAY)]
        baseline: String,
        /// Manifest file installed as the overlay before verifying.
        #[arg(long, value_name = "FILE")]
        manifest: Option<PathBuf>,
        /// Resolve against the chosen baseline only.
        #[arg(long)]
        limited: bool,
        /// Skip these baselines during resolution (repeatable).
        #[arg(long, value_name = "NAME")]
        exclude: Vec<String>,
    },

    /// Fetch the manifest from a patch server and download missing files.
    Patch {
        /// Root directory to patch.
        dir: PathBuf,
        /// Patch server base URL the manifest is fetched from.
        #[arg(long)]
        url: String,
        /// Directory holding a local manifest that overrides the remote one
        /// (default: the current directory).
        #[arg(long, value_name = "DIR")]
        manifest_dir: Option<PathBuf>,
    },

    /// Hash every file under a directory into a JSON baseline.
    Snapshot {
        /// Root directory to scan.
        dir: PathBuf,
        /// Baseline name recorded in the file.
        #[arg(long)]
        name: String,
        /// Output file (default: `<name>.json` in the current directory).
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Skip paths containing this substring (repeatable).
        #[arg(long, value_name = "PATTERN")]
        exclude: Vec<String>,
        /// Record SHA-256 digests instead of MD5.
        #[arg(long)]
        sha256: bool,
    },

    /// Print the digest of a file.
    Checksum {
        /// Path to the file.
        path: PathBuf,
        /// SHA-256 instead of MD5.
        #[arg(long)]
        sha256: bool,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Verify {
                dir,
                baseline,
                manifest,
                limited,
                exclude,
            } => {
                let opts = commands::VerifyArgs {
                    baseline,
                    manifest,
                    limited,
                    exclude,
                };
                run_verify(&cfg, dir, opts).await?
            }
            CliCommand::Patch {
                dir,
                url,
                manifest_dir,
            } => run_patch(&cfg, dir, &url, manifest_dir).await?,
            CliCommand::Snapshot {
                dir,
                name,
                out,
                exclude,
                sha256,
            } => run_snapshot(dir, &name, out, exclude, sha256).await?,
            CliCommand::Checksum { path, sha256 } => run_checksum(path, sha256).await?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
