//! Patch manifests: the add/delete file list published next to the content
//! store, turned into the registry's overlay baseline.

use crate::error::{Error, Result};
use crate::registry::{is_confined, normalize_path, Baseline, Entry};
use crate::transport::Fetcher;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::sync::atomic::AtomicBool;

/// Default manifest file name looked up under the download base URL.
pub const DEFAULT_MANIFEST_NAME: &str = "filelist.yml";

/// One file listed in a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    #[serde(default, alias = "md5")]
    pub hash: String,
    #[serde(default)]
    pub size: u64,
}

/// Parsed manifest. Field aliases accept the older `downloadprefix` /
/// `deletes` / `downloads` / `md5` spelling; unknown keys are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default, deserialize_with = "scalar_string")]
    pub version: String,
    #[serde(
        default,
        alias = "downloadprefix",
        alias = "downloadBaseURL",
        alias = "download_prefix"
    )]
    pub download_base_url: String,
    #[serde(default, alias = "deletes")]
    pub deletions: Vec<FileDescriptor>,
    #[serde(default, alias = "downloads")]
    pub additions: Vec<FileDescriptor>,
}

fn scalar_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Int(i64),
        Float(f64),
    }
    Ok(match Option::<Scalar>::deserialize(d)? {
        Some(Scalar::Text(s)) => s,
        Some(Scalar::Int(i)) => i.to_string(),
        Some(Scalar::Float(f)) => f.to_string(),
        None => String::new(),
    })
}

impl Manifest {
    /// Parse YAML (or JSON) manifest bytes.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.iter().all(u8::is_ascii_whitespace) {
            return Err(Error::Manifest("empty document".into()));
        }
        let manifest: Manifest =
            serde_yaml::from_slice(data).map_err(|e| Error::Manifest(e.to_string()))?;
        for file in manifest.deletions.iter().chain(&manifest.additions) {
            let path = normalize_path(&file.name);
            if path.is_empty() {
                return Err(Error::Manifest(format!(
                    "entry with empty name (hash {:?})",
                    file.hash
                )));
            }
            if !is_confined(&path) {
                return Err(Error::Manifest(format!(
                    "entry {:?} escapes the install directory",
                    file.name
                )));
            }
        }
        Ok(manifest)
    }

    /// Addition whose normalized name equals `path`.
    pub fn addition(&self, path: &str) -> Option<&FileDescriptor> {
        self.additions
            .iter()
            .find(|f| normalize_path(&f.name) == path)
    }

    /// Build the overlay baseline: additions as expected files, then
    /// deletions, which win over an addition of the same name.
    pub fn to_baseline(&self, name: &str) -> Baseline {
        let additions = self
            .additions
            .iter()
            .map(|f| Entry::new(&f.name, f.hash.clone(), f.size));
        let deletions = self.deletions.iter().map(|f| Entry::deleted(&f.name));
        Baseline::from_entries(name, additions.chain(deletions))
    }

    /// Download URL for a relative path under `download_base_url`.
    pub fn url_for(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.download_base_url.trim_end_matches('/'),
            normalize_path(path)
        )
    }

    /// Sum of the sizes of the given additions.
    pub fn total_size<'a, I>(files: I) -> u64
    where
        I: IntoIterator<Item = &'a FileDescriptor>,
    {
        files.into_iter().map(|f| f.size).sum()
    }
}

/// Fetch a manifest. A file called `name` inside `override_dir` wins over
/// the remote copy at `{base_url}/{name}`.
pub fn fetch(
    fetcher: &dyn Fetcher,
    base_url: &str,
    name: &str,
    override_dir: Option<&Path>,
) -> Result<Manifest> {
    if let Some(dir) = override_dir {
        let local = dir.join(name);
        if local.is_file() {
            tracing::info!(path = %local.display(), "using local manifest override");
            let data = std::fs::read(&local)
                .map_err(|e| Error::io(format!("read {}", local.display()), e))?;
            return Manifest::parse(&data);
        }
    }
    let url = format!("{}/{}", base_url.trim_end_matches('/'), name);
    let mut body = Vec::new();
    let never = AtomicBool::new(false);
    fetcher.fetch(&url, &mut body, &never)?;
    tracing::debug!(url = %url, bytes = body.len(), "fetched manifest");
    Manifest::parse(&body)
}
