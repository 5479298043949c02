//! Remote content store access: one plain GET per file, no retry, no ranges.

mod curl_fetcher;

pub use curl_fetcher::CurlFetcher;

use crate::error::{Error, Result, TransportError};
use std::io::Write;
use std::sync::atomic::AtomicBool;

/// Streams the body of `url` into `sink`.
///
/// Implementations must return [`TransportError::Aborted`] once `abort` is
/// observed set, and treat any status other than 200 as an error.
pub trait Fetcher: Send + Sync {
    fn fetch(
        &self,
        url: &str,
        sink: &mut dyn Write,
        abort: &AtomicBool,
    ) -> std::result::Result<u64, TransportError>;
}

/// Check that a download base URL is an absolute http(s) URL.
pub fn validate_base_url(base: &str) -> Result<url::Url> {
    let parsed = url::Url::parse(base)
        .map_err(|e| Error::InvalidInput(format!("download base URL {base:?}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(Error::InvalidInput(format!(
            "download base URL {base:?}: unsupported scheme {other}"
        ))),
    }
}
