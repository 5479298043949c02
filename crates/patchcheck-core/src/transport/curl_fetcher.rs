//! [`Fetcher`] over a libcurl Easy handle.

use super::Fetcher;
use crate::error::TransportError;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Blocking curl GET. One handle per call, so a single fetcher can be shared
/// across worker threads.
#[derive(Debug, Clone, Copy)]
pub struct CurlFetcher {
    pub connect_timeout: Duration,
}

impl Default for CurlFetcher {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl CurlFetcher {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Fetcher for CurlFetcher {
    fn fetch(
        &self,
        url: &str,
        sink: &mut dyn Write,
        abort: &AtomicBool,
    ) -> Result<u64, TransportError> {
        let curl_err = |source| TransportError::Curl {
            url: url.to_string(),
            source,
        };
        if abort.load(Ordering::Relaxed) {
            return Err(TransportError::Aborted {
                url: url.to_string(),
            });
        }

        let mut easy = curl::easy::Easy::new();
        easy.url(url).map_err(curl_err)?;
        easy.follow_location(true).map_err(curl_err)?;
        easy.max_redirections(10).map_err(curl_err)?;
        easy.connect_timeout(self.connect_timeout).map_err(curl_err)?;
        // Abort if throughput drops below 1 KiB/s for 60s instead of a wall-clock cap.
        easy.low_speed_limit(1024).map_err(curl_err)?;
        easy.low_speed_time(Duration::from_secs(60))
            .map_err(curl_err)?;
        easy.progress(true).map_err(curl_err)?;

        let mut written = 0u64;
        let mut write_error: Option<io::Error> = None;
        let performed = {
            let mut transfer = easy.transfer();
            transfer
                .write_function(|data| match sink.write_all(data) {
                    Ok(()) => {
                        written += data.len() as u64;
                        Ok(data.len())
                    }
                    Err(e) => {
                        write_error = Some(e);
                        Ok(0) // abort transfer
                    }
                })
                .map_err(curl_err)?;
            transfer
                .progress_function(|_, _, _, _| !abort.load(Ordering::Relaxed))
                .map_err(curl_err)?;
            transfer.perform()
        };

        if let Err(e) = performed {
            if e.is_aborted_by_callback() || abort.load(Ordering::Relaxed) {
                return Err(TransportError::Aborted {
                    url: url.to_string(),
                });
            }
            if let Some(source) = write_error {
                return Err(TransportError::Write {
                    url: url.to_string(),
                    source,
                });
            }
            return Err(curl_err(e));
        }

        let code = easy.response_code().map_err(curl_err)?;
        if code != 200 {
            return Err(TransportError::Status {
                url: url.to_string(),
                code,
            });
        }
        sink.flush().map_err(|source| TransportError::Write {
            url: url.to_string(),
            source,
        })?;
        Ok(written)
    }
}
