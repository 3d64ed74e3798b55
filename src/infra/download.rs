//! Archive download
//!
//! Streams a single HTTP GET into a file while hashing it, with retry and
//! exponential backoff for transient failures.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::config::defaults;
use crate::error::DownloadError;

/// Progress callback type for download progress reporting
pub type ProgressCallback = Box<dyn Fn(u64, u64) + Send + Sync>;

/// Upper bound for a single backoff delay
const MAX_BACKOFF_MS: u64 = 30_000;

/// A completed download
#[derive(Debug)]
pub struct Downloaded {
    /// Where the body was written
    pub path: PathBuf,
    /// Body size in bytes
    pub size: u64,
    /// Lowercase hex SHA256 of the body
    pub checksum: String,
}

/// Fetches archives with retry support
#[derive(Debug, Clone)]
pub struct DownloadManager {
    client: reqwest::Client,
    attempts: u32,
    base_delay_ms: u64,
}

impl DownloadManager {
    /// Create a download manager with the default retry policy
    pub fn new() -> Self {
        Self::with_config(
            defaults::MAX_DOWNLOAD_RETRIES,
            defaults::DOWNLOAD_RETRY_BASE_DELAY_MS,
        )
    }

    /// Create a download manager making at most `attempts` requests per
    /// download, waiting `base_delay_ms` (doubled each time) in between
    pub fn with_config(attempts: u32, base_delay_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(600))
            .connect_timeout(Duration::from_secs(30))
            .user_agent(concat!("prusti-setup/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            attempts: attempts.max(1),
            base_delay_ms,
        }
    }

    /// Download `url` to `dest`
    ///
    /// Client errors (HTTP 4xx), empty bodies and local IO errors end the
    /// download immediately. On failure nothing is left at `dest`.
    pub async fn download(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<ProgressCallback>,
    ) -> Result<Downloaded, DownloadError> {
        let mut failure = None;

        for attempt in 1..=self.attempts {
            if attempt > 1 {
                let delay = backoff_delay(self.base_delay_ms, attempt - 1);
                tracing::debug!("Retrying {url} in {}ms", delay.as_millis());
                tokio::time::sleep(delay).await;
            }

            match self.fetch(url, dest, progress.as_ref()).await {
                Ok(downloaded) => return Ok(downloaded),
                Err(e) if is_permanent(&e) => {
                    failure = Some(e);
                    break;
                }
                Err(e) => {
                    tracing::warn!("Download attempt {attempt}/{} failed: {e}", self.attempts);
                    failure = Some(e);
                }
            }
        }

        let _ = tokio::fs::remove_file(dest).await;
        Err(failure.unwrap_or_else(|| DownloadError::MaxRetriesExceeded {
            url: url.to_string(),
            retries: self.attempts,
        }))
    }

    /// Download `url` to `dest` and require its SHA256 to be `expected`
    ///
    /// The comparison ignores case; a mismatching file is deleted.
    pub async fn download_verified(
        &self,
        url: &str,
        dest: &Path,
        expected: &str,
        progress: Option<ProgressCallback>,
    ) -> Result<Downloaded, DownloadError> {
        let downloaded = self.download(url, dest, progress).await?;
        if downloaded.checksum.eq_ignore_ascii_case(expected) {
            return Ok(downloaded);
        }

        let _ = tokio::fs::remove_file(dest).await;
        Err(DownloadError::ChecksumFailed {
            file: dest.display().to_string(),
            expected: expected.to_ascii_lowercase(),
            actual: downloaded.checksum,
        })
    }

    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<&ProgressCallback>,
    ) -> Result<Downloaded, DownloadError> {
        let network = |e: reqwest::Error| DownloadError::NetworkError {
            url: url.to_string(),
            error: e.to_string(),
        };
        let io = |path: &Path, e: std::io::Error| DownloadError::IoError {
            path: path.to_path_buf(),
            error: e.to_string(),
        };

        let response = self.client.get(url).send().await.map_err(network)?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let total = response.content_length().unwrap_or(0);

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io(parent, e))?;
        }
        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| io(dest, e))?;

        let mut hasher = Sha256::new();
        let mut size: u64 = 0;
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(network)?;
            file.write_all(&chunk).await.map_err(|e| io(dest, e))?;
            hasher.update(&chunk);
            size += chunk.len() as u64;
            if let Some(report) = progress {
                report(size, total);
            }
        }
        file.flush().await.map_err(|e| io(dest, e))?;

        if size == 0 {
            return Err(DownloadError::EmptyBody {
                url: url.to_string(),
            });
        }

        Ok(Downloaded {
            path: dest.to_path_buf(),
            size,
            checksum: hex::encode(hasher.finalize()),
        })
    }
}

impl Default for DownloadManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Delay before retry number `retry` (1-based)
fn backoff_delay(base_ms: u64, retry: u32) -> Duration {
    let factor = 1u64.checked_shl(retry.saturating_sub(1)).unwrap_or(u64::MAX);
    Duration::from_millis(base_ms.saturating_mul(factor).min(MAX_BACKOFF_MS))
}

/// Errors that a retry cannot fix
fn is_permanent(error: &DownloadError) -> bool {
    match error {
        DownloadError::HttpStatus { status, .. } => (400..500).contains(status),
        DownloadError::EmptyBody { .. } | DownloadError::IoError { .. } => true,
        _ => false,
    }
}
