//! Background downloader: fetches, extracts and installs an arduino-cli
//! release.
//!
//! Runs on its own OS thread. The HTTP transfer is async (reqwest streaming)
//! and is driven by a current-thread runtime owned by the worker, so the
//! caller never needs a runtime of its own.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use super::error::ToolchainError;
use super::extractor::{extract_archive, make_executable};
use super::message::MessageSender;
use super::types::ArchiveFormat;

/// Topic of every message a download produces.
pub const DOWNLOAD_TOPIC: &str = "download";

/// Progress granularity when the server sends no Content-Length.
const UNKNOWN_SIZE_STEP_BYTES: u64 = 1024 * 1024;

/// Limit on establishing the connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Limit on any single read, so a stalled transfer fails instead of hanging.
const READ_TIMEOUT: Duration = Duration::from_secs(60);

// ============================================================================
// URL Security Validation
// ============================================================================

/// Hosts release archives may be fetched from.
const ALLOWED_DOMAINS: &[&str] = &["downloads.arduino.cc", "github.com"];

/// Validates that a URL is safe for downloading.
///
/// Checks:
/// - URL scheme must be HTTPS
/// - Host must be in the allowed domain list (subdomains included)
pub fn validate_url(url_str: &str) -> Result<()> {
    let url = Url::parse(url_str).with_context(|| format!("Invalid URL: {}", url_str))?;

    if url.scheme() != "https" {
        anyhow::bail!("URL must use HTTPS: {}", url_str);
    }

    let host = url
        .host_str()
        .ok_or_else(|| anyhow::anyhow!("URL must have a host: {}", url_str))?;

    let is_allowed = ALLOWED_DOMAINS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{}", domain)));

    if !is_allowed {
        anyhow::bail!(
            "Download domain not allowed: {}. Allowed: {:?}",
            host,
            ALLOWED_DOMAINS
        );
    }

    Ok(())
}

// ============================================================================
// Download Progress
// ============================================================================

/// Progress information during a download.
#[derive(Debug, Clone)]
pub struct DownloadProgress {
    pub bytes_downloaded: u64,
    /// Total bytes expected, if the server sent Content-Length.
    pub total_bytes: Option<u64>,
    /// 0.0 to 100.0, or None if the total is unknown.
    pub percent: Option<f32>,
}

impl DownloadProgress {
    fn new(bytes_downloaded: u64, total_bytes: Option<u64>) -> Self {
        let percent = total_bytes.map(|total| {
            if total > 0 {
                (bytes_downloaded as f32 / total as f32) * 100.0
            } else {
                0.0
            }
        });

        Self {
            bytes_downloaded,
            total_bytes,
            percent,
        }
    }
}

/// Throttles progress into info messages.
///
/// With a known size, reports each time the whole percentage advances by at
/// least `step`, and always reports 100%. Without one, reports every MiB.
#[derive(Debug)]
pub struct ProgressReporter<'a> {
    queue: &'a MessageSender,
    step: u8,
    last_percent: Option<u8>,
    last_bytes: u64,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(queue: &'a MessageSender, step: u8) -> Self {
        Self {
            queue,
            step: step.clamp(1, 100),
            last_percent: None,
            last_bytes: 0,
        }
    }

    pub fn report(&mut self, progress: &DownloadProgress) {
        match progress.percent {
            Some(percent) => {
                let percent = percent.clamp(0.0, 100.0) as u8;
                let due = match self.last_percent {
                    None => true,
                    Some(last) => {
                        percent >= last.saturating_add(self.step) || (percent == 100 && last < 100)
                    }
                };
                if due {
                    self.last_percent = Some(percent);
                    self.queue
                        .info(DOWNLOAD_TOPIC, format!("Downloaded {}%", percent));
                }
            }
            None => {
                if progress.bytes_downloaded >= self.last_bytes + UNKNOWN_SIZE_STEP_BYTES {
                    self.last_bytes = progress.bytes_downloaded;
                    self.queue.info(
                        DOWNLOAD_TOPIC,
                        format!(
                            "Downloaded {:.1} MiB",
                            progress.bytes_downloaded as f64 / UNKNOWN_SIZE_STEP_BYTES as f64
                        ),
                    );
                }
            }
        }
    }
}

// ============================================================================
// Download Function
// ============================================================================

/// Downloads a file from a URL with streaming and progress reporting.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Returns an error if:
/// - The URL is not HTTPS or from an allowed domain.
/// - The network request fails or stalls.
/// - The server returns a non-success status code.
/// - The file cannot be created or written.
pub async fn download_file<F>(url: &str, dest: &Path, progress_cb: F) -> Result<u64>
where
    F: FnMut(DownloadProgress),
{
    info!("Downloading {} to {}", url, dest.display());

    validate_url(url)?;

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let client = http_client(READ_TIMEOUT)?;
    fetch(&client, url, dest, progress_cb).await
}

fn http_client(read_timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(read_timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Streams `url` into `dest`. The URL is not validated here.
async fn fetch<F>(client: &reqwest::Client, url: &str, dest: &Path, mut progress_cb: F) -> Result<u64>
where
    F: FnMut(DownloadProgress),
{
    let response = client
        .get(url)
        .send()
        .await
        .with_context(|| format!("Failed to start download from {}", url))?;

    let status = response.status();
    if !status.is_success() {
        anyhow::bail!(
            "Download failed with status {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown error")
        );
    }

    let total_bytes = response.content_length();
    debug!("Content-Length: {:?}", total_bytes);

    let mut file = File::create(dest)
        .await
        .with_context(|| format!("Failed to create file: {}", dest.display()))?;

    let mut stream = response.bytes_stream();
    let mut bytes_downloaded: u64 = 0;

    progress_cb(DownloadProgress::new(0, total_bytes));

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.context("Failed to read chunk from response stream")?;

        file.write_all(&chunk)
            .await
            .context("Failed to write chunk to file")?;

        bytes_downloaded += chunk.len() as u64;
        progress_cb(DownloadProgress::new(bytes_downloaded, total_bytes));
    }

    file.flush().await.context("Failed to flush file")?;

    info!(
        "Download complete: {} bytes written to {}",
        bytes_downloaded,
        dest.display()
    );

    Ok(bytes_downloaded)
}

// ============================================================================
// Background Job
// ============================================================================

/// Everything one download-and-install needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub url: String,
    /// Directory each invocation creates its private staging directory in.
    pub staging_dir: PathBuf,
    /// File name the archive is saved under inside the staging directory.
    pub archive_name: String,
    /// Directory the archive is extracted into.
    pub install_dir: PathBuf,
    /// Path the executable must exist at after extraction.
    pub executable: PathBuf,
    pub format: ArchiveFormat,
    /// Minimum percentage between progress messages.
    pub progress_step: u8,
}

/// Runs `job` to completion, reporting through `queue`.
///
/// Blocks the calling thread until the archive is installed or a step fails.
pub fn run(job: DownloadJob, queue: MessageSender) {
    let result = install(&job, &queue);
    report(&job, result, queue);
}

fn report(job: &DownloadJob, result: Result<(), ToolchainError>, queue: MessageSender) {
    match result {
        Ok(()) => {
            info!("arduino-cli installed at {}", job.executable.display());
            queue.finish_success(
                DOWNLOAD_TOPIC,
                format!("arduino-cli installed at {}", job.executable.display()),
            );
        }
        Err(e) => {
            warn!("arduino-cli installation failed: {}", e);
            queue.finish_error(DOWNLOAD_TOPIC, e.to_string());
        }
    }
}

fn install(job: &DownloadJob, queue: &MessageSender) -> Result<(), ToolchainError> {
    let staging = stage(job)?;
    let archive = staging.path().join(&job.archive_name);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start download runtime")
        .map_err(ToolchainError::Download)?;

    let mut reporter = ProgressReporter::new(queue, job.progress_step);
    runtime
        .block_on(download_file(&job.url, &archive, |progress| {
            reporter.report(&progress)
        }))
        .map_err(ToolchainError::Download)?;

    install_archive(job, &archive, queue)?;

    if let Err(e) = staging.close() {
        warn!("Failed to clean up staging directory: {}", e);
    }

    Ok(())
}

/// Creates a staging directory private to one invocation.
fn stage(job: &DownloadJob) -> Result<TempDir, ToolchainError> {
    fs::create_dir_all(&job.staging_dir)
        .with_context(|| format!("Failed to create directory: {}", job.staging_dir.display()))
        .map_err(ToolchainError::Download)?;

    tempfile::Builder::new()
        .prefix("download-")
        .tempdir_in(&job.staging_dir)
        .with_context(|| {
            format!(
                "Failed to create staging directory in {}",
                job.staging_dir.display()
            )
        })
        .map_err(ToolchainError::Download)
}

/// Extracts a downloaded `archive` into the job's install directory, checks
/// the executable is present and marks it executable. The archive is removed
/// afterwards.
fn install_archive(
    job: &DownloadJob,
    archive: &Path,
    queue: &MessageSender,
) -> Result<(), ToolchainError> {
    queue.info(
        DOWNLOAD_TOPIC,
        format!("Extracting to {}", job.install_dir.display()),
    );
    extract_archive(archive, &job.install_dir, job.format).map_err(ToolchainError::Extraction)?;

    if !job.executable.is_file() {
        return Err(ToolchainError::Extraction(anyhow::anyhow!(
            "archive did not contain {}",
            job.executable.display()
        )));
    }
    make_executable(&job.executable).map_err(ToolchainError::Extraction)?;

    if let Err(e) = fs::remove_file(archive) {
        warn!("Failed to clean up archive: {}", e);
    }

    Ok(())
}
