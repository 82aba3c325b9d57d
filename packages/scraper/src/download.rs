//! Report downloads.
//!
//! Queue items are fetched through a bounded buffered stream. The stream's
//! single consumer owns the checkpoint and records each document as its
//! fetch completes, so there is no shared mutable state between workers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ccr_map_stage::checkpoint::{CheckpointStatus, CheckpointStore};
use ccr_map_stage::progress::ProgressCallback;
use ccr_map_stage::summary::StageSummary;
use ccr_map_water_models::CatalogEntry;
use futures::stream::{self, StreamExt as _};

use crate::FetchError;
use crate::payload::{self, PayloadKind};
use crate::queue::QueueItem;
use crate::retry::{self, RetryPolicy};
use crate::sanitize::report_path;

/// Fetches the raw payload of one report.
#[async_trait]
pub trait ReportFetcher: Send + Sync {
    /// Makes a single attempt to fetch `entry`'s report for `year`.
    /// Retrying is the caller's job.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError`] if the request fails.
    async fn fetch(&self, entry: &CatalogEntry, year: u16) -> Result<Vec<u8>, FetchError>;
}

/// Fetches reports from the TCEQ portal.
#[derive(Debug, Clone)]
pub struct HttpReportFetcher {
    client: reqwest::Client,
}

impl HttpReportFetcher {
    /// Creates a fetcher using `client`.
    #[must_use]
    pub const fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ReportFetcher for HttpReportFetcher {
    async fn fetch(&self, entry: &CatalogEntry, year: u16) -> Result<Vec<u8>, FetchError> {
        let url = report_url(&entry.raw_value, year)?;
        log::debug!("GET {url}");
        let response = retry::send_checked(&|| self.client.get(url.clone())).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Builds the report URL for a dropdown value and year. The raw value is
/// form-encoded as-is, trailing whitespace included.
///
/// # Errors
///
/// Returns [`FetchError::Parse`] if the URL cannot be built.
pub fn report_url(raw_value: &str, year: u16) -> Result<reqwest::Url, FetchError> {
    reqwest::Url::parse_with_params(
        crate::REPORT_URL,
        &[
            ("wsno", raw_value),
            ("ryear", &year.to_string()),
            ("rptType", "DOC"),
            ("report", "Generate Report"),
        ],
    )
    .map_err(|e| FetchError::Parse(format!("invalid report URL: {e}")))
}

/// Settings for a download run.
#[derive(Debug, Clone)]
pub struct DownloadOptions {
    /// Root directory for per-system folders.
    pub downloads_dir: PathBuf,
    /// Concurrent fetches.
    pub workers: usize,
    /// Retry policy for transient failures and empty bodies.
    pub policy: RetryPolicy,
    /// Plain-text log of failed and unavailable reports.
    pub failure_log: PathBuf,
}

/// What happened to one queue item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Fetched and written to the path.
    Downloaded(PathBuf),
    /// A valid file was already on disk.
    Cached(PathBuf),
    /// The portal has no report for this system and year.
    NotAvailable,
}

/// Downloads every queue item, recording each outcome in `checkpoint` as
/// it completes.
///
/// Per-item failures are recorded as [`CheckpointStatus::Failed`] and
/// counted in the returned summary; they do not stop the run.
///
/// # Errors
///
/// Returns [`FetchError`] only if the checkpoint cannot be persisted.
pub async fn download_all<F, C>(
    fetcher: &F,
    queue: Vec<QueueItem>,
    checkpoint: &mut C,
    options: &DownloadOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<StageSummary, FetchError>
where
    F: ReportFetcher + ?Sized,
    C: CheckpointStore,
{
    let mut summary = StageSummary::new("scrape");
    progress.set_total(queue.len() as u64);

    let mut results = stream::iter(queue)
        .map(|item| async move {
            let result = download_one(fetcher, &item, options).await;
            (item, result)
        })
        .buffer_unordered(options.workers.max(1));

    while let Some((item, result)) = results.next().await {
        let key = item.key();
        match result {
            Ok(DownloadOutcome::Downloaded(path)) => {
                log::debug!("Downloaded {}", path.display());
                checkpoint.record(&key, CheckpointStatus::Downloaded)?;
                summary.succeeded();
            }
            Ok(DownloadOutcome::Cached(path)) => {
                log::debug!("Already on disk: {}", path.display());
                checkpoint.record(&key, CheckpointStatus::Downloaded)?;
                summary.skipped();
            }
            Ok(DownloadOutcome::NotAvailable) => {
                log_failure(options, &item, "Report not available (error page)");
                checkpoint.record(&key, CheckpointStatus::NotAvailable)?;
                summary.skipped();
            }
            Err(e) => {
                log::warn!("Failed to download {key}: {e}");
                log_failure(options, &item, &e.to_string());
                checkpoint.record(&key, CheckpointStatus::Failed)?;
                summary.failed(&key, e.to_string());
            }
        }
        progress.inc(1);
    }

    progress.finish(format!(
        "{} downloaded, {} skipped, {} failed",
        summary.succeeded_count(),
        summary.skipped_count(),
        summary.failed_count()
    ));
    Ok(summary)
}

async fn download_one<F: ReportFetcher + ?Sized>(
    fetcher: &F,
    item: &QueueItem,
    options: &DownloadOptions,
) -> Result<DownloadOutcome, FetchError> {
    let path = report_path(&options.downloads_dir, &item.entry, item.year);

    if path.exists() {
        if payload::is_valid_cached_file(&path) {
            return Ok(DownloadOutcome::Cached(path));
        }
        log::debug!("Removing invalid cached file {}", path.display());
        tokio::fs::remove_file(&path).await?;
    }

    let (kind, bytes) = retry::with_retry(&options.policy, || async {
        let bytes = fetcher.fetch(&item.entry, item.year).await?;
        match payload::classify(&bytes) {
            PayloadKind::Empty => Err(FetchError::Empty { bytes: bytes.len() }),
            kind => Ok((kind, bytes)),
        }
    })
    .await?;

    if kind == PayloadKind::NotAvailable {
        return Ok(DownloadOutcome::NotAvailable);
    }

    write_document(&path, &bytes).await?;
    Ok(DownloadOutcome::Downloaded(path))
}

async fn write_document(path: &Path, bytes: &[u8]) -> Result<(), FetchError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

fn log_failure(options: &DownloadOptions, item: &QueueItem, reason: &str) {
    let year = item.year.to_string();
    if let Err(e) = ccr_map_stage::persist::append_failure_line(
        &options.failure_log,
        &[&item.entry.wsno, &year, reason],
    ) {
        log::warn!("Could not append to failure log: {e}");
    }
}
