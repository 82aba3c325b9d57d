#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the CCR report scraper.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use ccr_map_cli_utils::IndicatifProgress;
use ccr_map_scraper::download::{DownloadOptions, HttpReportFetcher, download_all};
use ccr_map_scraper::retry::RetryPolicy;
use ccr_map_scraper::{build_client, catalog, queue};
use ccr_map_stage::checkpoint::JsonCheckpoint;
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "ccr_map_scrape",
    about = "Download Consumer Confidence Reports from the TCEQ portal"
)]
struct Cli {
    /// Directory reports are saved under (one folder per system)
    #[arg(long, default_value = "downloads")]
    downloads: PathBuf,
    /// Catalog cache file
    #[arg(long, default_value = "water_systems.json")]
    catalog: PathBuf,
    /// Download checkpoint file
    #[arg(long, default_value = "progress.json")]
    progress: PathBuf,
    /// Failure log file
    #[arg(long, default_value = "failed_downloads.log")]
    failed_log: PathBuf,
    /// Refetch the catalog even if a cached copy exists
    #[arg(long)]
    refresh_catalog: bool,
    /// Concurrent downloads
    #[arg(long, default_value = "2")]
    workers: usize,
    /// Attempts per report before it is recorded as failed
    #[arg(long, default_value = "3")]
    retries: u32,
    /// Seconds to wait before the first retry (doubled after each attempt)
    #[arg(long, default_value = "30")]
    retry_delay: u64,
    /// Maximum number of reports to fetch this run
    #[arg(long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let multi = ccr_map_cli_utils::init_logger();
    let cli = Cli::parse();
    let start = Instant::now();

    let client = build_client()?;
    let policy = RetryPolicy {
        attempts: cli.retries.max(1),
        base_delay: Duration::from_secs(cli.retry_delay),
    };

    let catalog = catalog::load_or_fetch(&client, &cli.catalog, cli.refresh_catalog, &policy).await?;
    if catalog.systems.is_empty() || catalog.years.is_empty() {
        return Err("catalog has no water systems or no years".into());
    }

    let mut checkpoint = JsonCheckpoint::open(&cli.progress)?;
    let (downloaded, not_available, failed) = checkpoint.counts();
    log::info!(
        "Checkpoint: {downloaded} downloaded, {not_available} not available, {failed} failed"
    );

    let queue = queue::build_queue(&catalog, &checkpoint, cli.limit);
    let possible = catalog.systems.len() * catalog.years.len();
    log::info!(
        "{} of {possible} reports queued (years {}-{})",
        queue.len(),
        catalog.years.last().copied().unwrap_or_default(),
        catalog.years.first().copied().unwrap_or_default(),
    );
    if queue.is_empty() {
        println!("All downloads complete!");
        return Ok(ExitCode::SUCCESS);
    }

    let options = DownloadOptions {
        downloads_dir: cli.downloads,
        workers: cli.workers,
        policy,
        failure_log: cli.failed_log,
    };
    let fetcher = HttpReportFetcher::new(client);
    let progress = IndicatifProgress::items_bar(&multi, "Downloading reports");

    let summary = download_all(&fetcher, queue, &mut checkpoint, &options, &progress).await?;

    summary.print();
    let (downloaded, not_available, failed) = checkpoint.counts();
    println!(
        "Checkpoint now: {downloaded} downloaded, {not_available} not available, {failed} failed ({} of {possible})",
        checkpoint.len()
    );
    log::info!("Finished in {:.1}s", start.elapsed().as_secs_f64());

    Ok(summary.exit_code())
}
