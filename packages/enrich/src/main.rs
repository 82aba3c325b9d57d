#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the metadata enricher.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use ccr_map_cli_utils::IndicatifProgress;
use ccr_map_enrich::run::{self, CACHE_DIR, DatasheetCache, EnrichOptions};
use ccr_map_enrich::search::HttpDatasheetSource;
use ccr_map_enrich::store::{METADATA_FILE, MetadataStore};
use ccr_map_scraper::retry::RetryPolicy;
use ccr_map_water_models::Catalog;
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "ccr_map_enrich",
    about = "Fetch population, county, address and source metadata for each water system"
)]
struct Cli {
    /// Catalog file written by the scraper
    #[arg(long, default_value = "water_systems.json")]
    catalog: PathBuf,
    /// Downloads directory; its `<WSNO>_<name>` folders are enriched too
    #[arg(long, default_value = "downloads")]
    downloads: PathBuf,
    /// Metadata store
    #[arg(long, short, default_value = METADATA_FILE)]
    output: PathBuf,
    /// Raw datasheet cache directory
    #[arg(long, default_value = CACHE_DIR)]
    cache_dir: PathBuf,
    /// Maximum number of systems to enrich
    #[arg(long)]
    limit: Option<usize>,
    /// Milliseconds to wait after each portal request
    #[arg(long, default_value = "1000")]
    delay_ms: u64,
    /// Attempts per request
    #[arg(long, default_value = "3")]
    retries: u32,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let multi = ccr_map_cli_utils::init_logger();
    let cli = Cli::parse();
    let start = Instant::now();

    let catalog: Option<Catalog> = ccr_map_stage::persist::load_json(&cli.catalog)?;
    if catalog.is_none() {
        log::warn!(
            "No catalog at {}; enriching download folders only",
            cli.catalog.display()
        );
    }
    let targets = run::collect_targets(catalog.as_ref(), Some(&cli.downloads))?;
    if targets.is_empty() {
        return Err("no systems found in the catalog or downloads directory".into());
    }

    let mut store = MetadataStore::open(&cli.output)?;
    log::info!(
        "Loaded {} existing records from {}",
        store.len(),
        cli.output.display()
    );

    let client = ccr_map_scraper::build_client()?;
    let source = HttpDatasheetSource::new(
        client,
        RetryPolicy {
            attempts: cli.retries,
            ..RetryPolicy::default()
        },
    );
    let cache = DatasheetCache::new(&cli.cache_dir);
    let options = EnrichOptions {
        limit: cli.limit,
        delay: Duration::from_millis(cli.delay_ms),
    };

    let progress = IndicatifProgress::items_bar(&multi, "Enriching systems");
    let summary =
        run::enrich_all(&source, &cache, &targets, &mut store, &options, &progress).await?;

    summary.print();
    log::info!(
        "{} systems in store ({} not found)",
        store.len(),
        store.error_count()
    );
    log::info!("Finished in {:.1}s", start.elapsed().as_secs_f64());
    Ok(summary.exit_code())
}
