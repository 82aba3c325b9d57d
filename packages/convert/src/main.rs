#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the document converter.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};

use ccr_map_cli_utils::IndicatifProgress;
use ccr_map_convert::command::{CommandConverter, DEFAULT_COMMAND};
use ccr_map_convert::run::{self, ConvertOptions};
use ccr_map_stage::reports::{REPORT_INDEX_FILE, ReportIndex};
use ccr_map_stage::walk::find_report_files;
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "ccr_map_convert",
    about = "Convert downloaded .doc reports to HTML"
)]
struct Cli {
    /// Downloads directory to scan for .doc files
    #[arg(long, short, default_value = "downloads")]
    input: PathBuf,
    /// Converter command; `{input}` and `{outdir}` are substituted
    #[arg(long, default_value = DEFAULT_COMMAND)]
    command: String,
    /// Seconds before a conversion is killed
    #[arg(long, default_value = "45")]
    timeout: u64,
    /// Concurrent conversions
    #[arg(long, default_value = "2")]
    workers: usize,
    /// Maximum number of documents to convert
    #[arg(long)]
    limit: Option<usize>,
    /// Reconvert even if the HTML already exists
    #[arg(long)]
    force: bool,
    /// Retry documents that failed on an earlier run
    #[arg(long)]
    retry_failed: bool,
    /// Failure log file
    #[arg(long, default_value = "failed_conversions.log")]
    failed_log: PathBuf,
    /// Print conversion statistics and exit
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let multi = ccr_map_cli_utils::init_logger();
    let cli = Cli::parse();
    let start = Instant::now();

    if !cli.input.is_dir() {
        return Err(format!("input directory {} does not exist", cli.input.display()).into());
    }

    let mut index = ReportIndex::open(&cli.input.join(REPORT_INDEX_FILE))?;
    let documents = find_report_files(&cli.input, "doc")?;
    let mut discovered = 0;
    for doc in &documents {
        if index.discover(&doc.wsno, doc.year, &doc.path) {
            discovered += 1;
        }
    }
    index.save()?;
    log::info!(
        "Found {} documents ({discovered} new), {} in index",
        documents.len(),
        index.len()
    );

    if cli.stats {
        let stats = run::stats(&index);
        println!("Documents:          {}", stats.documents);
        println!("HTML on disk:       {}", stats.html_on_disk);
        println!("Converted:          {}", stats.converted);
        println!("Failed:             {}", stats.failed);
        println!("Pending:            {}", stats.pending);
        return Ok(ExitCode::SUCCESS);
    }

    let converter = CommandConverter::from_template(&cli.command, Duration::from_secs(cli.timeout))
        .ok_or("converter command is empty")?;

    let previously_failed: BTreeSet<String> = if cli.retry_failed {
        BTreeSet::new()
    } else {
        ccr_map_stage::persist::read_failure_items(&cli.failed_log)?
            .into_iter()
            .collect()
    };

    let options = ConvertOptions {
        force: cli.force,
        retry_failed: cli.retry_failed,
        limit: cli.limit,
        workers: cli.workers,
        failure_log: cli.failed_log,
    };
    let plan = run::plan(&index, &previously_failed, &options);
    log::info!(
        "{} to convert, {} already converted, {} skipped after earlier failures",
        plan.pending.len(),
        plan.already_converted.len(),
        plan.skipped_failed.len()
    );
    if !plan.skipped_failed.is_empty() && !options.retry_failed {
        log::info!("Use --retry-failed to try previously failed documents again");
    }

    let progress = IndicatifProgress::items_bar(&multi, "Converting documents");
    let summary = run::convert_all(&converter, &mut index, plan, &options, &progress).await?;

    summary.print();
    log::info!("Finished in {:.1}s", start.elapsed().as_secs_f64());
    Ok(summary.exit_code())
}
