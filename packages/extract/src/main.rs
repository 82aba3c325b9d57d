#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the table extractor.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;

use ccr_map_cli_utils::IndicatifProgress;
use ccr_map_extract::run::{ExtractOptions, extract_all};
use ccr_map_stage::walk::find_report_files;
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "ccr_map_extract",
    about = "Extract contaminant tables from converted reports"
)]
struct Cli {
    /// Downloads directory to scan for .html reports
    #[arg(long, short, default_value = "downloads")]
    input: PathBuf,
    /// Re-extract even if the JSON already exists
    #[arg(long)]
    force: bool,
    /// Delete the HTML and its `_files` directory after a successful extraction
    #[arg(long)]
    delete_html: bool,
    /// Maximum number of reports to extract
    #[arg(long)]
    limit: Option<usize>,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let multi = ccr_map_cli_utils::init_logger();
    let cli = Cli::parse();
    let start = Instant::now();

    if !cli.input.is_dir() {
        return Err(format!("input directory {} does not exist", cli.input.display()).into());
    }

    let files = find_report_files(&cli.input, "html")?;
    log::info!("Found {} converted reports", files.len());

    let options = ExtractOptions {
        force: cli.force,
        delete_html: cli.delete_html,
        limit: cli.limit,
    };
    let progress = IndicatifProgress::items_bar(&multi, "Extracting");
    let run = extract_all(files, &options, &progress);

    run.summary.print();
    println!(
        "  {} reports had no recognizable contaminant table",
        run.no_data
    );
    log::info!("Finished in {:.1}s", start.elapsed().as_secs_f64());
    Ok(run.summary.exit_code())
}
