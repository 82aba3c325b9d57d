#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the dataset compiler.
//!
//! `compile` writes the map, detail and debug artifacts; `audit` reports
//! how observed contaminant names map to categories; `csv` flattens
//! written artifacts into a long-format CSV.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use ccr_map_category::CategoryMapper;
use ccr_map_cli_utils::IndicatifProgress;
use ccr_map_compile::dataset::{self, CompileOptions};
use ccr_map_compile::inputs::{self, CompileInputs};
use ccr_map_compile::output::{ArtifactPaths, write_artifacts};
use ccr_map_compile::schema::{DetailView, MapView};
use ccr_map_compile::{CompileError, export};
use ccr_map_stage::persist::load_json;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ccr_map_compile",
    about = "Compile map and detail artifacts from extracted reports"
)]
struct Cli {
    /// Category configuration TOML (defaults to the embedded mapping)
    #[arg(long, global = true)]
    categories: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile `<output>_map.json`, `<output>_details.json` and `<output>_debug.json`
    Compile {
        /// Catalog file written by the scraper
        #[arg(long, default_value = "water_systems.json")]
        catalog: PathBuf,
        /// Metadata store written by the enricher
        #[arg(long, default_value = "water_system_metadata.json")]
        metadata: PathBuf,
        /// Downloads directory holding the extractions
        #[arg(long, default_value = "downloads")]
        downloads: PathBuf,
        /// Output base name
        #[arg(long, short, default_value = "dashboard_data")]
        output: PathBuf,
        /// Maximum number of extractions to load
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print observed contaminant names per category and the unmapped ones
    Audit {
        /// Downloads directory holding the extractions
        #[arg(long, default_value = "downloads")]
        downloads: PathBuf,
    },
    /// Export compiled artifacts as one CSV row per system, year and contaminant
    Csv {
        /// Output base name the artifacts were compiled to
        #[arg(long, default_value = "dashboard_data")]
        input: PathBuf,
        /// CSV file to write
        #[arg(long, short, default_value = "texas_water_quality.csv")]
        output: PathBuf,
    },
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let multi = ccr_map_cli_utils::init_logger();
    let cli = Cli::parse();
    let start = Instant::now();

    let mapper = CategoryMapper::load(cli.categories.as_deref())?;
    log::info!(
        "Loaded {} category entries ({} labels)",
        mapper.entries().len(),
        mapper.labels().len()
    );

    let code = match cli.command {
        Commands::Compile {
            catalog,
            metadata,
            downloads,
            output,
            limit,
        } => {
            let progress = IndicatifProgress::items_bar(&multi, "Loading extractions");
            let (extractions, mut summary) =
                inputs::load_extractions(&downloads, limit, &progress)?;
            let inputs = CompileInputs {
                catalog: inputs::load_catalog(&catalog)?,
                metadata: inputs::load_metadata(&metadata)?,
                extractions,
            };
            log::info!(
                "Inputs: {} catalog systems, {} metadata records, {} extractions",
                inputs.catalog.systems.len(),
                inputs.metadata.len(),
                inputs.extractions.len()
            );

            let dataset = dataset::compile(&inputs, &mapper, &CompileOptions::default());
            for error in &dataset.errors {
                log::warn!("Skipped: {error}");
                summary.failed("compile", error.to_string());
            }
            if !dataset.unmapped.is_empty() {
                log::warn!(
                    "{} contaminant names are uncategorized; run `audit` for the list",
                    dataset.unmapped.len()
                );
            }

            let paths = ArtifactPaths::for_output(&output);
            let sizes = write_artifacts(&paths, &dataset)?;
            println!(
                "Map:     {} ({})",
                paths.map.display(),
                format_size(sizes.map)
            );
            println!(
                "Details: {} ({})",
                paths.details.display(),
                format_size(sizes.details)
            );
            println!("Debug:   {}", paths.debug.display());

            summary.print();
            summary.exit_code()
        }
        Commands::Audit { downloads } => {
            let progress = IndicatifProgress::items_bar(&multi, "Loading extractions");
            let (extractions, summary) = inputs::load_extractions(&downloads, None, &progress)?;
            audit(&mapper, &extractions);
            summary.exit_code()
        }
        Commands::Csv { input, output } => {
            let rows = export_csv(&ArtifactPaths::for_output(&input), &output)?;
            println!("Wrote {rows} rows to {}", output.display());
            ExitCode::SUCCESS
        }
    };

    log::info!("Finished in {:.1}s", start.elapsed().as_secs_f64());
    Ok(code)
}

fn audit(mapper: &CategoryMapper, extractions: &[ccr_map_water_models::ReportExtraction]) {
    let observed: BTreeSet<String> = extractions
        .iter()
        .flat_map(|e| &e.contaminants)
        .map(|c| c.name.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|name| !name.is_empty())
        .collect();

    for (category, names) in mapper.group_by_category(&observed) {
        println!("{category} ({})", names.len());
        for name in names {
            println!("  {name}");
        }
    }

    let gaps = mapper.audit(&observed);
    println!();
    if gaps.is_empty() {
        println!("All {} observed names are mapped", observed.len());
    } else {
        println!("{} of {} observed names are unmapped:", gaps.len(), observed.len());
        for gap in &gaps {
            println!("  {gap}");
        }
    }
}

fn export_csv(paths: &ArtifactPaths, output: &Path) -> Result<u64, CompileError> {
    let map: MapView =
        load_json(&paths.map)?.ok_or_else(|| CompileError::MissingInput(paths.map.clone()))?;
    let details: DetailView = load_json(&paths.details)?
        .ok_or_else(|| CompileError::MissingInput(paths.details.clone()))?;

    let file = std::fs::File::create(output)?;
    export::write_csv(&map, &details, std::io::BufWriter::new(file))
}

#[allow(clippy::cast_precision_loss)]
fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}
