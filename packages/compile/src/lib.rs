#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Compiles the map and detail artifacts for the static viewer.
//!
//! [`inputs`] loads the catalog, the metadata store and every report
//! extraction; [`systems`] joins them into one [`WaterSystem`] per system
//! number; [`dataset`] builds the two short-key views described in
//! [`schema`]; [`output`] writes them. [`export`] flattens the written
//! artifacts into a long-format CSV.
//!
//! [`WaterSystem`]: ccr_map_water_models::WaterSystem

pub mod dataset;
pub mod export;
pub mod inputs;
pub mod output;
pub mod schema;
pub mod systems;

/// Whole-run errors.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// An input or artifact could not be read or written.
    #[error(transparent)]
    Stage(#[from] ccr_map_stage::StageError),

    /// A directory could not be walked.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An artifact could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The CSV export failed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The category configuration could not be loaded.
    #[error(transparent)]
    Category(#[from] ccr_map_category::CategoryConfigError),

    /// A required input file is missing.
    #[error("missing input: {}", .0.display())]
    MissingInput(std::path::PathBuf),
}

/// A single system that cannot be compiled. The system is skipped and the
/// rest of the run continues.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompilationError {
    /// An input record has no system number.
    #[error("{origin} record '{label}' has no system identifier")]
    MissingIdentifier {
        /// Which input the record came from (`catalog`, `metadata`,
        /// `report`).
        origin: &'static str,
        /// Whatever identifies the record for a human (name, folder, year).
        label: String,
    },
}
