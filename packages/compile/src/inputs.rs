//! Loading compiler inputs.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use ccr_map_stage::persist::load_json;
use ccr_map_stage::progress::ProgressCallback;
use ccr_map_stage::summary::StageSummary;
use ccr_map_stage::walk::find_report_files;
use ccr_map_water_models::{Catalog, ReportExtraction, SystemMetadata};

use crate::CompileError;

/// Everything the compiler joins.
#[derive(Debug, Clone, Default)]
pub struct CompileInputs {
    /// The scraped catalog.
    pub catalog: Catalog,
    /// Enricher output keyed by system number.
    pub metadata: BTreeMap<String, SystemMetadata>,
    /// Every loaded extraction, sorted by system number then year.
    pub extractions: Vec<ReportExtraction>,
}

/// Loads the catalog file. A missing catalog is an error; the map's system
/// list is built from it.
///
/// # Errors
///
/// Returns [`CompileError`] if the file is missing or unparseable.
pub fn load_catalog(path: &Path) -> Result<Catalog, CompileError> {
    load_json(path)?.ok_or_else(|| CompileError::MissingInput(path.to_path_buf()))
}

/// Loads the metadata store, or an empty one if the file does not exist.
///
/// # Errors
///
/// Returns [`CompileError`] if the file exists but cannot be parsed.
pub fn load_metadata(path: &Path) -> Result<BTreeMap<String, SystemMetadata>, CompileError> {
    let metadata = load_json(path)?;
    if metadata.is_none() {
        log::warn!("No metadata at {}; compiling without it", path.display());
    }
    Ok(metadata.unwrap_or_default())
}

/// Loads every `<WSNO>_<year>.json` extraction under `downloads`, at most
/// `limit` of them. Unparseable files are recorded as failures and
/// skipped.
///
/// # Errors
///
/// Returns [`CompileError::Io`] if the directory cannot be walked.
pub fn load_extractions(
    downloads: &Path,
    limit: Option<usize>,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<(Vec<ReportExtraction>, StageSummary), CompileError> {
    let mut files = find_report_files(downloads, "json")?;
    if let Some(limit) = limit {
        files.truncate(limit);
    }
    progress.set_total(files.len() as u64);

    let mut summary = StageSummary::new("load extractions");
    let mut extractions = Vec::with_capacity(files.len());

    for file in &files {
        match load_json::<ReportExtraction>(&file.path) {
            Ok(Some(extraction)) => {
                extractions.push(extraction);
                summary.succeeded();
            }
            Ok(None) => summary.skipped(),
            Err(e) => {
                log::warn!("Skipping {}: {e}", file.path.display());
                summary.failed(&file.path.display().to_string(), e.to_string());
            }
        }
        progress.inc(1);
    }
    progress.finish(format!("{} extractions loaded", extractions.len()));

    extractions.sort_by(|a, b| a.wsno.cmp(&b.wsno).then(a.year.cmp(&b.year)));
    Ok((extractions, summary))
}

/// The extractions ordered by system number then year, whatever order
/// they were loaded in.
#[must_use]
pub fn by_system_and_year(extractions: &[ReportExtraction]) -> Vec<&ReportExtraction> {
    let mut sorted: Vec<_> = extractions.iter().collect();
    sorted.sort_by(|a, b| a.wsno.cmp(&b.wsno).then(a.year.cmp(&b.year)));
    sorted
}

#[cfg(test)]
mod tests {
    use ccr_map_stage::progress::null_progress;

    use super::*;

    #[test]
    fn loads_sorted_extractions_and_skips_broken_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("TX2_B")).unwrap();
        std::fs::create_dir_all(root.join("TX1_A")).unwrap();
        for (path, wsno, year) in [
            ("TX2_B/TX2_2022.json", "TX2", 2022),
            ("TX1_A/TX1_2023.json", "TX1", 2023),
            ("TX1_A/TX1_2021.json", "TX1", 2021),
        ] {
            let extraction = ReportExtraction {
                wsno: wsno.to_string(),
                year,
                system_name: None,
                water_source: None,
                no_data: true,
                contaminants: Vec::new(),
            };
            std::fs::write(root.join(path), serde_json::to_vec(&extraction).unwrap()).unwrap();
        }
        std::fs::write(root.join("TX1_A/TX1_2020.json"), "{not json").unwrap();
        std::fs::write(root.join("reports.json"), "{}").unwrap();

        let (extractions, summary) = load_extractions(root, None, &null_progress()).unwrap();
        let keys: Vec<_> = extractions.iter().map(|e| (e.wsno.as_str(), e.year)).collect();
        assert_eq!(keys, vec![("TX1", 2021), ("TX1", 2023), ("TX2", 2022)]);
        assert_eq!(summary.failed_count(), 1);
    }

    #[test]
    fn missing_catalog_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_catalog(&dir.path().join("catalog.json")),
            Err(CompileError::MissingInput(_))
        ));
        assert!(load_metadata(&dir.path().join("meta.json")).unwrap().is_empty());
    }
}
