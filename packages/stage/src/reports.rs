//! The report index (`<downloads>/reports.json`).
//!
//! One entry per discovered document, keyed by report key. Entries are
//! created at discovery and afterwards only have their
//! [`ConversionStatus`] updated; they are never removed.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ccr_map_water_models::{ConversionStatus, Report};

use crate::StageError;
use crate::persist::{load_json, save_json_atomic};

/// File name of the report index inside the downloads directory.
pub const REPORT_INDEX_FILE: &str = "reports.json";

/// Persisted index of every known [`Report`].
#[derive(Debug, Clone)]
pub struct ReportIndex {
    path: PathBuf,
    reports: BTreeMap<String, Report>,
}

impl ReportIndex {
    /// Loads the index at `path`, or starts an empty one.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] if the file exists but cannot be parsed.
    pub fn open(path: &Path) -> Result<Self, StageError> {
        let reports = load_json(path)?.unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            reports,
        })
    }

    /// Registers a discovered report. An already-known report keeps its
    /// status; only its document path is refreshed. Returns `true` if the
    /// report is new.
    pub fn discover(&mut self, wsno: &str, year: u16, document: &Path) -> bool {
        let document = document.to_string_lossy().into_owned();
        let key = ccr_map_water_models::report_key(wsno, year);
        if let Some(existing) = self.reports.get_mut(&key) {
            existing.document = document;
            return false;
        }
        self.reports.insert(
            key,
            Report {
                wsno: wsno.to_string(),
                year,
                document,
                status: ConversionStatus::Pending,
            },
        );
        true
    }

    /// Updates a report's status and persists the index. Unknown keys are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] if the index cannot be written.
    pub fn set_status(&mut self, key: &str, status: ConversionStatus) -> Result<(), StageError> {
        let Some(report) = self.reports.get_mut(key) else {
            log::warn!("Status update for unknown report {key}");
            return Ok(());
        };
        report.status = status;
        self.save()
    }

    /// The report for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Report> {
        self.reports.get(key)
    }

    /// All reports in key order.
    pub fn iter(&self) -> impl Iterator<Item = &Report> {
        self.reports.values()
    }

    /// Number of reports with the given status.
    #[must_use]
    pub fn count(&self, status: ConversionStatus) -> usize {
        self.reports.values().filter(|r| r.status == status).count()
    }

    /// Total number of reports.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.is_empty()
    }

    /// Writes the index to disk.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] if the index cannot be written.
    pub fn save(&self) -> Result<(), StageError> {
        save_json_atomic(&self.path, &self.reports, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rediscovery_keeps_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(REPORT_INDEX_FILE);
        let mut index = ReportIndex::open(&path).unwrap();

        assert!(index.discover("TX0010001", 2023, Path::new("a/TX0010001_2023.doc")));
        index
            .set_status("TX0010001_2023", ConversionStatus::Converted)
            .unwrap();
        assert!(!index.discover("TX0010001", 2023, Path::new("b/TX0010001_2023.doc")));

        let report = index.get("TX0010001_2023").unwrap();
        assert_eq!(report.status, ConversionStatus::Converted);
        assert_eq!(report.document, "b/TX0010001_2023.doc");
    }

    #[test]
    fn status_updates_are_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(REPORT_INDEX_FILE);
        let mut index = ReportIndex::open(&path).unwrap();
        index.discover("TX1", 2022, Path::new("TX1_2022.doc"));
        index.discover("TX1", 2023, Path::new("TX1_2023.doc"));
        index.set_status("TX1_2022", ConversionStatus::Failed).unwrap();

        let reopened = ReportIndex::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.count(ConversionStatus::Failed), 1);
        assert_eq!(reopened.count(ConversionStatus::Pending), 1);
    }
}
