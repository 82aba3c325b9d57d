//! The metadata store, `wsno -> SystemMetadata`, persisted as pretty JSON.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ccr_map_stage::StageError;
use ccr_map_stage::persist::{load_json, save_json_atomic};
use ccr_map_water_models::SystemMetadata;

/// Default store file name.
pub const METADATA_FILE: &str = "water_system_metadata.json";

/// Error marker for systems the portal does not know.
pub const NOT_FOUND: &str = "System Not Found";

/// Enriched metadata keyed by system number.
#[derive(Debug)]
pub struct MetadataStore {
    path: PathBuf,
    systems: BTreeMap<String, SystemMetadata>,
}

impl MetadataStore {
    /// Opens the store at `path`, starting empty if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] if the file exists but cannot be parsed.
    pub fn open(path: &Path) -> Result<Self, StageError> {
        let systems = load_json(path)?.unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            systems,
        })
    }

    /// Records `metadata` for `wsno` and saves the store.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] if the store cannot be written.
    pub fn insert(&mut self, wsno: &str, metadata: SystemMetadata) -> Result<(), StageError> {
        self.systems.insert(wsno.to_string(), metadata);
        save_json_atomic(&self.path, &self.systems, true)
    }

    /// Whether `wsno` has been enriched (including "not found" markers).
    #[must_use]
    pub fn contains(&self, wsno: &str) -> bool {
        self.systems.contains_key(wsno)
    }

    /// The metadata for `wsno`.
    #[must_use]
    pub fn get(&self, wsno: &str) -> Option<&SystemMetadata> {
        self.systems.get(wsno)
    }

    /// Number of systems in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.systems.len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Number of systems marked with an error.
    #[must_use]
    pub fn error_count(&self) -> usize {
        self.systems.values().filter(|m| m.error.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persists_every_insert() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(METADATA_FILE);

        let mut store = MetadataStore::open(&path).unwrap();
        assert!(store.is_empty());
        store
            .insert(
                "TX0010001",
                SystemMetadata {
                    population: Some(2500),
                    ..SystemMetadata::default()
                },
            )
            .unwrap();
        store
            .insert(
                "TX0010002",
                SystemMetadata {
                    error: Some(NOT_FOUND.to_string()),
                    ..SystemMetadata::default()
                },
            )
            .unwrap();

        let reopened = MetadataStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert!(reopened.contains("TX0010002"));
        assert_eq!(reopened.get("TX0010001").unwrap().population, Some(2500));
        assert_eq!(reopened.error_count(), 1);
    }
}
