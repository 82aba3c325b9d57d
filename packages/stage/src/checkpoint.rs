//! Download checkpoint.
//!
//! The checkpoint is a persisted key-value store from report key
//! (`<WSNO>_<year>`) to [`CheckpointStatus`]. It is passed explicitly to the
//! scraper's download loop, which is its only writer. Every [`record`]
//! rewrites the file atomically, so killing the process at any point loses
//! at most the document in flight.
//!
//! [`record`]: CheckpointStore::record

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::StageError;
use crate::persist::{load_json, save_json_atomic};

/// The recorded outcome for one document.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CheckpointStatus {
    /// The document was saved.
    Downloaded,
    /// The portal has no report for this system and year.
    NotAvailable,
    /// Every attempt failed; retried on the next run.
    Failed,
}

impl CheckpointStatus {
    /// Whether this status means the document needs no further attempts.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Downloaded | Self::NotAvailable)
    }
}

/// A persisted mapping from report key to [`CheckpointStatus`].
pub trait CheckpointStore {
    /// The recorded status for `key`, if any.
    fn status(&self, key: &str) -> Option<CheckpointStatus>;

    /// Whether `key` has a terminal status and should not be fetched again.
    fn is_complete(&self, key: &str) -> bool {
        self.status(key).is_some_and(CheckpointStatus::is_terminal)
    }

    /// Records `status` for `key` and persists the change.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] if the change cannot be persisted.
    fn record(&mut self, key: &str, status: CheckpointStatus) -> Result<(), StageError>;
}

/// A [`CheckpointStore`] backed by a JSON file (`progress.json`).
#[derive(Debug, Clone)]
pub struct JsonCheckpoint {
    path: PathBuf,
    entries: BTreeMap<String, CheckpointStatus>,
}

impl JsonCheckpoint {
    /// Loads the checkpoint at `path`, or starts an empty one if the file
    /// does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] if the file exists but cannot be parsed.
    pub fn open(path: &Path) -> Result<Self, StageError> {
        let entries = load_json(path)?.unwrap_or_default();
        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    /// Number of entries with each status, as `(downloaded, not_available,
    /// failed)`.
    #[must_use]
    pub fn counts(&self) -> (usize, usize, usize) {
        self.entries
            .values()
            .fold((0, 0, 0), |(d, n, f), status| match status {
                CheckpointStatus::Downloaded => (d + 1, n, f),
                CheckpointStatus::NotAvailable => (d, n + 1, f),
                CheckpointStatus::Failed => (d, n, f + 1),
            })
    }

    /// Total number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the checkpoint has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CheckpointStore for JsonCheckpoint {
    fn status(&self, key: &str) -> Option<CheckpointStatus> {
        self.entries.get(key).copied()
    }

    fn record(&mut self, key: &str, status: CheckpointStatus) -> Result<(), StageError> {
        self.entries.insert(key.to_string(), status);
        save_json_atomic(&self.path, &self.entries, true)
    }
}

/// An in-memory [`CheckpointStore`] for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpoint {
    entries: BTreeMap<String, CheckpointStatus>,
}

impl MemoryCheckpoint {
    /// Creates a checkpoint pre-populated with `entries`.
    #[must_use]
    pub fn with_entries(entries: impl IntoIterator<Item = (String, CheckpointStatus)>) -> Self {
        Self {
            entries: entries.into_iter().collect(),
        }
    }
}

impl CheckpointStore for MemoryCheckpoint {
    fn status(&self, key: &str) -> Option<CheckpointStatus> {
        self.entries.get(key).copied()
    }

    fn record(&mut self, key: &str, status: CheckpointStatus) -> Result<(), StageError> {
        self.entries.insert(key.to_string(), status);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_entries_are_not_complete() {
        let checkpoint = MemoryCheckpoint::with_entries([
            ("TX1_2023".to_string(), CheckpointStatus::Downloaded),
            ("TX1_2022".to_string(), CheckpointStatus::NotAvailable),
            ("TX1_2021".to_string(), CheckpointStatus::Failed),
        ]);
        assert!(checkpoint.is_complete("TX1_2023"));
        assert!(checkpoint.is_complete("TX1_2022"));
        assert!(!checkpoint.is_complete("TX1_2021"));
        assert!(!checkpoint.is_complete("TX1_2020"));
    }

    #[test]
    fn json_checkpoint_persists_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");

        let mut checkpoint = JsonCheckpoint::open(&path).unwrap();
        assert!(checkpoint.is_empty());
        checkpoint
            .record("TX0010001_2023", CheckpointStatus::Downloaded)
            .unwrap();
        checkpoint
            .record("TX0010001_2022", CheckpointStatus::NotAvailable)
            .unwrap();

        let reopened = JsonCheckpoint::open(&path).unwrap();
        assert_eq!(reopened.len(), 2);
        assert_eq!(
            reopened.status("TX0010001_2022"),
            Some(CheckpointStatus::NotAvailable)
        );
        assert_eq!(reopened.counts(), (1, 1, 0));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"not_available\""));
    }

    #[test]
    fn failed_status_can_be_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let mut checkpoint = JsonCheckpoint::open(&path).unwrap();
        checkpoint.record("TX1_2023", CheckpointStatus::Failed).unwrap();
        checkpoint
            .record("TX1_2023", CheckpointStatus::Downloaded)
            .unwrap();
        assert_eq!(
            JsonCheckpoint::open(&path).unwrap().counts(),
            (1, 0, 0)
        );
    }
}
