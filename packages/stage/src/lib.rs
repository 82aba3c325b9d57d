#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Plumbing shared by every pipeline stage.
//!
//! Each stage owns its outputs exclusively and persists them as JSON so
//! later stages (or a re-run) can pick up where it left off. This crate
//! provides the atomic persistence helpers, the download
//! [`checkpoint`](checkpoint::CheckpointStore), the conversion-status
//! [`ReportIndex`](reports::ReportIndex), the end-of-run
//! [`StageSummary`](summary::StageSummary), and the [`progress`] trait.

pub mod checkpoint;
pub mod persist;
pub mod progress;
pub mod reports;
pub mod summary;
pub mod walk;

use std::path::{Path, PathBuf};

/// Errors from stage persistence.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    /// A file could not be read or written.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// A file could not be serialized or parsed.
    #[error("JSON error on {}: {source}", path.display())]
    Json {
        /// The file involved.
        path: PathBuf,
        /// The underlying error.
        source: serde_json::Error,
    },
}

impl StageError {
    /// Wraps an I/O error with the path it occurred on.
    #[must_use]
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_the_path() {
        let error = StageError::io(
            Path::new("downloads/progress.json"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(
            error.to_string(),
            "I/O error on downloads/progress.json: denied"
        );
    }
}
