#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Legacy `.doc` to HTML conversion.
//!
//! The pipeline never parses binary documents itself. It hands each one to
//! a [`DocumentConverter`], a black box that either produces an HTML file
//! or fails. [`command::CommandConverter`] drives an external program
//! (LibreOffice by default) with a per-document timeout.

pub mod command;
pub mod run;

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;

/// Errors from converting a single document.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    /// The converter program is not installed or not on `PATH`.
    #[error("converter program not found: {0}")]
    NotFound(String),

    /// The converter program could not be started.
    #[error("failed to start converter: {0}")]
    Spawn(#[source] std::io::Error),

    /// The converter ran past its timeout and was killed.
    #[error("Timeout (>{}s)", .0.as_secs())]
    Timeout(Duration),

    /// The converter exited unsuccessfully.
    #[error("converter exited with {status}: {stderr}")]
    Failed {
        /// Exit status as displayed by the OS.
        status: String,
        /// Tail of the converter's stderr.
        stderr: String,
    },

    /// The converter exited successfully but left no output file.
    #[error("converter produced no output at {}", .0.display())]
    MissingOutput(PathBuf),

    /// Report index or failure log persistence failed.
    #[error(transparent)]
    Stage(#[from] ccr_map_stage::StageError),
}

/// Converts one binary document into an HTML file.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// Converts `input`, writing `<stem>.html` into `outdir`, and returns
    /// the path of the HTML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConversionError`] if conversion fails.
    async fn convert(&self, input: &Path, outdir: &Path) -> Result<PathBuf, ConversionError>;
}

/// Where the HTML for `document` is expected: same folder, `.html`
/// extension.
#[must_use]
pub fn html_path_for(document: &Path) -> PathBuf {
    document.with_extension("html")
}
