#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Catalog scraping and report downloads from the TCEQ CCR portal.
//!
//! The portal's search page lists every public water system and every
//! report year in two dropdowns ([`catalog`]). Each (system, year) pair not
//! yet in the download checkpoint is queued ([`queue`]) and fetched through
//! a bounded pool of workers ([`download`]), with payloads validated before
//! they are written ([`payload`]).
//!
//! The HTTP layer ([`retry`]) is shared with the metadata enricher.

pub mod catalog;
pub mod download;
pub mod payload;
pub mod queue;
pub mod retry;
pub mod sanitize;

use std::time::Duration;

/// Portal page listing every water system and report year.
pub const CATALOG_URL: &str =
    "https://dww2.tceq.texas.gov/CCR/JSP/SearchDispatch?action3=Review+Consumer+Confidence+Data";

/// Report generation endpoint.
pub const REPORT_URL: &str = "https://dww2.tceq.texas.gov/CCR/JSP/CCRReportDispatch";

/// User agent sent with every request.
pub const USER_AGENT: &str = "ccr-map/0.1 (water quality report archive)";

/// Per-request timeout. Report generation on the portal is slow.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(360);

/// Errors that can occur while fetching from the portals.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// An HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("HTTP {status}")]
    Status {
        /// The status code.
        status: u16,
    },

    /// The response body was empty or too small to be a report.
    #[error("empty response ({bytes} bytes)")]
    Empty {
        /// Bytes received.
        bytes: usize,
    },

    /// A page could not be parsed.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Checkpoint or cache persistence failed.
    #[error(transparent)]
    Stage(#[from] ccr_map_stage::StageError),
}

impl FetchError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(e) => retry::is_transient(e),
            Self::Status { status } => *status == 429 || *status >= 500,
            Self::Empty { .. } => true,
            Self::Parse(_) | Self::Io(_) | Self::Stage(_) => false,
        }
    }
}

/// Builds the HTTP client used for every portal request.
///
/// # Errors
///
/// Returns [`FetchError`] if the TLS backend cannot be initialised.
pub fn build_client() -> Result<reqwest::Client, FetchError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transient_errors() {
        assert!(FetchError::Status { status: 503 }.is_transient());
        assert!(FetchError::Status { status: 429 }.is_transient());
        assert!(!FetchError::Status { status: 404 }.is_transient());
        assert!(FetchError::Empty { bytes: 0 }.is_transient());
        assert!(!FetchError::Parse("no select".into()).is_transient());
    }
}
