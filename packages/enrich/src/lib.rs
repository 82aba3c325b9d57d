#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Water system metadata from the Drinking Water Watch datasheets.
//!
//! For each system the enricher searches the portal by system number,
//! follows the first datasheet link ([`search`]), caches the raw page, and
//! parses population, county, system type, contacts and sources out of it
//! ([`datasheet`]). Results accumulate in a JSON [`store`] that is saved
//! after every system, so an interrupted run resumes where it stopped.

pub mod datasheet;
pub mod normalize;
pub mod run;
pub mod search;
pub mod store;

use ccr_map_scraper::FetchError;
use scraper::Selector;

/// Errors from enriching systems.
#[derive(Debug, thiserror::Error)]
pub enum EnrichError {
    /// Searching or fetching a datasheet failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The metadata store could not be read or written.
    #[error(transparent)]
    Stage(#[from] ccr_map_stage::StageError),

    /// A cached page could not be read or written.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A CSS selector failed to parse.
    #[error("{0}")]
    Selector(String),
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector, EnrichError> {
    Selector::parse(selector)
        .map_err(|e| EnrichError::Selector(format!("invalid CSS selector '{selector}': {e}")))
}
