//! Water system catalog.
//!
//! The CCR search page carries two dropdowns: `wsno`, whose option values
//! look like `TX1013549:1 MAVERICK DEVELOPMENT:Ground Water`, and `ryear`,
//! listing every report year. The parsed [`Catalog`] is cached to
//! `water_systems.json` so later runs and stages do not refetch it.

use std::path::Path;

use ccr_map_water_models::{Catalog, CatalogEntry};
use scraper::{Html, Selector};

use crate::FetchError;
use crate::retry::{self, RetryPolicy};

/// Parses the catalog out of the search page HTML.
///
/// Placeholder options and ids that do not start with `TX` are skipped.
/// Each option's raw value is kept untrimmed.
///
/// # Errors
///
/// Returns [`FetchError::Parse`] if either dropdown is missing.
pub fn parse_catalog(html: &str) -> Result<Catalog, FetchError> {
    let document = Html::parse_document(html);
    let systems_select = parse_selector(r#"select[name="wsno"]"#)?;
    let years_select = parse_selector(r#"select[name="ryear"]"#)?;
    let option = parse_selector("option")?;

    let systems_el = document
        .select(&systems_select)
        .next()
        .ok_or_else(|| FetchError::Parse("water system dropdown not found".to_string()))?;
    let years_el = document
        .select(&years_select)
        .next()
        .ok_or_else(|| FetchError::Parse("year dropdown not found".to_string()))?;

    let systems = systems_el
        .select(&option)
        .filter_map(|opt| {
            let value = opt.value().attr("value").unwrap_or_default();
            let text = opt.text().collect::<String>();
            parse_system_option(value, text.trim())
        })
        .collect();

    let mut years: Vec<u16> = years_el
        .select(&option)
        .filter_map(|opt| opt.value().attr("value"))
        .map(str::trim)
        .filter(|v| !v.is_empty() && v.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|v| v.parse().ok())
        .collect();
    years.sort_unstable_by(|a, b| b.cmp(a));
    years.dedup();

    Ok(Catalog { systems, years })
}

/// Parses one `wsno` option. Returns `None` for placeholders and
/// malformed values.
#[must_use]
pub fn parse_system_option(value: &str, text: &str) -> Option<CatalogEntry> {
    if value.trim().is_empty() || text.contains("Select Water System") {
        return None;
    }

    let mut parts = value.split(':');
    let wsno = parts.next()?.trim();
    let name = parts.next()?.trim();
    let water_source = parts.next().unwrap_or_default().trim();

    if !wsno.starts_with("TX") {
        return None;
    }

    Some(CatalogEntry {
        wsno: wsno.to_string(),
        name: name.to_string(),
        water_source: water_source.to_string(),
        raw_value: value.to_string(),
    })
}

/// Fetches and parses the catalog from the portal.
///
/// # Errors
///
/// Returns [`FetchError`] if the page cannot be fetched or parsed.
pub async fn fetch_catalog(
    client: &reqwest::Client,
    policy: &RetryPolicy,
) -> Result<Catalog, FetchError> {
    log::info!("Fetching water systems and years from {}", crate::CATALOG_URL);
    let html = retry::send_text(|| client.get(crate::CATALOG_URL), policy).await?;
    let catalog = parse_catalog(&html)?;
    log::info!(
        "Found {} water systems and {} years",
        catalog.systems.len(),
        catalog.years.len()
    );
    Ok(catalog)
}

/// Returns the cached catalog at `cache_path`, fetching and caching it when
/// absent or when `refresh` is set.
///
/// # Errors
///
/// Returns [`FetchError`] if the catalog cannot be fetched, parsed or
/// cached.
pub async fn load_or_fetch(
    client: &reqwest::Client,
    cache_path: &Path,
    refresh: bool,
    policy: &RetryPolicy,
) -> Result<Catalog, FetchError> {
    if !refresh
        && let Some(catalog) = ccr_map_stage::persist::load_json::<Catalog>(cache_path)?
        && !catalog.systems.is_empty()
    {
        log::info!(
            "Loaded {} water systems and {} years from {}",
            catalog.systems.len(),
            catalog.years.len(),
            cache_path.display()
        );
        return Ok(catalog);
    }

    let catalog = fetch_catalog(client, policy).await?;
    ccr_map_stage::persist::save_json_atomic(cache_path, &catalog, true)?;
    log::info!("Saved catalog to {}", cache_path.display());
    Ok(catalog)
}

fn parse_selector(selector: &str) -> Result<Selector, FetchError> {
    Selector::parse(selector)
        .map_err(|e| FetchError::Parse(format!("invalid CSS selector '{selector}': {e}")))
}
