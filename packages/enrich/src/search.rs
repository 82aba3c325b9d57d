//! Locating a system's datasheet on Drinking Water Watch.
//!
//! The portal has no direct datasheet URL keyed by system number. A search
//! by number returns a results page whose first `DataSheet.jsp` link leads
//! to the datasheet.

use std::time::Duration;

use async_trait::async_trait;
use ccr_map_scraper::FetchError;
use ccr_map_scraper::retry::{self, RetryPolicy};
use reqwest::Url;
use scraper::Html;

use crate::EnrichError;

/// Base every relative portal link resolves against.
pub const DWW_JSP_BASE: &str = "https://dww2.tceq.texas.gov/DWW/JSP/";

/// Search endpoint.
pub const SEARCH_URL: &str = "https://dww2.tceq.texas.gov/DWW/JSP/SearchDispatch";

/// Per-request timeout for search and datasheet pages.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(20);

/// Fetches a system's raw datasheet page.
#[async_trait]
pub trait DatasheetSource: Send + Sync {
    /// Returns the datasheet HTML, or `None` if the portal does not know
    /// the system.
    ///
    /// # Errors
    ///
    /// Returns [`EnrichError`] if the portal cannot be reached.
    async fn datasheet(&self, wsno: &str) -> Result<Option<String>, EnrichError>;
}

/// Query parameters for a search by system number.
#[must_use]
pub fn search_params(wsno: &str) -> [(&'static str, &str); 6] {
    [
        ("number", wsno),
        ("ActivityStatusCD", "All"),
        ("county", "All"),
        ("WaterSystemType", "All"),
        ("SourceWaterType", "All"),
        ("action", "Search For Water Systems"),
    ]
}

/// Finds the first datasheet link on a search results page, resolved
/// against [`DWW_JSP_BASE`].
///
/// # Errors
///
/// Returns [`EnrichError`] if the link cannot be resolved into a URL.
pub fn find_datasheet_link(results_html: &str) -> Result<Option<Url>, EnrichError> {
    let document = Html::parse_document(results_html);
    let anchors = crate::parse_selector("a[href]")?;

    let Some(href) = document
        .select(&anchors)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| href.contains("DataSheet.jsp"))
    else {
        return Ok(None);
    };

    let base = Url::parse(DWW_JSP_BASE)
        .map_err(|e| FetchError::Parse(format!("invalid base URL: {e}")))?;
    let url = base
        .join(href.trim())
        .map_err(|e| FetchError::Parse(format!("invalid datasheet link '{href}': {e}")))?;
    Ok(Some(url))
}

/// Searches the live portal.
pub struct HttpDatasheetSource {
    client: reqwest::Client,
    policy: RetryPolicy,
}

impl HttpDatasheetSource {
    /// Creates a source using `client` and retrying per `policy`.
    #[must_use]
    pub const fn new(client: reqwest::Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }
}

#[async_trait]
impl DatasheetSource for HttpDatasheetSource {
    async fn datasheet(&self, wsno: &str) -> Result<Option<String>, EnrichError> {
        let params = search_params(wsno);
        let results = retry::send_text(
            || {
                self.client
                    .get(SEARCH_URL)
                    .query(&params)
                    .timeout(PAGE_TIMEOUT)
            },
            &self.policy,
        )
        .await?;

        let Some(url) = find_datasheet_link(&results)? else {
            log::debug!("{wsno}: no datasheet link in search results");
            return Ok(None);
        };

        log::debug!("{wsno}: fetching {url}");
        let page = retry::send_text(
            || self.client.get(url.clone()).timeout(PAGE_TIMEOUT),
            &self.policy,
        )
        .await?;
        Ok(Some(page))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_datasheet_link() {
        let html = r#"<html><body>
            <a href="Help.jsp">Help</a>
            <a href="DataSheet.jsp?tinwsys_is_number=5870&amp;tinwsys_st_code=TX">TX0010001</a>
            <a href="DataSheet.jsp?tinwsys_is_number=9999">second</a>
        </body></html>"#;
        let url = find_datasheet_link(html).unwrap().unwrap();
        assert_eq!(
            url.as_str(),
            "https://dww2.tceq.texas.gov/DWW/JSP/DataSheet.jsp?tinwsys_is_number=5870&tinwsys_st_code=TX"
        );
    }

    #[test]
    fn no_link_means_unknown_system() {
        let html = "<html><body><p>No water systems found</p></body></html>";
        assert_eq!(find_datasheet_link(html).unwrap(), None);
    }

    #[test]
    fn search_params_carry_the_system_number() {
        let params = search_params("TX0010001");
        assert_eq!(params[0], ("number", "TX0010001"));
        assert!(params.contains(&("action", "Search For Water Systems")));
    }
}
