//! The enrichment loop.
//!
//! Systems are processed one at a time and requests are spaced by a fixed
//! delay. Every system's result is saved to the [`MetadataStore`] before
//! the next one starts, and systems already in the store are skipped.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use ccr_map_stage::StageError;
use ccr_map_stage::persist::write_atomic;
use ccr_map_stage::progress::ProgressCallback;
use ccr_map_stage::summary::StageSummary;
use ccr_map_water_models::{Catalog, SystemMetadata};

use crate::EnrichError;
use crate::datasheet::parse_datasheet;
use crate::search::DatasheetSource;
use crate::store::{MetadataStore, NOT_FOUND};

/// Default cache directory for raw datasheet pages.
pub const CACHE_DIR: &str = "cache_html";

/// A system to enrich.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichTarget {
    /// Water System Number.
    pub wsno: String,
    /// The download folder the system was found under, if any.
    pub folder_name: Option<String>,
}

/// Settings for an enrichment run.
#[derive(Debug, Clone)]
pub struct EnrichOptions {
    /// Maximum number of systems to enrich this run.
    pub limit: Option<usize>,
    /// Pause after every request to the portal.
    pub delay: Duration,
}

/// Raw datasheet pages on disk, `<dir>/<wsno>_detail.html`.
#[derive(Debug, Clone)]
pub struct DatasheetCache {
    dir: PathBuf,
}

impl DatasheetCache {
    /// A cache rooted at `dir`. The directory is created on first write.
    #[must_use]
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Where `wsno`'s page is cached.
    #[must_use]
    pub fn path(&self, wsno: &str) -> PathBuf {
        self.dir.join(format!("{wsno}_detail.html"))
    }

    /// The cached page for `wsno`, if any.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] if the file exists but cannot be read.
    pub fn read(&self, wsno: &str) -> Result<Option<String>, StageError> {
        let path = self.path(wsno);
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StageError::io(&path, e)),
        }
    }

    /// Caches `html` for `wsno`.
    ///
    /// # Errors
    ///
    /// Returns [`StageError`] if the file cannot be written.
    pub fn write(&self, wsno: &str, html: &str) -> Result<(), StageError> {
        write_atomic(&self.path(wsno), html.as_bytes())
    }
}

/// Builds the target list from the catalog and the download folders
/// (`<WSNO>_<name>`), de-duplicated and sorted by system number.
///
/// # Errors
///
/// Returns an I/O error if `downloads` exists but cannot be listed.
pub fn collect_targets(
    catalog: Option<&Catalog>,
    downloads: Option<&Path>,
) -> std::io::Result<Vec<EnrichTarget>> {
    let mut targets: BTreeMap<String, Option<String>> = BTreeMap::new();

    if let Some(catalog) = catalog {
        for entry in &catalog.systems {
            targets.entry(entry.wsno.clone()).or_default();
        }
    }

    if let Some(downloads) = downloads.filter(|dir| dir.is_dir()) {
        for entry in std::fs::read_dir(downloads)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let folder = entry.file_name().to_string_lossy().into_owned();
            if !folder.starts_with("TX") {
                continue;
            }
            let wsno = folder.split('_').next().unwrap_or_default().to_string();
            targets.insert(wsno, Some(folder));
        }
    }

    Ok(targets
        .into_iter()
        .map(|(wsno, folder_name)| EnrichTarget { wsno, folder_name })
        .collect())
}

/// Enriches every target not already in `store`.
///
/// A system the portal does not know is stored with the
/// [`NOT_FOUND`] marker so it is not searched again. A system whose
/// lookup fails is recorded as failed and left out of the store, so the
/// next run retries it.
///
/// # Errors
///
/// Returns [`EnrichError`] if the store cannot be written. A cached page
/// that cannot be read fails only that system.
pub async fn enrich_all(
    source: &dyn DatasheetSource,
    cache: &DatasheetCache,
    targets: &[EnrichTarget],
    store: &mut MetadataStore,
    options: &EnrichOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<StageSummary, EnrichError> {
    let mut summary = StageSummary::new("enrich");

    let mut pending = Vec::new();
    for target in targets {
        if store.contains(&target.wsno) {
            summary.skipped();
        } else {
            pending.push(target);
        }
    }
    if let Some(limit) = options.limit {
        pending.truncate(limit);
    }

    log::info!(
        "{} systems to enrich, {} already in store",
        pending.len(),
        summary.skipped_count()
    );
    progress.set_total(pending.len() as u64);

    let mut not_found = 0_u64;
    for target in pending {
        let wsno = target.wsno.as_str();
        progress.set_message(wsno.to_string());

        let cached = match cache.read(wsno) {
            Ok(cached) => cached,
            Err(e) => {
                log::warn!("{wsno}: cached page unreadable: {e}");
                summary.failed(wsno, e.to_string());
                progress.inc(1);
                continue;
            }
        };

        let (page, fetched) = if let Some(html) = cached {
            (Some(html), false)
        } else {
            let result = source.datasheet(wsno).await;
            match result {
                Ok(Some(html)) => {
                    // The page is still parsed and stored; only the cache copy is lost.
                    if let Err(e) = cache.write(wsno, &html) {
                        log::warn!("{wsno}: could not cache page: {e}");
                    }
                    (Some(html), true)
                }
                Ok(None) => (None, true),
                Err(e) => {
                    log::warn!("{wsno}: lookup failed: {e}");
                    summary.failed(wsno, e.to_string());
                    progress.inc(1);
                    pause(options.delay).await;
                    continue;
                }
            }
        };

        let mut metadata = if let Some(html) = page {
            parse_datasheet(&html)?
        } else {
            log::warn!("{wsno}: {NOT_FOUND}");
            not_found += 1;
            SystemMetadata {
                error: Some(NOT_FOUND.to_string()),
                ..SystemMetadata::default()
            }
        };
        metadata.folder_name.clone_from(&target.folder_name);
        store.insert(wsno, metadata)?;
        summary.succeeded();
        progress.inc(1);

        if fetched {
            pause(options.delay).await;
        }
    }

    progress.finish(format!(
        "{} enriched, {not_found} not found",
        summary.succeeded_count()
    ));
    Ok(summary)
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
