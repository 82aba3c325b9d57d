//! Batch conversion over the report index.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ccr_map_stage::progress::ProgressCallback;
use ccr_map_stage::reports::ReportIndex;
use ccr_map_stage::summary::StageSummary;
use ccr_map_water_models::ConversionStatus;
use futures::stream::{self, StreamExt as _};

use crate::{ConversionError, DocumentConverter, html_path_for};

/// Settings for a conversion run.
#[derive(Debug, Clone)]
pub struct ConvertOptions {
    /// Reconvert documents whose HTML already exists.
    pub force: bool,
    /// Retry documents that failed on an earlier run.
    pub retry_failed: bool,
    /// Maximum number of documents to convert.
    pub limit: Option<usize>,
    /// Concurrent conversions.
    pub workers: usize,
    /// Plain-text log of failed conversions.
    pub failure_log: PathBuf,
}

/// One document selected for conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDocument {
    /// Report key.
    pub key: String,
    /// Report year.
    pub year: u16,
    /// Document path.
    pub document: PathBuf,
}

/// What a run will do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionPlan {
    /// Documents to convert, newest year first.
    pub pending: Vec<PendingDocument>,
    /// Keys whose HTML is already on disk.
    pub already_converted: Vec<String>,
    /// Keys skipped because they failed before.
    pub skipped_failed: Vec<String>,
}

/// Selects the documents to convert.
///
/// `previously_failed` holds document file names from the failure log;
/// reports whose index status is [`ConversionStatus::Failed`] count as
/// failed too.
#[must_use]
pub fn plan(
    index: &ReportIndex,
    previously_failed: &BTreeSet<String>,
    options: &ConvertOptions,
) -> ConversionPlan {
    let mut reports: Vec<_> = index.iter().collect();
    reports.sort_by(|a, b| b.year.cmp(&a.year).then_with(|| a.document.cmp(&b.document)));

    let mut plan = ConversionPlan::default();
    for report in reports {
        let document = PathBuf::from(&report.document);
        let key = report.key();

        if !options.force && html_path_for(&document).exists() {
            plan.already_converted.push(key);
            continue;
        }

        let file_name = document
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let failed_before =
            report.status == ConversionStatus::Failed || previously_failed.contains(&file_name);
        if failed_before && !options.retry_failed {
            plan.skipped_failed.push(key);
            continue;
        }

        plan.pending.push(PendingDocument {
            key,
            year: report.year,
            document,
        });
    }

    if let Some(limit) = options.limit {
        plan.pending.truncate(limit);
    }
    plan
}

/// Converts every pending document, updating `index` after each one.
///
/// # Errors
///
/// Returns [`ConversionError::Stage`] only if the index cannot be saved.
/// Per-document failures are recorded and counted instead.
pub async fn convert_all<C: DocumentConverter + ?Sized>(
    converter: &C,
    index: &mut ReportIndex,
    plan: ConversionPlan,
    options: &ConvertOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<StageSummary, ConversionError> {
    let mut summary = StageSummary::new("convert");

    for key in &plan.already_converted {
        if index.get(key).is_some_and(|r| r.status != ConversionStatus::Converted) {
            index.set_status(key, ConversionStatus::Converted)?;
        }
        summary.skipped();
    }
    for _ in &plan.skipped_failed {
        summary.skipped();
    }

    progress.set_total(plan.pending.len() as u64);

    let mut results = stream::iter(plan.pending)
        .map(|doc| async move {
            let outdir = doc.document.parent().unwrap_or_else(|| Path::new("."));
            let result = converter.convert(&doc.document, outdir).await;
            (doc, result)
        })
        .buffer_unordered(options.workers.max(1));

    while let Some((doc, result)) = results.next().await {
        match result {
            Ok(html) => {
                log::debug!("Converted {}", html.display());
                index.set_status(&doc.key, ConversionStatus::Converted)?;
                summary.succeeded();
            }
            Err(e) => {
                log::warn!("Conversion failed for {}: {e}", doc.document.display());
                let file_name = doc
                    .document
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                if let Err(log_err) = ccr_map_stage::persist::append_failure_line(
                    &options.failure_log,
                    &[&file_name, &e.to_string()],
                ) {
                    log::warn!("Could not append to failure log: {log_err}");
                }
                index.set_status(&doc.key, ConversionStatus::Failed)?;
                summary.failed(&doc.key, e.to_string());
            }
        }
        progress.inc(1);
    }

    progress.finish(format!(
        "{} converted, {} failed",
        summary.succeeded_count(),
        summary.failed_count()
    ));
    Ok(summary)
}

/// Counts printed by `--stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// Reports in the index.
    pub documents: usize,
    /// Reports marked converted.
    pub converted: usize,
    /// Reports marked failed.
    pub failed: usize,
    /// Reports not yet attempted.
    pub pending: usize,
    /// Reports whose HTML exists on disk.
    pub html_on_disk: usize,
}

/// Computes [`ConversionStats`] for the index.
#[must_use]
pub fn stats(index: &ReportIndex) -> ConversionStats {
    ConversionStats {
        documents: index.len(),
        converted: index.count(ConversionStatus::Converted),
        failed: index.count(ConversionStatus::Failed),
        pending: index.count(ConversionStatus::Pending),
        html_on_disk: index
            .iter()
            .filter(|r| html_path_for(Path::new(&r.document)).exists())
            .count(),
    }
}
