//! The extraction loop over a downloads directory.

use std::path::Path;
use std::sync::Arc;

use ccr_map_stage::persist::save_json_atomic;
use ccr_map_stage::progress::ProgressCallback;
use ccr_map_stage::summary::StageSummary;
use ccr_map_stage::walk::ReportFile;
use ccr_map_water_models::report_key;

use crate::extract_file;

/// Settings for an extraction run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    /// Re-extract reports whose JSON already exists.
    pub force: bool,
    /// Remove the HTML and its `_files` directory after a successful
    /// extraction.
    pub delete_html: bool,
    /// Maximum number of reports to extract.
    pub limit: Option<usize>,
}

/// Counts from an extraction run.
#[derive(Debug, Clone)]
pub struct ExtractRun {
    /// Per-report outcomes.
    pub summary: StageSummary,
    /// Reports saved with `no_data` set.
    pub no_data: u64,
}

/// Extracts every report in `files`, writing `<WSNO>_<year>.json` next to
/// each HTML file.
///
/// A report that cannot be read or whose JSON cannot be written is recorded
/// as failed and the batch continues.
#[must_use]
pub fn extract_all(
    files: Vec<ReportFile>,
    options: &ExtractOptions,
    progress: &Arc<dyn ProgressCallback>,
) -> ExtractRun {
    let mut summary = StageSummary::new("extract");
    let mut no_data = 0_u64;

    let mut pending = Vec::new();
    for file in files {
        if !options.force && file.path.with_extension("json").exists() {
            summary.skipped();
        } else {
            pending.push(file);
        }
    }
    if let Some(limit) = options.limit {
        pending.truncate(limit);
    }
    progress.set_total(pending.len() as u64);

    for file in &pending {
        let key = report_key(&file.wsno, file.year);
        progress.set_message(key.clone());

        let saved = extract_file(&file.path).and_then(|extraction| {
            save_json_atomic(&file.path.with_extension("json"), &extraction, true)?;
            Ok(extraction.no_data)
        });
        match saved {
            Ok(empty) => {
                if empty {
                    log::debug!("{key}: no contaminant table");
                    no_data += 1;
                }
                summary.succeeded();
                if options.delete_html {
                    delete_markup(&file.path);
                }
            }
            Err(e) => {
                log::warn!("Extract failed {}: {e}", file.path.display());
                summary.failed(&key, e.to_string());
            }
        }
        progress.inc(1);
    }

    progress.finish(format!("{} extracted", summary.succeeded_count()));
    ExtractRun { summary, no_data }
}

fn delete_markup(html: &Path) {
    if let Err(e) = std::fs::remove_file(html) {
        log::warn!("Could not delete {}: {e}", html.display());
    }
    let stem = html.file_stem().unwrap_or_default().to_string_lossy();
    let files_dir = html.with_file_name(format!("{stem}_files"));
    if files_dir.is_dir()
        && let Err(e) = std::fs::remove_dir_all(&files_dir)
    {
        log::warn!("Could not delete {}: {e}", files_dir.display());
    }
}

#[cfg(test)]
mod tests {
    use ccr_map_stage::progress::null_progress;
    use ccr_map_stage::walk::find_report_files;

    use super::*;

    const REPORT: &str = "<html><body><table>\
        <tr><td>Inorganic Contaminants</td><td>Collection Date</td>\
        <td>Highest Level Detected</td><td>Range of Individual Samples</td><td>MCLG</td>\
        <td>MCL</td><td>Units</td><td>Violation</td><td>Likely Source of Contamination</td></tr>\
        <tr><td>Nitrate [measured as Nitrogen]</td><td>2023</td><td>0.5</td><td>0.5 - 0.5</td>\
        <td>10</td><td>10</td><td>ppm</td><td>N</td><td>Runoff from fertilizer use</td></tr>\
        </table></body></html>";

    fn write_report(dir: &Path, key: &str, html: &str) {
        let system = dir.join("TX1_TOWN");
        std::fs::create_dir_all(&system).unwrap();
        std::fs::write(system.join(format!("{key}.html")), html).unwrap();
    }

    #[test]
    fn keeps_going_when_one_output_cannot_be_written() {
        let dir = tempfile::tempdir().unwrap();
        write_report(dir.path(), "TX1_2023", REPORT);
        write_report(dir.path(), "TX1_2022", REPORT);
        // A directory where the JSON should go blocks the rename.
        let blocked = dir.path().join("TX1_TOWN").join("TX1_2023.json");
        std::fs::create_dir(&blocked).unwrap();
        std::fs::write(blocked.join("keep"), "x").unwrap();

        let files = find_report_files(dir.path(), "html").unwrap();
        let options = ExtractOptions {
            force: true,
            ..ExtractOptions::default()
        };
        let run = extract_all(files, &options, &null_progress());

        assert_eq!(run.summary.failed_count(), 1);
        assert_eq!(run.summary.failures()[0].0, "TX1_2023");
        assert_eq!(run.summary.succeeded_count(), 1);
        assert!(dir.path().join("TX1_TOWN").join("TX1_2022.json").is_file());
    }

    #[test]
    fn skips_existing_json_and_deletes_markup_on_request() {
        let dir = tempfile::tempdir().unwrap();
        write_report(dir.path(), "TX1_2023", REPORT);
        write_report(dir.path(), "TX1_2022", "<html><body><p>nothing</p></body></html>");
        let system = dir.path().join("TX1_TOWN");
        std::fs::write(system.join("TX1_2023.json"), "{}").unwrap();
        std::fs::create_dir(system.join("TX1_2022_files")).unwrap();

        let files = find_report_files(dir.path(), "html").unwrap();
        let options = ExtractOptions {
            delete_html: true,
            ..ExtractOptions::default()
        };
        let run = extract_all(files, &options, &null_progress());

        assert_eq!(run.summary.skipped_count(), 1);
        assert_eq!(run.summary.succeeded_count(), 1);
        assert_eq!(run.no_data, 1);
        assert!(!system.join("TX1_2022.html").exists());
        assert!(!system.join("TX1_2022_files").exists());
        assert!(system.join("TX1_2023.html").exists());
    }
}
