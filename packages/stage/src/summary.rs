//! Per-stage outcome counters.
//!
//! Every stage processes a batch of independent items (documents, reports,
//! systems) and must finish the batch even when some items fail. A
//! [`StageSummary`] counts each item's outcome, prints the counts and
//! failure reasons at the end, and turns them into the process exit code.

use std::process::ExitCode;

/// Exit code for a run where some items failed but the batch completed.
pub const PARTIAL_FAILURE_EXIT: u8 = 2;

/// How many failure reasons are echoed in the printed summary.
const MAX_LISTED_FAILURES: usize = 20;

/// Counts of item outcomes for one stage run.
#[derive(Debug, Clone, Default)]
pub struct StageSummary {
    stage: String,
    succeeded: u64,
    skipped: u64,
    failed: u64,
    failures: Vec<(String, String)>,
}

impl StageSummary {
    /// Creates an empty summary for the named stage.
    #[must_use]
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            ..Self::default()
        }
    }

    /// Records a success.
    pub const fn succeeded(&mut self) {
        self.succeeded += 1;
    }

    /// Records a skipped item.
    pub const fn skipped(&mut self) {
        self.skipped += 1;
    }

    /// Records a failure with its reason.
    pub fn failed(&mut self, item: &str, reason: impl Into<String>) {
        self.failed += 1;
        self.failures.push((item.to_string(), reason.into()));
    }

    /// Number of succeeded items.
    #[must_use]
    pub const fn succeeded_count(&self) -> u64 {
        self.succeeded
    }

    /// Number of skipped items.
    #[must_use]
    pub const fn skipped_count(&self) -> u64 {
        self.skipped
    }

    /// Number of failed items.
    #[must_use]
    pub const fn failed_count(&self) -> u64 {
        self.failed
    }

    /// Item/reason pairs for every failure, in the order they occurred.
    #[must_use]
    pub fn failures(&self) -> &[(String, String)] {
        &self.failures
    }

    /// Whether any item failed.
    #[must_use]
    pub const fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Renders the summary block printed at the end of a run.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = format!(
            "{} summary: {} succeeded, {} skipped, {} failed",
            self.stage, self.succeeded, self.skipped, self.failed
        );
        for (item, reason) in self.failures.iter().take(MAX_LISTED_FAILURES) {
            out.push_str(&format!("\n  failed {item}: {reason}"));
        }
        if self.failures.len() > MAX_LISTED_FAILURES {
            out.push_str(&format!(
                "\n  ... and {} more",
                self.failures.len() - MAX_LISTED_FAILURES
            ));
        }
        out
    }

    /// Prints the summary to stdout and logs it.
    pub fn print(&self) {
        log::info!(
            "{}: {} succeeded, {} skipped, {} failed",
            self.stage,
            self.succeeded,
            self.skipped,
            self.failed
        );
        println!();
        println!("{}", self.render());
    }

    /// `0` when nothing failed, [`PARTIAL_FAILURE_EXIT`] otherwise.
    #[must_use]
    pub fn exit_code(&self) -> ExitCode {
        if self.has_failures() {
            ExitCode::from(PARTIAL_FAILURE_EXIT)
        } else {
            ExitCode::SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_each_outcome() {
        let mut summary = StageSummary::new("extract");
        summary.succeeded();
        summary.skipped();
        summary.failed("c", "no table");
        summary.succeeded();

        assert_eq!(summary.succeeded_count(), 2);
        assert_eq!(summary.skipped_count(), 1);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.failures(), &[("c".to_string(), "no table".to_string())]);
    }

    #[test]
    fn render_lists_failures() {
        let mut summary = StageSummary::new("scrape");
        summary.failed("TX1_2023", "HTTP 500");
        let text = summary.render();
        assert!(text.starts_with("scrape summary: 0 succeeded, 0 skipped, 1 failed"));
        assert!(text.contains("failed TX1_2023: HTTP 500"));
    }

    #[test]
    fn clean_run_has_no_failures() {
        let mut summary = StageSummary::new("compile");
        summary.succeeded();
        assert!(!summary.has_failures());
    }
}
