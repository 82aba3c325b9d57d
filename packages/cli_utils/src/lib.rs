#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing shared by the pipeline binaries.
//!
//! [`init_logger`] installs a `pretty_env_logger` logger behind
//! `indicatif-log-bridge`, so log lines and progress bars can share the
//! terminal. [`IndicatifProgress`] renders a stage's progress through the
//! [`ProgressCallback`] trait.

use std::sync::Arc;
use std::time::Duration;

use ccr_map_stage::progress::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info";

const SPINNER_TEMPLATE: &str = "{spinner:.cyan} {msg}";
const ITEMS_TEMPLATE: &str = "  {msg} {wide_bar:.cyan/dim} {pos}/{len} {percent}% [{eta}]";

fn bar_style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// An `indicatif` [`ProgressBar`] that implements [`ProgressCallback`].
pub struct IndicatifProgress {
    bar: ProgressBar,
    /// Style applied once `set_total()` provides a known length.
    bar_style: ProgressStyle,
}

impl IndicatifProgress {
    /// A bar for a batch whose size is only known after discovery
    /// (queued downloads, documents to convert, reports to extract). Spins
    /// until [`ProgressCallback::set_total()`] is called.
    #[must_use]
    pub fn items_bar(multi: &MultiProgress, message: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.to_string());
        Arc::new(Self {
            bar,
            bar_style: bar_style(ITEMS_TEMPLATE),
        })
    }
}

impl ProgressCallback for IndicatifProgress {
    fn set_total(&self, total: u64) {
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(self.bar_style.clone());
    }

    fn inc(&self, delta: u64) {
        self.bar.inc(delta);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.finish_with_message(msg);
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge`.
///
/// The filter comes from `RUST_LOG`, defaulting to `info`. Returns the
/// [`MultiProgress`] every progress bar must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());
    let logger = pretty_env_logger::formatted_builder()
        .parse_filters(&filter)
        .build();
    let level = logger.filter();

    // Already initialized when several tests share a process.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}
