//! Stage progress reporting.
//!
//! Batch loops report through [`ProgressCallback`] so they stay free of
//! terminal concerns. Binaries pass an `indicatif` bar from
//! `ccr_map_cli_utils`; tests pass [`null_progress`].

use std::sync::Arc;

/// Receives progress from a batch loop, one unit per item.
///
/// `Send + Sync` so one bar can be shared by every task in a buffered
/// stream.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of items in the batch once it is known.
    fn set_total(&self, total: u64);

    /// Marks `delta` more items as done.
    fn inc(&self, delta: u64);

    /// Shows the item currently being worked on.
    fn set_message(&self, msg: String);

    /// Ends the batch with a closing message.
    fn finish(&self, msg: String);
}

/// Discards all progress.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// A shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
