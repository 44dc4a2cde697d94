//! Progress reporting for fan-out fetches.
//!
//! [`crate::AcsClient::fetch_table_with_progress`] sets the total to the
//! number of request cells and reports each cell as it completes.
//! Rendering is left to the caller (the CLI wires this to an `indicatif`
//! bar).

use std::sync::Arc;

/// Receives progress updates from a running fetch.
///
/// Implementations must be `Send + Sync`; cells complete concurrently.
pub trait ProgressCallback: Send + Sync {
    /// Set the total expected units of work.
    fn set_total(&self, total: u64);

    /// Advance progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message displayed alongside the progress indicator.
    fn set_message(&self, msg: String);

    /// Mark progress as complete with a final message.
    fn finish(&self, msg: String);

    /// Mark progress as complete and remove the progress indicator.
    fn finish_and_clear(&self);

    /// One (variable, year, location) cell finished. Advances by one unless
    /// overridden.
    fn cell_finished(&self, _variable: &str, _year: u16, _location: &str) {
        self.inc(1);
    }
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
    fn finish_and_clear(&self) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
