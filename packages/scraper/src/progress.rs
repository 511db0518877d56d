//! Progress reporting for fetch runs.
//!
//! The orchestrator reports one unit of progress per fetched page. The CLI
//! renders it with `indicatif`; library callers and tests pass
//! [`null_progress`].

use std::sync::Arc;

/// Receives progress updates from a long-running fetch.
pub trait ProgressCallback: Send + Sync {
    /// Sets the total number of units.
    fn set_total(&self, total: u64);

    /// Advances progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Updates the message shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks progress as complete with a final message.
    fn finish(&self, msg: String);
}

/// A [`ProgressCallback`] that ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
