//! Progress reporting for batch runs.
//!
//! The command-line tool renders these updates with `indicatif`; tests and
//! library callers pass [`null_progress`].

use std::sync::Arc;

/// Receives one update per partition visited by a batch.
pub trait ProgressCallback: Send + Sync {
    /// Number of partitions the batch will visit.
    fn set_total(&self, total: u64);

    /// Names the partition being processed.
    fn set_message(&self, msg: String);

    /// Counts `delta` more partitions as done.
    fn inc(&self, delta: u64);

    /// Ends the run with a closing line.
    fn finish(&self, msg: String);
}

/// Ignores every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn set_message(&self, _msg: String) {}
    fn inc(&self, _delta: u64) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
