//! Progress-callback trait for per-file batch events.
//!
//! Pass a `&dyn BatchProgressCallback` to
//! [`crate::convert::convert_files`] to observe a batch as it runs: the CLI
//! drives a progress bar from it, the server logs through
//! [`TracingProgressCallback`].
//!
//! # Example
//!
//! ```rust
//! use edgequake_convert::BatchProgressCallback;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct Counter(AtomicUsize);
//!
//! impl BatchProgressCallback for Counter {
//!     fn on_file_complete(&self, index: usize, total: usize, output: &str) {
//!         let done = self.0.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}/{total}: #{index} → {output}");
//!     }
//! }
//! ```

use tracing::{info, warn};

/// Called as a batch processes each file, in upload order.
///
/// All methods default to no-ops so implementors override only what they
/// need. `index` is 1-based.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first file.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called before a file is dispatched.
    fn on_file_start(&self, index: usize, total: usize, filename: &str) {
        let _ = (index, total, filename);
    }

    /// Called when a file produced `output` (its file name).
    fn on_file_complete(&self, index: usize, total: usize, output: &str) {
        let _ = (index, total, output);
    }

    /// Called when a file failed or timed out.
    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        let _ = (index, total, error);
    }

    /// Called once after every file was attempted.
    fn on_batch_complete(&self, total: usize, converted: usize) {
        let _ = (total, converted);
    }
}

/// Ignores every event.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Logs every event through `tracing`.
pub struct TracingProgressCallback;

impl BatchProgressCallback for TracingProgressCallback {
    fn on_batch_start(&self, total: usize) {
        info!("Batch started: {} files", total);
    }

    fn on_file_complete(&self, index: usize, total: usize, output: &str) {
        info!("[{}/{}] converted → {}", index, total, output);
    }

    fn on_file_error(&self, index: usize, total: usize, error: &str) {
        warn!("[{}/{}] failed: {}", index, total, error);
    }

    fn on_batch_complete(&self, total: usize, converted: usize) {
        info!("Batch finished: {}/{} converted", converted, total);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct TrackingCallback {
        starts: AtomicUsize,
        completes: AtomicUsize,
        errors: AtomicUsize,
        converted_total: AtomicUsize,
    }

    impl BatchProgressCallback for TrackingCallback {
        fn on_file_start(&self, _index: usize, _total: usize, _filename: &str) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_complete(&self, _index: usize, _total: usize, _output: &str) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_file_error(&self, _index: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total: usize, converted: usize) {
            self.converted_total.store(converted, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_file_start(1, 2, "a.png");
        cb.on_file_complete(1, 2, "a.jpg");
        cb.on_file_error(2, 2, "timed out");
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_file_start(1, 2, "a.pdf");
        tracker.on_file_complete(1, 2, "a.xlsx");
        tracker.on_file_start(2, 2, "b.pdf");
        tracker.on_file_error(2, 2, "pdf_to_spreadsheet failed");
        tracker.on_batch_complete(2, 1);

        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.converted_total.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn BatchProgressCallback> = Arc::new(TracingProgressCallback);
        cb.on_batch_start(1);
        cb.on_file_complete(1, 1, "out.xlsx");
    }
}
