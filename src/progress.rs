//! Progress-callback trait for per-block extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as the scheduler works through a document's blocks.
//!
//! # Example
//!
//! ```rust
//! use edgequake_docextract::{ExtractionConfig, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct Counter(AtomicUsize);
//!
//! impl ExtractionProgressCallback for Counter {
//!     fn on_block_complete(&self, _block_index: usize, total: usize, _text_len: usize) {
//!         let done = self.0.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("{done}/{total} blocks");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(Counter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the block scheduler while a job runs.
///
/// All methods default to no-ops. Blocks finish out of order, so
/// `block_index` values arrive unsorted.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before the first block is dispatched.
    fn on_extraction_start(&self, total_blocks: usize) {
        let _ = total_blocks;
    }

    /// A block's text came back from the model (or was taken verbatim).
    fn on_block_complete(&self, block_index: usize, total_blocks: usize, text_len: usize) {
        let _ = (block_index, total_blocks, text_len);
    }

    /// A block fell back to its OCR text after retries ran out.
    fn on_block_error(&self, block_index: usize, total_blocks: usize, error: &str) {
        let _ = (block_index, total_blocks, error);
    }

    /// The adaptive concurrency window changed size.
    fn on_concurrency_change(&self, previous: usize, current: usize) {
        let _ = (previous, current);
    }

    /// Called once after every block has a result.
    fn on_extraction_complete(&self, total_blocks: usize, succeeded: usize) {
        let _ = (total_blocks, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Tracking {
        completes: AtomicUsize,
        errors: AtomicUsize,
        last_window: AtomicUsize,
    }

    impl ExtractionProgressCallback for Tracking {
        fn on_block_complete(&self, _i: usize, _t: usize, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_block_error(&self, _i: usize, _t: usize, _e: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_concurrency_change(&self, _previous: usize, current: usize) {
            self.last_window.store(current, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start(3);
        cb.on_block_complete(0, 3, 10);
        cb.on_block_error(1, 3, "boom");
        cb.on_concurrency_change(5, 3);
        cb.on_extraction_complete(3, 2);
    }

    #[test]
    fn overridden_methods_receive_events() {
        let t = Tracking::default();
        t.on_block_complete(0, 2, 5);
        t.on_block_error(1, 2, "rate limited");
        t.on_concurrency_change(5, 3);
        assert_eq!(t.completes.load(Ordering::SeqCst), 1);
        assert_eq!(t.errors.load(Ordering::SeqCst), 1);
        assert_eq!(t.last_window.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn arc_dyn_callback_is_send_sync() {
        fn assert_send_sync<T: Send + Sync + ?Sized>() {}
        assert_send_sync::<dyn ExtractionProgressCallback>();
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_extraction_start(1);
    }
}
