//! Batch progress: observable counters, event callbacks and cancellation.
//!
//! A batch is long-running, so progress is exposed as shared state rather
//! than a return value. [`ProgressHandle`] is cheap to clone; a UI or the CLI
//! polls [`ProgressHandle::snapshot`] while the batch runs. Callers that
//! prefer push events inject an [`Arc<dyn BatchProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`].
//!
//! # Example
//!
//! ```rust
//! use edgequake_extract::{BatchProgressCallback, ExtractionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     failed: AtomicUsize,
//! }
//!
//! impl BatchProgressCallback for CountingCallback {
//!     fn on_document_error(&self, name: &str, error: &str) {
//!         self.failed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{name}: {error}");
//!     }
//! }
//!
//! let config = ExtractionConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { failed: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Batch counters. `completed + failed <= total`; validation mismatches
/// count as completed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchProgress {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    /// Name of the document in flight.
    pub current: Option<String>,
}

impl BatchProgress {
    pub fn processed(&self) -> usize {
        self.completed + self.failed
    }
}

/// Shared, observable progress of the running batch.
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle {
    inner: Arc<Mutex<BatchProgress>>,
}

impl ProgressHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counters.
    pub fn snapshot(&self) -> BatchProgress {
        self.lock().clone()
    }

    pub(crate) fn start(&self, total: usize) {
        *self.lock() = BatchProgress {
            total,
            ..Default::default()
        };
    }

    pub(crate) fn set_current(&self, name: Option<&str>) {
        self.lock().current = name.map(str::to_string);
    }

    pub(crate) fn record_completed(&self) {
        self.lock().completed += 1;
    }

    pub(crate) fn record_failed(&self) {
        self.lock().failed += 1;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BatchProgress> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Called by the orchestrator as it works through a batch.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Documents are processed one at a time, so calls
/// never overlap.
pub trait BatchProgressCallback: Send + Sync {
    /// Called once before the first document.
    fn on_batch_start(&self, total: usize) {
        let _ = total;
    }

    /// Called when a document enters `processing`.
    ///
    /// # Arguments
    /// * `index` — 1-indexed position in the batch
    fn on_document_start(&self, index: usize, total: usize, name: &str) {
        let _ = (index, total, name);
    }

    /// Called when a document reaches `completed`.
    ///
    /// # Arguments
    /// * `validation_errors` — schema violations recorded on the result
    fn on_document_complete(&self, name: &str, validation_errors: usize) {
        let _ = (name, validation_errors);
    }

    /// Called when a document reaches `error`.
    fn on_document_error(&self, name: &str, error: &str) {
        let _ = (name, error);
    }

    /// Called once after the loop ends, including after cancellation.
    fn on_batch_complete(&self, progress: &BatchProgress) {
        let _ = progress;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl BatchProgressCallback for NoopProgressCallback {}

/// Cooperative cancellation, checked by the orchestrator before each document.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
