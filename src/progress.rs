//! Progress-callback trait for per-page run events.
//!
//! Inject an [`Arc<dyn RunProgressCallback>`] via
//! [`crate::config::RunConfigBuilder::progress_callback`] to receive events
//! as the driver works through each document and page.
//!
//! # Example
//!
//! ```rust
//! use dc_tables::{RunConfig, RunProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct TableCounter {
//!     tables: AtomicUsize,
//! }
//!
//! impl RunProgressCallback for TableCounter {
//!     fn on_page_complete(&self, _document_id: &str, _page: u32, tables: usize) {
//!         self.tables.fetch_add(tables, Ordering::SeqCst);
//!     }
//! }
//!
//! let config = RunConfig::builder()
//!     .progress_callback(Arc::new(TableCounter { tables: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the driver as it processes each page.
///
/// All methods default to no-ops so callers only override what they need.
pub trait RunProgressCallback: Send + Sync {
    /// Called once after the gate passes, before the first page is fetched.
    ///
    /// # Arguments
    /// * `total_pages`: pages that will be analysed across all documents
    fn on_run_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called before a page image is fetched.
    fn on_page_start(&self, document_id: &str, page: u32) {
        let _ = (document_id, page);
    }

    /// Called after a page has been analysed and shaped.
    ///
    /// # Arguments
    /// * `tables`: number of tables the service found on the page
    fn on_page_complete(&self, document_id: &str, page: u32, tables: usize) {
        let _ = (document_id, page, tables);
    }

    /// Called after a document's export has been added to the archive.
    fn on_document_complete(&self, document_id: &str, tables: usize) {
        let _ = (document_id, tables);
    }

    /// Called once after the archive has been uploaded.
    fn on_run_complete(&self, pages: usize, tables: usize) {
        let _ = (pages, tables);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl RunProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::RunConfig`].
pub type ProgressCallback = Arc<dyn RunProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        started_total: AtomicUsize,
        pages: AtomicUsize,
        tables: AtomicUsize,
        documents: AtomicUsize,
    }

    impl RunProgressCallback for TrackingCallback {
        fn on_run_start(&self, total_pages: usize) {
            self.started_total.store(total_pages, Ordering::SeqCst);
        }

        fn on_page_complete(&self, _document_id: &str, _page: u32, tables: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
            self.tables.fetch_add(tables, Ordering::SeqCst);
        }

        fn on_document_complete(&self, _document_id: &str, _tables: usize) {
            self.documents.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(3);
        cb.on_page_start("1", 1);
        cb.on_page_complete("1", 1, 2);
        cb.on_document_complete("1", 2);
        cb.on_run_complete(3, 2);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_run_start(2);
        tracker.on_page_complete("9", 1, 1);
        tracker.on_page_complete("9", 2, 3);
        tracker.on_document_complete("9", 4);

        assert_eq!(tracker.started_total.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.pages.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.tables.load(Ordering::SeqCst), 4);
        assert_eq!(tracker.documents.load(Ordering::SeqCst), 1);
    }
}
