//! Progress-callback trait for per-file conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ClientConfigBuilder::progress_callback`] to hear about the
//! upload, the response status and every file as it lands on disk.
//!
//! # Example
//!
//! ```rust
//! use convertapi_cli::{ClientConfig, ConversionProgressCallback};
//! use std::path::Path;
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     saved: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_file_saved(&self, path: &Path, bytes: u64) {
//!         self.saved.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{} ({} bytes)", path.display(), bytes);
//!     }
//! }
//!
//! let config = ClientConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { saved: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;
use std::sync::Arc;

/// Called by [`crate::convert::convert`] as the exchange progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events arrive in order from a single task.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once the request body is assembled, before it is sent.
    ///
    /// # Arguments
    /// * `file_count` — file parts in the upload, parameter files included
    fn on_upload_start(&self, file_count: usize) {
        let _ = file_count;
    }

    /// Called when response headers arrive, whatever the status.
    fn on_response(&self, status: u16) {
        let _ = status;
    }

    /// Called after a decoded part has been fully written and closed.
    ///
    /// # Arguments
    /// * `path`  — where the part was written
    /// * `bytes` — bytes written
    fn on_file_saved(&self, path: &Path, bytes: u64) {
        let _ = (path, bytes);
    }

    /// Called once after the closing boundary, with the number of files saved.
    fn on_conversion_complete(&self, saved: usize) {
        let _ = saved;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ClientConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
