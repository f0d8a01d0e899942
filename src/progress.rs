//! Progress-callback trait for per-diagram conversion events.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to receive
//! events as the renderer works through a document's diagrams.
//!
//! Callers can forward events to a terminal progress bar, a log, or a
//! channel without the library knowing how the host application reports
//! progress. The trait is `Send + Sync` because diagrams render concurrently.
//!
//! # Example
//!
//! ```rust
//! use md2pdf::{ConversionProgressCallback, ConversionConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     failed: AtomicUsize,
//! }
//!
//! impl ConversionProgressCallback for CountingCallback {
//!     fn on_diagram_error(&self, ordinal: usize, total: usize, error: &str) {
//!         self.failed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("diagram {}/{} failed: {}", ordinal + 1, total, error);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { failed: AtomicUsize::new(0) });
//!
//! let config = ConversionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ConversionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the diagram renderer as it processes each diagram.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
///
/// # Thread safety
///
/// `on_diagram_start`, `on_diagram_complete`, and `on_diagram_error` may be
/// called concurrently and out of order. Implementations must protect shared
/// mutable state (e.g. `Mutex`, `AtomicUsize`).
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once before any diagram is rendered.
    ///
    /// # Arguments
    /// * `total_diagrams`: number of diagram blocks found in the document
    fn on_conversion_start(&self, total_diagrams: usize) {
        let _ = total_diagrams;
    }

    /// Called just before the renderer is invoked for a diagram.
    ///
    /// # Arguments
    /// * `ordinal`: 0-based position of the diagram in the document
    /// * `total`  : total diagrams in the document
    fn on_diagram_start(&self, ordinal: usize, total: usize) {
        let _ = (ordinal, total);
    }

    /// Called when a diagram rendered successfully.
    ///
    /// # Arguments
    /// * `ordinal`: 0-based position of the diagram
    /// * `total`  : total diagrams
    /// * `svg_len`: byte length of the produced SVG
    fn on_diagram_complete(&self, ordinal: usize, total: usize, svg_len: usize) {
        let _ = (ordinal, total, svg_len);
    }

    /// Called when a diagram failed; the document still converts.
    ///
    /// # Arguments
    /// * `ordinal`: 0-based position of the diagram
    /// * `total`  : total diagrams
    /// * `error`  : human-readable failure reason
    fn on_diagram_error(&self, ordinal: usize, total: usize, error: &str) {
        let _ = (ordinal, total, error);
    }

    /// Called once after every diagram has settled.
    ///
    /// # Arguments
    /// * `total_diagrams`: total diagrams in the document
    /// * `success_count` : diagrams that rendered without error
    fn on_conversion_complete(&self, total_diagrams: usize, success_count: usize) {
        let _ = (total_diagrams, success_count);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
