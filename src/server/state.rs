//! Application state.
//!
//! Shared state for all request handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ConversionConfig;

/// Application state shared across all handlers.
pub struct AppState {
    /// Pipeline configuration (tool paths, concurrency, limits).
    pub(crate) config: Arc<ConversionConfig>,
    /// Time limit for preview requests.
    pub(crate) preview_timeout: Duration,
    /// Time limit for PDF requests.
    pub(crate) pdf_timeout: Duration,
}

impl AppState {
    #[must_use]
    pub fn new(config: Arc<ConversionConfig>, preview_timeout: Duration, pdf_timeout: Duration) -> Self {
        Self {
            config,
            preview_timeout,
            pdf_timeout,
        }
    }

    /// Maximum Markdown size accepted by the API.
    pub(crate) fn max_input_bytes(&self) -> usize {
        self.config.max_input_bytes
    }
}
