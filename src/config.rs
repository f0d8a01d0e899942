//! Process-level configuration for Markdown-to-PDF conversion.
//!
//! [`ConversionConfig`] holds everything that stays the same across requests:
//! where the helper tools live, timeouts, the concurrency cap and optional
//! pre-built renderer / layout implementations. Per-request choices (page
//! size, margins, filename) live in [`crate::options::DocumentOptions`].
//!
//! The config is built once at start-up, wrapped in an `Arc` by the server,
//! and only ever read afterwards, so concurrent conversions share no mutable
//! state through it.

use crate::error::Md2PdfError;
use crate::pipeline::layout::FixedLayoutGenerator;
use crate::pipeline::render::DiagramRenderer;
use crate::progress::ProgressCallback;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Largest Markdown source accepted by the boundaries, in bytes.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 500_000;

/// Configuration shared by every conversion in a process.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use md2pdf::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .max_concurrent_renders(4)
///     .render_timeout_secs(30)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Explicit path to `mmdc`. If None, located by [`external_tools::mmdc_path`].
    pub mmdc_path: Option<PathBuf>,

    /// Explicit path to Chromium. If None, located by [`external_tools::chromium_path`].
    pub chromium_path: Option<PathBuf>,

    /// Directory searched for `node_modules/.bin/mmdc` and
    /// `puppeteer-config.json`. If None, the current directory.
    pub tools_root: Option<PathBuf>,

    /// Puppeteer config passed to mmdc with `-p`. If None, looked up in
    /// `tools_root`.
    pub puppeteer_config: Option<PathBuf>,

    /// Parent directory for per-diagram workspaces. If None, the system temp dir.
    pub temp_root: Option<PathBuf>,

    /// Fence info-string identifying diagram blocks. Default: `mermaid`.
    pub diagram_language: String,

    /// Maximum diagrams rendered at once within one document. Default: 8.
    ///
    /// Each render is a separate Chromium-backed process; a document with
    /// hundreds of diagrams would otherwise spawn hundreds of browsers.
    pub max_concurrent_renders: usize,

    /// Per-diagram renderer timeout in seconds. Default: 60.
    pub render_timeout_secs: u64,

    /// Content-load timeout for PDF generation in seconds. Default: 30.
    pub layout_timeout_secs: u64,

    /// Largest accepted Markdown source in bytes. Default: 500 000.
    pub max_input_bytes: usize,

    /// Pre-constructed diagram renderer. Takes precedence over `mmdc_path`.
    pub renderer: Option<Arc<dyn DiagramRenderer>>,

    /// Pre-constructed layout generator. Takes precedence over `chromium_path`.
    pub layout: Option<Arc<dyn FixedLayoutGenerator>>,

    /// Optional per-diagram progress callback.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            mmdc_path: None,
            chromium_path: None,
            tools_root: None,
            puppeteer_config: None,
            temp_root: None,
            diagram_language: "mermaid".to_string(),
            max_concurrent_renders: 8,
            render_timeout_secs: 60,
            layout_timeout_secs: 30,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            renderer: None,
            layout: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("mmdc_path", &self.mmdc_path)
            .field("chromium_path", &self.chromium_path)
            .field("tools_root", &self.tools_root)
            .field("puppeteer_config", &self.puppeteer_config)
            .field("temp_root", &self.temp_root)
            .field("diagram_language", &self.diagram_language)
            .field("max_concurrent_renders", &self.max_concurrent_renders)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("layout_timeout_secs", &self.layout_timeout_secs)
            .field("max_input_bytes", &self.max_input_bytes)
            .field("renderer", &self.renderer.as_ref().map(|r| r.name().to_string()))
            .field("layout", &self.layout.as_ref().map(|_| "<dyn FixedLayoutGenerator>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl fmt::Debug for ConversionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ConversionConfigBuilder {
    pub fn mmdc_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.mmdc_path = Some(path.into());
        self
    }

    pub fn chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chromium_path = Some(path.into());
        self
    }

    pub fn tools_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tools_root = Some(path.into());
        self
    }

    pub fn puppeteer_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.puppeteer_config = Some(path.into());
        self
    }

    pub fn temp_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.temp_root = Some(path.into());
        self
    }

    pub fn diagram_language(mut self, lang: impl Into<String>) -> Self {
        self.config.diagram_language = lang.into();
        self
    }

    pub fn max_concurrent_renders(mut self, n: usize) -> Self {
        self.config.max_concurrent_renders = n.max(1);
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn layout_timeout_secs(mut self, secs: u64) -> Self {
        self.config.layout_timeout_secs = secs;
        self
    }

    pub fn max_input_bytes(mut self, n: usize) -> Self {
        self.config.max_input_bytes = n;
        self
    }

    pub fn renderer(mut self, renderer: Arc<dyn DiagramRenderer>) -> Self {
        self.config.renderer = Some(renderer);
        self
    }

    pub fn layout(mut self, layout: Arc<dyn FixedLayoutGenerator>) -> Self {
        self.config.layout = Some(layout);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Md2PdfError> {
        let c = &self.config;
        if c.max_concurrent_renders == 0 {
            return Err(Md2PdfError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.render_timeout_secs == 0 || c.layout_timeout_secs == 0 {
            return Err(Md2PdfError::InvalidConfig(
                "Timeouts must be at least 1 second".into(),
            ));
        }
        if c.max_input_bytes == 0 {
            return Err(Md2PdfError::InvalidConfig(
                "Maximum input size must be > 0".into(),
            ));
        }
        let lang = c.diagram_language.trim();
        if lang.is_empty() || lang.contains(char::is_whitespace) {
            return Err(Md2PdfError::InvalidConfig(format!(
                "Diagram language must be a single word, got {:?}",
                c.diagram_language
            )));
        }
        Ok(self.config)
    }
}
