//! Error types for the md2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Md2PdfError`] is **fatal**: the conversion cannot produce a document
//!   (empty input, the Markdown pass lost a placeholder, Chromium crashed,
//!   the request was cancelled). Returned as `Err(Md2PdfError)` from the
//!   top-level `convert*` / `render_html` functions.
//!
//! * [`DiagramError`] is **non-fatal**: a single diagram failed to render
//!   but the rest of the document is fine. It never crosses the renderer
//!   boundary; instead it is folded into that diagram's
//!   [`crate::output::RenderResult`] and shows up as an inline error box.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the md2pdf library.
///
/// Diagram-level failures use [`DiagramError`] and are stored in
/// [`crate::output::RenderResult`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Md2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The Markdown source was empty.
    #[error("Markdown cannot be empty.")]
    EmptyInput,

    /// The Markdown source exceeded the accepted size.
    #[error("Markdown is too long ({len} bytes). Max {max} bytes.")]
    InputTooLarge { len: usize, max: usize },

    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'")]
    InputNotFound { path: PathBuf },

    /// Input file exists but could not be read as UTF-8 text.
    #[error("Failed to read input file '{path}': {source}")]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Assembly errors ───────────────────────────────────────────────────
    /// The Markdown pass did not preserve every diagram placeholder.
    #[error("Document assembly failed: {0}")]
    Assembly(String),

    // ── Layout errors ─────────────────────────────────────────────────────
    /// The fixed-layout generator failed to produce a PDF.
    #[error("PDF generation failed: {0}")]
    LayoutFailed(String),

    /// The fixed-layout generator did not finish loading content in time.
    #[error("PDF generation timed out after {}", duration_label(*ms))]
    LayoutTimeout { ms: u64 },

    // ── Tooling errors ────────────────────────────────────────────────────
    /// A required external executable could not be found.
    #[error(transparent)]
    ToolNotFound(#[from] external_tools::LocateError),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Cancellation ──────────────────────────────────────────────────────
    /// The caller cancelled the conversion (timeout or superseding request).
    #[error("Conversion cancelled")]
    Cancelled,

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Md2PdfError {
    /// `true` for [`Md2PdfError::Cancelled`].
    ///
    /// Boundaries report cancellation differently from failure ("timed out"
    /// vs. "failed").
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Md2PdfError::Cancelled)
    }

    /// `true` for errors caused by the caller's input rather than the system.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Md2PdfError::EmptyInput
                | Md2PdfError::InputTooLarge { .. }
                | Md2PdfError::InputNotFound { .. }
                | Md2PdfError::InputRead { .. }
        )
    }
}

/// A non-fatal error for a single diagram.
///
/// Produced by a [`crate::pipeline::render::DiagramRenderer`] and turned into
/// the diagram's failure reason. The conversion continues.
#[derive(Debug, Clone, Error, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum DiagramError {
    /// The private temporary workspace could not be created or written.
    #[error("could not prepare workspace: {detail}")]
    Workspace { detail: String },

    /// The renderer process could not be started.
    #[error("could not start '{program}': {detail}")]
    Spawn { program: String, detail: String },

    /// The renderer process exited unsuccessfully.
    #[error("{program} exited with {}{}", exit_label(*code), stderr_suffix(stderr))]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The renderer process did not finish in time.
    #[error("renderer timed out after {}", duration_label(*ms))]
    Timeout { ms: u64 },

    /// The renderer exited successfully but produced no readable output.
    #[error("no output produced: {detail}")]
    MissingOutput { detail: String },

    /// The renderer produced output that is not an SVG document.
    #[error("invalid output: {detail}")]
    InvalidOutput { detail: String },

    /// Free-form failure from a custom renderer.
    #[error("{0}")]
    Failed(String),
}

/// Whole seconds print as `60s`; anything finer stays in milliseconds.
fn duration_label(ms: u64) -> String {
    if ms >= 1_000 && ms % 1_000 == 0 {
        format!("{}s", ms / 1_000)
    } else {
        format!("{ms}ms")
    }
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "a signal".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {trimmed}")
    }
}
