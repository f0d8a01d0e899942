//! # md2pdf
//!
//! Convert Markdown documents with embedded Mermaid diagrams into a styled
//! HTML preview and a paginated PDF.
//!
//! ## Why this crate?
//!
//! Markdown renderers leave ` ```mermaid ` fences as code blocks, and the
//! usual fix (running Mermaid in the viewer's browser) does not survive a
//! print-to-PDF: diagrams are missing, cut across pages or load after the
//! snapshot. This crate renders every diagram to SVG ahead of time, inlines
//! it into a self-contained HTML document with print-aware page-break rules,
//! and only then hands the document to a headless browser for pagination.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Markdown
//!  │
//!  ├─ 1. Extract   pull diagram fences out, leave unique placeholders
//!  ├─ 2. Render    concurrent mmdc calls, one private temp dir each
//!  ├─ 3. Markup    pulldown-cmark (GFM) → HTML fragment
//!  ├─ 4. Assemble  placeholders → SVG or error box, styled HTML shell
//!  └─ 5. Layout    headless Chromium --print-to-pdf → PDF bytes
//! ```
//!
//! A diagram that fails to render never fails the document: it becomes an
//! inline error box and is counted in `stats.failed_diagrams`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use md2pdf::{convert_to_pdf, ConversionConfig, DocumentOptions};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // mmdc and Chromium are located from MD2PDF_MMDC / MD2PDF_CHROMIUM,
//!     // ./node_modules/.bin or PATH.
//!     let config = ConversionConfig::default();
//!     let markdown = std::fs::read_to_string("plan.md")?;
//!     let pdf = convert_to_pdf(
//!         &markdown,
//!         &config,
//!         &DocumentOptions::default(),
//!         &CancellationToken::new(),
//!     )
//!     .await?;
//!     std::fs::write(&pdf.filename, &pdf.bytes)?;
//!     eprintln!("{} diagram(s) failed", pdf.stats.failed_diagrams);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `md2pdf` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `server` | off     | Enables the `md2pdf-server` binary and [`server`] module (axum + tower-http) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! md2pdf = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod options;
pub mod output;
pub mod pipeline;
pub mod progress;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder};
pub use convert::{convert_sync, convert_to_file, convert_to_pdf, render_html, write_atomic};
pub use error::{DiagramError, Md2PdfError};
pub use options::{DocumentOptions, Margins, PageFormat, RawDocumentOptions};
pub use output::{ConversionOutput, ConversionStats, PdfOutput, RenderOutcome, RenderResult};
pub use pipeline::extract::{extract, DiagramBlock, Extraction};
pub use pipeline::layout::{ChromiumPdf, FixedLayoutGenerator};
pub use pipeline::render::{DiagramRenderer, MermaidCli, UnavailableRenderer};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
