//! Conversion entry points.
//!
//! [`render_html`] runs extraction, diagram rendering and assembly and stops
//! at a self-contained HTML document (the preview). [`convert_to_pdf`] goes
//! one step further through the fixed-layout generator. Both take a
//! [`CancellationToken`]; once it fires they return
//! [`Md2PdfError::Cancelled`] and never hand back a stale document.

use crate::config::ConversionConfig;
use crate::error::Md2PdfError;
use crate::options::DocumentOptions;
use crate::output::{ConversionOutput, ConversionStats, PdfOutput};
use crate::pipeline::assemble::assemble;
use crate::pipeline::extract::extract_with_language;
use crate::pipeline::layout::{ChromiumPdf, FixedLayoutGenerator};
use crate::pipeline::render::{render_all, DiagramRenderer, MermaidCli, UnavailableRenderer};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reject input the pipeline should never see.
///
/// Only zero-length input is empty; whitespace-only input converts to a
/// blank document. `max_bytes` is compared against the UTF-8 length.
pub fn validate_markdown(markdown: &str, max_bytes: usize) -> Result<(), Md2PdfError> {
    if markdown.is_empty() {
        return Err(Md2PdfError::EmptyInput);
    }
    if markdown.len() > max_bytes {
        return Err(Md2PdfError::InputTooLarge {
            len: markdown.len(),
            max: max_bytes,
        });
    }
    Ok(())
}

/// Render Markdown to a complete HTML document with diagrams inlined.
///
/// # Returns
/// `Ok(ConversionOutput)` even if some diagrams failed; check
/// `output.stats.failed_diagrams`.
///
/// # Errors
/// Only fatal errors: invalid input, a lost placeholder, or cancellation.
/// A missing `mmdc` is not fatal; every diagram becomes an error box.
pub async fn render_html(
    markdown: &str,
    config: &ConversionConfig,
    options: &DocumentOptions,
    cancel: &CancellationToken,
) -> Result<ConversionOutput, Md2PdfError> {
    let total_start = Instant::now();
    validate_markdown(markdown, config.max_input_bytes)?;
    if cancel.is_cancelled() {
        return Err(Md2PdfError::Cancelled);
    }

    // ── Step 1: Extract diagram blocks ───────────────────────────────────
    let extraction = extract_with_language(markdown, &config.diagram_language);
    let total = extraction.blocks.len();
    info!("Found {} {} diagram(s)", total, config.diagram_language);

    // ── Step 2: Render diagrams ──────────────────────────────────────────
    let render_start = Instant::now();
    let diagrams = if extraction.is_empty() {
        if let Some(ref cb) = config.progress_callback {
            cb.on_conversion_start(0);
            cb.on_conversion_complete(0, 0);
        }
        Vec::new()
    } else {
        let renderer = resolve_renderer(config)?;
        render_all(&extraction.blocks, &renderer, config, cancel).await?
    };
    let render_duration_ms = render_start.elapsed().as_millis() as u64;

    if cancel.is_cancelled() {
        return Err(Md2PdfError::Cancelled);
    }

    // ── Step 3: Assemble the document ────────────────────────────────────
    let html = assemble(&extraction.rewritten, &diagrams, options)?;

    let failed = diagrams.iter().filter(|d| d.is_failure()).count();
    let stats = ConversionStats {
        total_diagrams: total,
        rendered_diagrams: total - failed,
        failed_diagrams: failed,
        render_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    if failed > 0 {
        warn!("{} of {} diagram(s) could not be rendered", failed, total);
    }
    info!(
        "HTML ready: {} bytes, {}/{} diagrams, {}ms",
        html.len(),
        stats.rendered_diagrams,
        total,
        stats.total_duration_ms
    );

    Ok(ConversionOutput {
        html,
        diagrams,
        stats,
    })
}

/// Convert Markdown all the way to PDF bytes.
pub async fn convert_to_pdf(
    markdown: &str,
    config: &ConversionConfig,
    options: &DocumentOptions,
    cancel: &CancellationToken,
) -> Result<PdfOutput, Md2PdfError> {
    let total_start = Instant::now();
    // Fail before rendering diagrams if no browser is available.
    let layout = resolve_layout(config)?;

    let output = render_html(markdown, config, options, cancel).await?;

    info!("Generating PDF with {}", layout.name());
    let bytes = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Err(Md2PdfError::Cancelled),
        bytes = layout.generate(&output.html, options) => bytes?,
    };

    let mut stats = output.stats;
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "PDF ready: {} bytes in {}ms",
        bytes.len(),
        stats.total_duration_ms
    );

    Ok(PdfOutput {
        bytes,
        filename: options.output_filename.clone(),
        stats,
    })
}

/// Convert a Markdown file and write the PDF to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn convert_to_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &ConversionConfig,
    options: &DocumentOptions,
) -> Result<ConversionStats, Md2PdfError> {
    let markdown = read_markdown(input_path.as_ref()).await?;
    let pdf = convert_to_pdf(&markdown, config, options, &CancellationToken::new()).await?;
    write_atomic(output_path.as_ref(), &pdf.bytes).await?;
    Ok(pdf.stats)
}

/// Synchronous wrapper around [`convert_to_pdf`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    markdown: &str,
    config: &ConversionConfig,
    options: &DocumentOptions,
) -> Result<PdfOutput, Md2PdfError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Md2PdfError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert_to_pdf(markdown, config, options, &CancellationToken::new()))
}

/// Read a UTF-8 Markdown file.
pub async fn read_markdown(path: &Path) -> Result<String, Md2PdfError> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Md2PdfError::InputNotFound {
                path: path.to_path_buf(),
            }
        } else {
            Md2PdfError::InputRead {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}

/// Write `contents` to `path` via a sibling temp file and a rename, so
/// readers never observe a partial file.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), Md2PdfError> {
    let write_err = |source: std::io::Error| Md2PdfError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = temp_sibling(path);
    tokio::fs::write(&tmp_path, contents).await.map_err(write_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(write_err(e));
    }
    debug!(path = %path.display(), bytes = contents.len(), "output written");
    Ok(())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    path.with_file_name(format!(".{name}.{}.tmp", std::process::id()))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Resolve the diagram renderer, from most-specific to least-specific:
///
/// 1. **Pre-built renderer** (`config.renderer`): used as-is; this is how
///    tests and embedders plug in their own implementation.
/// 2. **Mermaid CLI**: `config.mmdc_path` if set, otherwise located by
///    [`external_tools::mmdc_path`] (env override, `node_modules/.bin`, `PATH`).
///
/// When `mmdc` cannot be located the result is an [`UnavailableRenderer`]
/// carrying the lookup error, so each diagram reports it as its failure reason.
pub fn resolve_renderer(config: &ConversionConfig) -> Result<Arc<dyn DiagramRenderer>, Md2PdfError> {
    if let Some(ref renderer) = config.renderer {
        return Ok(Arc::clone(renderer));
    }
    renderer_or_unavailable(MermaidCli::from_config(config))
}

fn renderer_or_unavailable(
    cli: Result<MermaidCli, Md2PdfError>,
) -> Result<Arc<dyn DiagramRenderer>, Md2PdfError> {
    match cli {
        Ok(cli) => Ok(Arc::new(cli)),
        Err(Md2PdfError::ToolNotFound(e)) => {
            warn!("Diagrams will render as errors: {e}");
            Ok(Arc::new(UnavailableRenderer::new(e.to_string())))
        }
        Err(e) => Err(e),
    }
}

/// Resolve the fixed-layout generator: `config.layout`, else headless Chromium.
pub fn resolve_layout(config: &ConversionConfig) -> Result<Arc<dyn FixedLayoutGenerator>, Md2PdfError> {
    if let Some(ref layout) = config.layout {
        return Ok(Arc::clone(layout));
    }
    Ok(Arc::new(ChromiumPdf::from_config(config)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_markdown() {
        assert!(matches!(validate_markdown("", 10), Err(Md2PdfError::EmptyInput)));
        assert!(validate_markdown(" \n\t", 10).is_ok());
        assert!(matches!(
            validate_markdown("# too long", 5),
            Err(Md2PdfError::InputTooLarge { len: 10, max: 5 })
        ));
        assert!(validate_markdown("# ok", 500_000).is_ok());
    }

    #[test]
    fn test_temp_sibling_stays_in_directory() {
        let tmp = temp_sibling(Path::new("/out/dir/report.pdf"));
        assert_eq!(tmp.parent(), Some(Path::new("/out/dir")));
        assert!(tmp.to_string_lossy().ends_with(".tmp"));
    }

    #[tokio::test]
    async fn test_write_atomic_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/out.pdf");
        write_atomic(&path, b"%PDF-1.7").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF-1.7");
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_read_markdown_missing() {
        let err = read_markdown(Path::new("/definitely/not/here.md")).await.unwrap_err();
        assert!(matches!(err, Md2PdfError::InputNotFound { .. }));
    }

    #[tokio::test]
    async fn test_no_diagrams_needs_no_renderer() {
        // No mmdc is configured or required for plain Markdown.
        let config = ConversionConfig::builder()
            .mmdc_path("/nonexistent/mmdc")
            .build()
            .unwrap();
        let out = render_html("# Plain\n\nText.", &config, &DocumentOptions::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(out.html.contains("<h1>Plain</h1>"));
        assert_eq!(out.stats.total_diagrams, 0);
    }

    fn missing_mmdc() -> Md2PdfError {
        Md2PdfError::ToolNotFound(external_tools::LocateError::NotFound {
            tool: "mmdc",
            env_var: "MD2PDF_MMDC",
            candidates: Vec::new(),
            hint: "Install it with `npm install -g @mermaid-js/mermaid-cli`.",
        })
    }

    #[test]
    fn test_missing_mmdc_becomes_unavailable_renderer() {
        let renderer = renderer_or_unavailable(Err(missing_mmdc())).unwrap();
        assert_eq!(renderer.name(), "unavailable");

        let err = renderer_or_unavailable(Err(Md2PdfError::Internal("boom".into())));
        assert!(matches!(err, Err(Md2PdfError::Internal(_))));
    }

    #[tokio::test]
    async fn test_missing_mmdc_still_returns_document() {
        let renderer = renderer_or_unavailable(Err(missing_mmdc())).unwrap();
        let config = ConversionConfig::builder().renderer(renderer).build().unwrap();
        let md = "# Plan\n\n```mermaid\ngraph TD\nA-->B\n```\n\nAfter.\n";

        let out = render_html(md, &config, &DocumentOptions::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(out.stats.failed_diagrams, 1);
        assert!(out.html.contains(r#"class="mermaid-error""#));
        assert!(out.html.contains("mmdc"));
        assert!(out.html.contains("<p>After.</p>"));
    }

    #[tokio::test]
    async fn test_pre_cancelled_token() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = render_html("# x", &ConversionConfig::default(), &DocumentOptions::default(), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
