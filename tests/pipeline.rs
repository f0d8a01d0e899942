//! Integration tests for the conversion pipeline.
//!
//! The renderer and layout stages are replaced by in-process stubs, so these
//! tests need neither Node nor a browser. The last test drives the real
//! tools and is gated behind `MD2PDF_E2E=1`.
//!
//! Run with:
//!   cargo test --test pipeline
//!   MD2PDF_E2E=1 cargo test --test pipeline e2e -- --nocapture

use async_trait::async_trait;
use md2pdf::{
    convert_to_file, convert_to_pdf, render_html, ConversionConfig, DiagramError,
    DiagramRenderer, DocumentOptions, FixedLayoutGenerator, Md2PdfError, PageFormat,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// Renders `<svg>{source}</svg>`.
///
/// Sources starting with `boom` fail; `sleep:<ms> <tag>` waits before
/// answering so concurrent documents finish out of order.
struct ScriptedRenderer {
    calls: AtomicUsize,
}

impl ScriptedRenderer {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl DiagramRenderer for ScriptedRenderer {
    async fn render(&self, source: &str) -> Result<String, DiagramError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if source.starts_with("boom") {
            return Err(DiagramError::Failed(source.to_string()));
        }
        if let Some(rest) = source.strip_prefix("sleep:") {
            let (ms, tag) = rest.split_once(' ').unwrap_or((rest, ""));
            tokio::time::sleep(Duration::from_millis(ms.parse().unwrap_or(0))).await;
            return Ok(format!("<svg>{tag}</svg>"));
        }
        Ok(format!("<svg>{source}</svg>"))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Never finishes; used to exercise cancellation.
struct StuckRenderer;

#[async_trait]
impl DiagramRenderer for StuckRenderer {
    async fn render(&self, _source: &str) -> Result<String, DiagramError> {
        futures::future::pending::<Result<String, DiagramError>>().await
    }
}

/// Returns a fake PDF that embeds the HTML length and page format.
struct StubLayout;

#[async_trait]
impl FixedLayoutGenerator for StubLayout {
    async fn generate(&self, html: &str, options: &DocumentOptions) -> Result<Vec<u8>, Md2PdfError> {
        Ok(format!("%PDF-1.7 {} {}", options.page_format.name(), html.len()).into_bytes())
    }
}

/// Route library logs to the test harness; `RUST_LOG=md2pdf=debug` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config_with(renderer: Arc<dyn DiagramRenderer>) -> ConversionConfig {
    ConversionConfig::builder()
        .renderer(renderer)
        .layout(Arc::new(StubLayout))
        .build()
        .unwrap()
}

fn mermaid(source: &str) -> String {
    format!("```mermaid\n{source}\n```\n")
}

// ── Scenarios ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_title_diagram_text_in_order() {
    init_tracing();
    let md = format!("# Title\n\n{}\nText.\n", mermaid("ok"));
    let config = config_with(ScriptedRenderer::new());

    let out = render_html(&md, &config, &DocumentOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    let title = out.html.find("<h1>Title</h1>").expect("heading");
    let svg = out.html.find("<svg>ok</svg>").expect("diagram");
    let text = out.html.find("<p>Text.</p>").expect("paragraph");
    assert!(title < svg && svg < text);
    assert!(!out.html.contains("diagram-placeholder-"));
    assert_eq!(out.stats.rendered_diagrams, 1);
    assert!(out.warnings().is_empty());
}

#[tokio::test]
async fn test_failed_diagram_becomes_error_box() {
    let md = format!("Before\n\n{}\nAfter\n", mermaid("boom"));
    let config = config_with(ScriptedRenderer::new());

    let out = render_html(&md, &config, &DocumentOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(out.html.contains(r#"class="mermaid-error""#));
    assert!(out.html.contains("Mermaid render failed: boom"));
    assert!(out.html.contains("<p>Before</p>"));
    assert!(out.html.contains("<p>After</p>"));
    assert_eq!(out.stats.failed_diagrams, 1);
    assert_eq!(out.warnings().len(), 1);
}

#[tokio::test]
async fn test_k_of_n_failures() {
    init_tracing();
    let sources = ["a", "boom 1", "b", "boom 2", "c"];
    let md: String = sources.iter().map(|s| mermaid(s) + "\n").collect();
    let config = config_with(ScriptedRenderer::new());

    let out = render_html(&md, &config, &DocumentOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(out.stats.total_diagrams, 5);
    assert_eq!(out.stats.failed_diagrams, 2);
    assert_eq!(out.stats.rendered_diagrams, 3);
    assert_eq!(out.html.matches(r#"class="mermaid-diagram""#).count(), 3);
    assert_eq!(out.html.matches(r#"class="mermaid-error""#).count(), 2);

    // Successful figures keep document order around the failures.
    let a = out.html.find("<svg>a</svg>").unwrap();
    let b = out.html.find("<svg>b</svg>").unwrap();
    let c = out.html.find("<svg>c</svg>").unwrap();
    assert!(a < b && b < c);
}

#[tokio::test]
async fn test_zero_diagrams_never_calls_renderer() {
    let renderer = ScriptedRenderer::new();
    let config = config_with(renderer.clone());
    let md = "# Plain\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n```rust\nfn main() {}\n```\n";

    let out = render_html(md, &config, &DocumentOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    assert_eq!(out.stats.total_diagrams, 0);
    assert!(out.html.contains("<table>"));
    assert!(out.html.contains("fn main() {}"));
    assert!(!out.html.contains("<figure"));
}

#[tokio::test]
async fn test_concurrent_documents_do_not_mix() {
    let config = Arc::new(config_with(ScriptedRenderer::new()));
    let slow = format!("# Slow\n\n{}\n{}", mermaid("sleep:80 slow-1"), mermaid("sleep:10 slow-2"));
    let fast = format!("# Fast\n\n{}\n{}", mermaid("sleep:5 fast-1"), mermaid("sleep:40 fast-2"));

    let (slow_opts, slow_cancel) = (DocumentOptions::default(), CancellationToken::new());
    let (fast_opts, fast_cancel) = (DocumentOptions::default(), CancellationToken::new());
    let (slow_out, fast_out) = tokio::join!(
        render_html(&slow, &config, &slow_opts, &slow_cancel),
        render_html(&fast, &config, &fast_opts, &fast_cancel),
    );
    let (slow_out, fast_out) = (slow_out.unwrap(), fast_out.unwrap());

    assert!(slow_out.html.contains("<svg>slow-1</svg>"));
    assert!(slow_out.html.contains("<svg>slow-2</svg>"));
    assert!(!slow_out.html.contains("fast-"));
    assert!(fast_out.html.contains("<svg>fast-1</svg>"));
    assert!(fast_out.html.contains("<svg>fast-2</svg>"));
    assert!(!fast_out.html.contains("slow-"));

    let one = slow_out.html.find("slow-1").unwrap();
    let two = slow_out.html.find("slow-2").unwrap();
    assert!(one < two);
}

#[tokio::test]
async fn test_cancellation_returns_cancelled() {
    let config = config_with(Arc::new(StuckRenderer));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let md = mermaid("graph TD\nA-->B");
    let err = tokio::time::timeout(
        Duration::from_secs(5),
        convert_to_pdf(&md, &config, &DocumentOptions::default(), &cancel),
    )
    .await
    .expect("cancellation should end the conversion")
    .unwrap_err();

    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_invalid_input_is_rejected_before_rendering() {
    let renderer = ScriptedRenderer::new();
    let config = ConversionConfig::builder()
        .renderer(renderer.clone())
        .max_input_bytes(16)
        .build()
        .unwrap();
    let cancel = CancellationToken::new();

    let err = render_html("", &config, &DocumentOptions::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Md2PdfError::EmptyInput));

    let err = render_html(&mermaid("far too long for the limit"), &config, &DocumentOptions::default(), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, Md2PdfError::InputTooLarge { .. }));
    assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_whitespace_only_input_is_a_blank_document() {
    let config = config_with(ScriptedRenderer::new());
    let out = render_html(" \n\n ", &config, &DocumentOptions::default(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(out.html.contains("<body>"));
    assert_eq!(out.stats.total_diagrams, 0);
}

#[tokio::test]
async fn test_pdf_output_carries_options() {
    let config = config_with(ScriptedRenderer::new());
    let options = DocumentOptions {
        page_format: PageFormat::Letter,
        ..DocumentOptions::default()
    }
    .with_filename("../reports/Q3 plan");

    let pdf = convert_to_pdf("# Report\n", &config, &options, &CancellationToken::new())
        .await
        .unwrap();

    assert!(pdf.bytes.starts_with(b"%PDF"));
    assert!(String::from_utf8_lossy(&pdf.bytes).contains("Letter"));
    assert_eq!(pdf.filename, "Q3_plan.pdf");
}

#[tokio::test]
async fn test_convert_to_file_writes_output() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("plan.md");
    let output = dir.path().join("out/plan.pdf");
    std::fs::write(&input, format!("# Plan\n\n{}", mermaid("ok"))).unwrap();

    let config = config_with(ScriptedRenderer::new());
    let stats = convert_to_file(&input, &output, &config, &DocumentOptions::default())
        .await
        .unwrap();

    assert_eq!(stats.total_diagrams, 1);
    let bytes = std::fs::read(&output).unwrap();
    assert!(bytes.starts_with(b"%PDF"));
}

#[test]
fn test_render_html_blocking() {
    let config = config_with(ScriptedRenderer::new());
    let out = tokio_test::block_on(render_html(
        &mermaid("ok"),
        &config,
        &DocumentOptions::default(),
        &CancellationToken::new(),
    ))
    .unwrap();
    assert!(out.html.contains("<svg>ok</svg>"));
}

#[test]
fn test_convert_sync_without_runtime() {
    let config = config_with(ScriptedRenderer::new());
    let pdf = md2pdf::convert_sync("# Sync\n", &config, &DocumentOptions::default()).unwrap();
    assert!(pdf.bytes.starts_with(b"%PDF"));
    assert_eq!(pdf.filename, "document.pdf");
}

// ── Real tools ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_real_mmdc_and_chromium() {
    if std::env::var("MD2PDF_E2E").is_err() {
        println!("SKIP: set MD2PDF_E2E=1 to run against real mmdc and Chromium");
        return;
    }
    let md = include_str!("../assets/sample.plan.md");
    let config = ConversionConfig::default();

    let pdf = convert_to_pdf(md, &config, &DocumentOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    println!(
        "PDF: {} bytes, {}/{} diagrams rendered in {}ms",
        pdf.bytes.len(),
        pdf.stats.rendered_diagrams,
        pdf.stats.total_diagrams,
        pdf.stats.total_duration_ms
    );
    assert!(pdf.bytes.starts_with(b"%PDF"));
    assert_eq!(pdf.stats.failed_diagrams, 0);
}
