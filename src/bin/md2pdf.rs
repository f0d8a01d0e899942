//! CLI binary for md2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` / `DocumentOptions` and reports results.

use anyhow::{Context, Result};
use clap::Parser;
use md2pdf::convert::{read_markdown, resolve_layout};
use md2pdf::options::{css_length_or, parse_scale, DEFAULT_MARGIN};
use md2pdf::{
    render_html, write_atomic, ConversionConfig, ConversionProgressCallback, DocumentOptions,
    Margins, PageFormat, ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one bar for the diagram batch, one log line
/// per failed diagram.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:40.green/238}] {pos:>3}/{len} diagrams  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        bar.set_prefix("Rendering");
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_conversion_start(&self, total_diagrams: usize) {
        if total_diagrams == 0 {
            return;
        }
        self.bar.set_length(total_diagrams as u64);
        self.bar.enable_steady_tick(Duration::from_millis(80));
        self.bar
            .println(format!("Rendering {total_diagrams} Mermaid diagram(s)..."));
    }

    fn on_diagram_complete(&self, _ordinal: usize, _total: usize, _svg_len: usize) {
        self.bar.inc(1);
    }

    fn on_diagram_error(&self, ordinal: usize, total: usize, error: &str) {
        let msg: String = if error.chars().count() > 100 {
            format!("{}\u{2026}", error.chars().take(99).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} Diagram {:>3}/{:<3}  {}",
            red("✗"),
            ordinal + 1,
            total,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_conversion_complete(&self, _total_diagrams: usize, _success_count: usize) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Markdown with Mermaid fences to PDF
  md2pdf plan.md plan.pdf

  # US Letter, smaller scale, 1 inch margins
  md2pdf --format letter --scale 1 --margin 1in plan.md plan.pdf

  # Only the self-contained HTML (no browser needed for layout)
  md2pdf --html-only plan.md plan.html

  # Explicit tool locations
  md2pdf --mmdc ./node_modules/.bin/mmdc --chromium /usr/bin/chromium plan.md out.pdf

ENVIRONMENT VARIABLES:
  MD2PDF_MMDC       Path to the Mermaid CLI (mmdc)
  MD2PDF_CHROMIUM   Path to Chromium / Chrome used for PDF layout
  RUST_LOG          Log filter, overrides --verbose / --quiet

SETUP:
  npm install @mermaid-js/mermaid-cli   (provides node_modules/.bin/mmdc)
  Any recent Chromium or Chrome on PATH is used for pagination.
"#;

/// Convert Markdown with Mermaid diagrams to a paginated PDF.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf",
    version,
    about = "Convert Markdown with Mermaid diagrams to PDF",
    long_about = "Render every ```mermaid block to SVG with the Mermaid CLI, inline the \
diagrams into a styled HTML document, and paginate it into a PDF with headless Chromium. \
Diagrams that fail to render become an inline error box; the document still converts.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Markdown input file.
    input: PathBuf,

    /// Output file (PDF, or HTML with --html-only).
    output: PathBuf,

    /// Page format: A0–A6, Letter, Legal, Tabloid, Ledger.
    #[arg(long, env = "MD2PDF_FORMAT", default_value = "A4")]
    format: String,

    /// Print scale, clamped to 0.1–2; invalid values use 2.
    #[arg(long, env = "MD2PDF_SCALE", default_value = "2")]
    scale: String,

    /// Margin on every side as a CSS length (e.g. 20mm, 1in).
    #[arg(long, env = "MD2PDF_MARGIN", default_value = DEFAULT_MARGIN)]
    margin: String,

    /// Maximum diagram width as a CSS length (e.g. 80%, 600px).
    #[arg(long, env = "MD2PDF_DIAGRAM_MAX_WIDTH", default_value = "100%")]
    diagram_max_width: String,

    /// Document title. Default: the input file name.
    #[arg(long)]
    title: Option<String>,

    /// Do not print CSS backgrounds (code blocks, table headers, error boxes).
    #[arg(long)]
    no_background: bool,

    /// Maximum diagrams rendered at once.
    #[arg(short, long, env = "MD2PDF_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Per-diagram render timeout in seconds.
    #[arg(long, env = "MD2PDF_RENDER_TIMEOUT", default_value_t = 60)]
    render_timeout: u64,

    /// Path to the Mermaid CLI.
    #[arg(long, env = "MD2PDF_MMDC")]
    mmdc: Option<PathBuf>,

    /// Path to Chromium / Chrome.
    #[arg(long, env = "MD2PDF_CHROMIUM")]
    chromium: Option<PathBuf>,

    /// Puppeteer config passed to mmdc with -p.
    #[arg(long, env = "MD2PDF_PUPPETEER_CONFIG")]
    puppeteer_config: Option<PathBuf>,

    /// Write the assembled HTML instead of a PDF.
    #[arg(long)]
    html_only: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "MD2PDF_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar and status lines cover normal runs; library INFO logs
    // only show up with --verbose.
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(&cli).await {
        eprintln!("{} {:#}", red("Error:"), e);
        std::process::exit(1);
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let markdown = read_markdown(&cli.input)
        .await
        .context("Failed to read input")?;

    let progress: Option<ProgressCallback> = if cli.quiet {
        None
    } else {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    };
    let config = build_config(cli, progress)?;
    let options = build_options(cli);

    // Locate the browser before spending time on diagrams.
    let layout = if cli.html_only {
        None
    } else {
        Some(resolve_layout(&config).context("PDF generation is unavailable")?)
    };

    let cancel = CancellationToken::new();
    let output = render_html(&markdown, &config, &options, &cancel)
        .await
        .context("Conversion failed")?;

    if output.stats.failed_diagrams > 0 && !cli.quiet {
        eprintln!(
            "{} {} diagram(s) could not be rendered and will show an error placeholder.",
            yellow("Warning:"),
            output.stats.failed_diagrams
        );
    }

    let bytes = match layout {
        None => output.html.into_bytes(),
        Some(layout) => {
            if !cli.quiet {
                eprintln!("Generating PDF...");
            }
            layout
                .generate(&output.html, &options)
                .await
                .context("PDF generation failed")?
        }
    };

    write_atomic(&cli.output, &bytes)
        .await
        .context("Failed to write output")?;

    if !cli.quiet {
        eprintln!(
            "{} Done: {}",
            green("✔"),
            bold(&cli.output.display().to_string())
        );
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .max_concurrent_renders(cli.concurrency)
        .render_timeout_secs(cli.render_timeout);

    if let Some(ref p) = cli.mmdc {
        builder = builder.mmdc_path(p);
    }
    if let Some(ref p) = cli.chromium {
        builder = builder.chromium_path(p);
    }
    if let Some(ref p) = cli.puppeteer_config {
        builder = builder.puppeteer_config(p);
    }
    if let Some(dir) = cli.input.parent().filter(|d| !d.as_os_str().is_empty()) {
        // A project-local node_modules next to the document is preferred.
        if dir.join("node_modules").is_dir() {
            builder = builder.tools_root(dir);
        }
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Map CLI args to per-document options.
fn build_options(cli: &Cli) -> DocumentOptions {
    let title = cli
        .title
        .clone()
        .unwrap_or_else(|| file_title(&cli.input));
    let filename = cli
        .output
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    DocumentOptions {
        page_format: PageFormat::parse_or_default(&cli.format),
        scale: parse_scale(&cli.scale),
        print_background: !cli.no_background,
        margins: Margins::uniform(&css_length_or(&cli.margin, DEFAULT_MARGIN)),
        ..DocumentOptions::default()
    }
    .with_diagram_max_width(&cli.diagram_max_width)
    .with_title(&title)
    .with_filename(&filename)
}

fn file_title(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
