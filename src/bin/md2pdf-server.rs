//! HTTP server binary for md2pdf.
//!
//! Serves the editor UI plus `/api/preview` and `/api/pdf` on top of the
//! library pipeline. Tool paths are resolved once at startup.

use anyhow::{Context, Result};
use clap::Parser;
use md2pdf::server::{run_server, ServerConfig, DEFAULT_PDF_TIMEOUT, DEFAULT_PREVIEW_TIMEOUT};
use md2pdf::ConversionConfig;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Web UI and JSON API for Markdown + Mermaid to PDF conversion.
#[derive(Parser, Debug)]
#[command(
    name = "md2pdf-server",
    version,
    about = "Serve the md2pdf editor UI and conversion API",
    color = clap::ColorChoice::Auto
)]
struct Cli {
    /// Address to bind to.
    #[arg(long, env = "MD2PDF_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = md2pdf::server::DEFAULT_PORT)]
    port: u16,

    /// Maximum diagrams rendered at once per request.
    #[arg(short, long, env = "MD2PDF_CONCURRENCY", default_value_t = 8)]
    concurrency: usize,

    /// Per-diagram render timeout in seconds.
    #[arg(long, env = "MD2PDF_RENDER_TIMEOUT", default_value_t = 60)]
    render_timeout: u64,

    /// Time limit for a whole preview request, in seconds.
    #[arg(long, env = "MD2PDF_PREVIEW_TIMEOUT", default_value_t = DEFAULT_PREVIEW_TIMEOUT.as_secs())]
    preview_timeout: u64,

    /// Time limit for a whole PDF request, in seconds.
    #[arg(long, env = "MD2PDF_PDF_TIMEOUT", default_value_t = DEFAULT_PDF_TIMEOUT.as_secs())]
    pdf_timeout: u64,

    /// Path to the Mermaid CLI.
    #[arg(long, env = "MD2PDF_MMDC")]
    mmdc: Option<PathBuf>,

    /// Path to Chromium / Chrome.
    #[arg(long, env = "MD2PDF_CHROMIUM")]
    chromium: Option<PathBuf>,

    /// Puppeteer config passed to mmdc with -p.
    #[arg(long, env = "MD2PDF_PUPPETEER_CONFIG")]
    puppeteer_config: Option<PathBuf>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "MD2PDF_VERBOSE")]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "md2pdf=debug,tower_http=debug"
    } else {
        "md2pdf=info,tower_http=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut builder = ConversionConfig::builder()
        .max_concurrent_renders(cli.concurrency)
        .render_timeout_secs(cli.render_timeout);
    if let Some(p) = cli.mmdc {
        builder = builder.mmdc_path(p);
    }
    if let Some(p) = cli.chromium {
        builder = builder.chromium_path(p);
    }
    if let Some(p) = cli.puppeteer_config {
        builder = builder.puppeteer_config(p);
    }
    let mut conversion = builder.build().context("Invalid configuration")?;

    // Resolve tools once; every request reuses the same instances.
    conversion.renderer = Some(md2pdf::convert::resolve_renderer(&conversion)?);
    match md2pdf::convert::resolve_layout(&conversion) {
        Ok(layout) => conversion.layout = Some(layout),
        Err(e) => tracing::warn!("PDF download is unavailable: {e}"),
    }

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        preview_timeout: Duration::from_secs(cli.preview_timeout),
        pdf_timeout: Duration::from_secs(cli.pdf_timeout),
        conversion: Arc::new(conversion),
    };
    eprintln!("md2pdf UI: http://{}:{}", config.host, config.port);

    run_server(config)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))
        .context("Server failed")
}
