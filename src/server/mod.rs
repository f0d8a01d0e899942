//! HTTP boundary for the conversion pipeline.
//!
//! Serves a single-page editor UI and two JSON endpoints that run the same
//! pipeline as the CLI:
//!
//! ```text
//! Browser ──HTTP──► axum router
//!                     │
//!                     ├─► GET  /                 embedded editor UI
//!                     ├─► GET  /sample.plan.md   embedded sample document
//!                     ├─► GET  /api/health
//!                     ├─► POST /api/preview  ──► render_html     ──► {html, warnings}
//!                     └─► POST /api/pdf      ──► convert_to_pdf  ──► application/pdf
//! ```
//!
//! Requests share one immutable [`ConversionConfig`]; tool paths are resolved
//! once when the server starts. Each request gets its own
//! [`tokio_util::sync::CancellationToken`], cancelled when the client goes
//! away or the request exceeds its time limit.

mod app;
mod assets;
mod error;
mod handlers;
mod security;
mod state;

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ConversionConfig;

pub use app::create_router;
pub use error::ServerError;
pub use state::AppState;

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3333;

/// Maximum accepted request body size in bytes.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Upper bound for a preview request.
pub const DEFAULT_PREVIEW_TIMEOUT: Duration = Duration::from_secs(90);

/// Upper bound for a PDF request.
pub const DEFAULT_PDF_TIMEOUT: Duration = Duration::from_secs(180);

/// Server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Time limit for `POST /api/preview`.
    pub preview_timeout: Duration,
    /// Time limit for `POST /api/pdf`.
    pub pdf_timeout: Duration,
    /// Pipeline configuration shared by every request.
    pub conversion: Arc<ConversionConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            preview_timeout: DEFAULT_PREVIEW_TIMEOUT,
            pdf_timeout: DEFAULT_PDF_TIMEOUT,
            conversion: Arc::new(ConversionConfig::default()),
        }
    }
}

/// Run the server until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the address is invalid or cannot be bound.
pub async fn run_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let state = Arc::new(AppState::new(
        Arc::clone(&config.conversion),
        config.preview_timeout,
        config.pdf_timeout,
    ));
    let app = create_router(state);

    let addr = SocketAddr::from_str(&format!("{}:{}", config.host, config.port))?;
    tracing::info!(address = %addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl-C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, stopping server...");
}
