//! API endpoints.
//!
//! Bodies are parsed by hand from raw bytes so that every rejection,
//! including a non-string `markdown` field, comes back as `{"error": ...}`
//! with the right status code before the pipeline runs.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use super::error::{ServerError, too_long_message};
use super::state::AppState;
use crate::convert::{convert_to_pdf, render_html};
use crate::options::{DocumentOptions, RawDocumentOptions};

/// Shown when a preview exceeds its time limit.
pub(crate) const PREVIEW_TIMEOUT_MESSAGE: &str =
    "Preview timed out. Try fewer or simpler Mermaid diagrams.";

/// Shown when PDF generation exceeds its time limit.
pub(crate) const PDF_TIMEOUT_MESSAGE: &str =
    "PDF generation timed out. Try reducing the document size.";

/// Response header carrying the failed diagram count of a PDF.
pub(crate) const DIAGRAM_FAILURES_HEADER: &str = "x-diagram-failures";

/// Response for POST /api/preview.
#[derive(Serialize)]
pub(crate) struct PreviewResponse {
    /// Complete HTML document, suitable for an iframe `srcdoc`.
    html: String,
    /// One entry per diagram that could not be rendered.
    warnings: Vec<String>,
}

/// Handle GET /api/health.
pub(crate) async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// Handle POST /api/preview.
///
/// Body: `{ markdown, diagramMaxWidth?, title? }`.
pub(crate) async fn preview(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PreviewResponse>, ServerError> {
    let request = parse_body(&body)?;
    let markdown = validated_markdown(&request, state.max_input_bytes())?;

    let mut options = DocumentOptions::default();
    if let Some(width) = request.get("diagramMaxWidth").and_then(Value::as_str) {
        options = options.with_diagram_max_width(width);
    }
    if let Some(title) = request.get("title").and_then(Value::as_str) {
        options = options.with_title(title);
    }

    // Dropping the handler future (client gone) cancels the pipeline.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let output = match tokio::time::timeout(
        state.preview_timeout,
        render_html(markdown, &state.config, &options, &cancel),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => {
            cancel.cancel();
            return Err(ServerError::Timeout(PREVIEW_TIMEOUT_MESSAGE.to_string()));
        }
    };

    Ok(Json(PreviewResponse {
        warnings: output.warnings(),
        html: output.html,
    }))
}

/// Handle POST /api/pdf.
///
/// Body: `{ markdown, options? }` where `options` follows
/// [`RawDocumentOptions`]. Unknown or malformed options fall back to defaults.
pub(crate) async fn pdf(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ServerError> {
    let request = parse_body(&body)?;
    let markdown = validated_markdown(&request, state.max_input_bytes())?;
    let options = DocumentOptions::from_raw(&raw_options(&request));

    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let pdf = match tokio::time::timeout(
        state.pdf_timeout,
        convert_to_pdf(markdown, &state.config, &options, &cancel),
    )
    .await
    {
        Ok(result) => result?,
        Err(_) => {
            cancel.cancel();
            return Err(ServerError::Timeout(PDF_TIMEOUT_MESSAGE.to_string()));
        }
    };

    let mut headers = HeaderMap::new();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", pdf.filename))
            .map_err(|e| ServerError::Internal(format!("Invalid filename header: {e}")))?,
    );
    if pdf.stats.failed_diagrams > 0 {
        headers.insert(
            HeaderName::from_static(DIAGRAM_FAILURES_HEADER),
            HeaderValue::from(pdf.stats.failed_diagrams as u64),
        );
    }

    Ok((headers, pdf.bytes).into_response())
}

// ── Request parsing ──────────────────────────────────────────────────────

fn parse_body(body: &Bytes) -> Result<Value, ServerError> {
    serde_json::from_slice(body)
        .map_err(|_| ServerError::BadRequest("Request body must be a JSON object.".to_string()))
}

/// Apply the API's input rules to `request.markdown`.
fn validated_markdown(request: &Value, max_bytes: usize) -> Result<&str, ServerError> {
    let markdown = request
        .get("markdown")
        .and_then(Value::as_str)
        .ok_or_else(|| ServerError::BadRequest("Markdown must be a string.".to_string()))?;
    if markdown.is_empty() {
        return Err(ServerError::BadRequest("Markdown cannot be empty.".to_string()));
    }
    if markdown.len() > max_bytes {
        return Err(ServerError::PayloadTooLarge(too_long_message(max_bytes)));
    }
    Ok(markdown)
}

fn raw_options(request: &Value) -> RawDocumentOptions {
    match request.get("options") {
        Some(value) if !value.is_null() => serde_json::from_value(value.clone())
            .unwrap_or_else(|e| {
                tracing::debug!(error = %e, "Ignoring malformed PDF options");
                RawDocumentOptions::default()
            }),
        _ => RawDocumentOptions::default(),
    }
}
