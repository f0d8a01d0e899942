//! Error types for the HTTP server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::Md2PdfError;

/// Server error type. Every variant renders as `{"error": "<message>"}`.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The request was malformed or the Markdown failed validation.
    #[error("{0}")]
    BadRequest(String),

    /// The Markdown exceeded the accepted size.
    #[error("{0}")]
    PayloadTooLarge(String),

    /// The request did not finish within its time limit.
    #[error("{0}")]
    Timeout(String),

    /// The pipeline failed.
    #[error("{0}")]
    Internal(String),
}

impl ServerError {
    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Message for Markdown over the size limit, in whole kilobytes.
pub(crate) fn too_long_message(max_bytes: usize) -> String {
    format!("Markdown is too long. Max {} KB.", max_bytes / 1000)
}

impl From<Md2PdfError> for ServerError {
    fn from(err: Md2PdfError) -> Self {
        match err {
            Md2PdfError::EmptyInput => Self::BadRequest(err.to_string()),
            Md2PdfError::InputTooLarge { max, .. } => Self::PayloadTooLarge(too_long_message(max)),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, axum::Json(json!({ "error": self.to_string() }))).into_response()
    }
}
