//! Embedded editor page and sample document.

use axum::http::header;
use axum::response::{Html, IntoResponse};

const INDEX_HTML: &str = include_str!("../../assets/index.html");
const SAMPLE_MARKDOWN: &str = include_str!("../../assets/sample.plan.md");

/// Handle GET /.
pub(crate) async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Handle GET /sample.plan.md.
pub(crate) async fn sample() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/markdown; charset=utf-8")],
        SAMPLE_MARKDOWN,
    )
}
