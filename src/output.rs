//! Result types produced by the conversion pipeline.

use serde::{Deserialize, Serialize};

/// Outcome of rendering one diagram: an SVG or a failure reason, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RenderOutcome {
    /// The renderer produced inline-ready SVG markup.
    Rendered { svg: String },
    /// The renderer failed; `reason` is shown to the reader.
    Failed { reason: String },
}

/// The render result for one [`crate::pipeline::extract::DiagramBlock`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResult {
    /// Matches the originating block's id.
    pub id: String,
    #[serde(flatten)]
    pub outcome: RenderOutcome,
}

impl RenderResult {
    pub fn rendered(id: impl Into<String>, svg: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outcome: RenderOutcome::Rendered { svg: svg.into() },
        }
    }

    pub fn failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            outcome: RenderOutcome::Failed {
                reason: reason.into(),
            },
        }
    }

    /// The SVG markup, when rendering succeeded.
    pub fn image(&self) -> Option<&str> {
        match &self.outcome {
            RenderOutcome::Rendered { svg } => Some(svg),
            RenderOutcome::Failed { .. } => None,
        }
    }

    /// The failure reason, when rendering failed.
    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            RenderOutcome::Rendered { .. } => None,
            RenderOutcome::Failed { reason } => Some(reason),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, RenderOutcome::Failed { .. })
    }
}

/// Aggregate statistics for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Diagram blocks found in the document.
    pub total_diagrams: usize,
    /// Diagrams rendered to SVG.
    pub rendered_diagrams: usize,
    /// Diagrams replaced by an error box.
    pub failed_diagrams: usize,
    /// Wall-clock time spent rendering diagrams.
    pub render_duration_ms: u64,
    /// Wall-clock time for the whole conversion.
    pub total_duration_ms: u64,
}

/// A fully assembled HTML document plus per-diagram details.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Complete, self-contained HTML document.
    pub html: String,
    /// One result per diagram, in document order.
    pub diagrams: Vec<RenderResult>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// Number of diagrams that failed; a warning, not an error.
    pub fn failed_diagrams(&self) -> usize {
        self.stats.failed_diagrams
    }

    /// Human-readable warnings, one per failed diagram.
    pub fn warnings(&self) -> Vec<String> {
        self.diagrams
            .iter()
            .filter_map(|d| d.failure_reason().map(|r| format!("{}: {}", d.id, r)))
            .collect()
    }
}

/// A generated PDF.
#[derive(Debug, Clone)]
pub struct PdfOutput {
    /// The PDF file contents.
    pub bytes: Vec<u8>,
    /// Sanitised download filename.
    pub filename: String,
    pub stats: ConversionStats,
}
