//! Diagram rendering: turn each extracted block into inline SVG.
//!
//! ## Why shell out to `mmdc`?
//!
//! Mermaid's layout engine only exists as JavaScript. The Mermaid CLI runs it
//! in a headless browser and writes an SVG file, which is the most faithful
//! rendering available. Each invocation gets its own temporary directory so
//! two documents converting at once can never read each other's files, and
//! the directory is removed when the render settles, however it settles.
//!
//! ## Failure isolation
//!
//! [`render_all`] never fails because one diagram failed: every block yields
//! a [`RenderResult`], either an SVG or a reason. Only cancellation aborts
//! the batch.

use crate::config::ConversionConfig;
use crate::error::{DiagramError, Md2PdfError};
use crate::output::RenderResult;
use crate::pipeline::extract::DiagramBlock;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Prefix of every per-diagram failure reason.
pub const FAILURE_PREFIX: &str = "Mermaid render failed";

/// Longest stderr excerpt kept in a failure reason.
const MAX_STDERR_CHARS: usize = 2_000;

/// Turns diagram source into an SVG document.
///
/// Implementations must be safe to call concurrently; [`render_all`] runs up
/// to `max_concurrent_renders` calls at once.
#[async_trait]
pub trait DiagramRenderer: Send + Sync {
    /// Render one diagram. Errors are reported per diagram, never fatally.
    async fn render(&self, source: &str) -> Result<String, DiagramError>;

    /// Short name used in logs.
    fn name(&self) -> &str {
        "diagram-renderer"
    }
}

// ── Mermaid CLI ──────────────────────────────────────────────────────────────

/// Renders Mermaid diagrams with the `mmdc` executable.
#[derive(Debug, Clone)]
pub struct MermaidCli {
    program: PathBuf,
    puppeteer_config: Option<PathBuf>,
    temp_root: Option<PathBuf>,
    timeout: Duration,
}

impl MermaidCli {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            puppeteer_config: None,
            temp_root: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Pass `-p <path>` to every invocation.
    pub fn with_puppeteer_config(mut self, path: impl Into<PathBuf>) -> Self {
        self.puppeteer_config = Some(path.into());
        self
    }

    /// Create per-diagram workspaces under `root` instead of the system temp dir.
    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build from process configuration, locating `mmdc` and its puppeteer
    /// config when they were not given explicitly.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, Md2PdfError> {
        let program = match &config.mmdc_path {
            Some(p) => p.clone(),
            None => external_tools::mmdc_path(config.tools_root.as_deref())?,
        };
        let mut cli = Self::new(program).with_timeout(Duration::from_secs(config.render_timeout_secs));

        let puppeteer = config.puppeteer_config.clone().or_else(|| {
            let root = config
                .tools_root
                .clone()
                .or_else(|| std::env::current_dir().ok())?;
            external_tools::puppeteer_config(&root)
        });
        if let Some(p) = puppeteer {
            cli = cli.with_puppeteer_config(p);
        }
        if let Some(root) = &config.temp_root {
            cli = cli.with_temp_root(root);
        }
        debug!(program = %cli.program.display(), "using Mermaid CLI");
        Ok(cli)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn program_label(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        // npm installs a `.cmd` shim on Windows, which CreateProcess cannot run.
        let is_batch = cfg!(windows)
            && self
                .program
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case("cmd") || e.eq_ignore_ascii_case("bat"));

        let mut cmd = if is_batch {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.program);
            c
        } else {
            Command::new(&self.program)
        };

        if let Some(p) = &self.puppeteer_config {
            cmd.arg("-p").arg(p);
        }
        cmd.arg("-i")
            .arg(input)
            .arg("-o")
            .arg(output)
            .arg("-b")
            .arg("transparent");
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl DiagramRenderer for MermaidCli {
    async fn render(&self, source: &str) -> Result<String, DiagramError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("md2pdf-");
        let workspace = match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| DiagramError::Workspace {
            detail: e.to_string(),
        })?;

        let input = workspace.path().join("input.mmd");
        let output = workspace.path().join("output.svg");
        tokio::fs::write(&input, source)
            .await
            .map_err(|e| DiagramError::Workspace {
                detail: format!("{}: {e}", input.display()),
            })?;

        let child = self
            .command(&input, &output)
            .spawn()
            .map_err(|e| DiagramError::Spawn {
                program: self.program_label(),
                detail: e.to_string(),
            })?;

        // Dropping the child on timeout kills it (kill_on_drop).
        let result = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| DiagramError::Timeout {
                ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| DiagramError::Spawn {
                program: self.program_label(),
                detail: e.to_string(),
            })?;

        if !result.status.success() {
            return Err(DiagramError::Exit {
                program: self.program_label(),
                code: result.status.code(),
                stderr: truncate_chars(&String::from_utf8_lossy(&result.stderr), MAX_STDERR_CHARS),
            });
        }

        let svg = tokio::fs::read_to_string(&output)
            .await
            .map_err(|e| DiagramError::MissingOutput {
                detail: e.to_string(),
            })?;

        clean_svg(&svg)
        // `workspace` is removed here.
    }

    fn name(&self) -> &str {
        "mmdc"
    }
}

/// Stands in for a renderer whose executable could not be located.
///
/// Every diagram fails with the same reason, so the document still comes
/// back with an error box in place of each diagram.
#[derive(Debug, Clone)]
pub struct UnavailableRenderer {
    reason: String,
}

impl UnavailableRenderer {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl DiagramRenderer for UnavailableRenderer {
    async fn render(&self, _source: &str) -> Result<String, DiagramError> {
        Err(DiagramError::Failed(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

// ── SVG clean-up ─────────────────────────────────────────────────────────────

static RE_GOOGLE_FONTS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@import\s+url\([^)]*fonts\.googleapis\.com[^)]*\)\s*;?").unwrap()
});

/// Make renderer output safe to inline into an HTML body.
///
/// Drops anything before the root `<svg` (XML prolog, DOCTYPE, comments)
/// and the remote font import, which would stall offline PDF generation.
pub fn clean_svg(raw: &str) -> Result<String, DiagramError> {
    let start = raw.find("<svg").ok_or_else(|| DiagramError::InvalidOutput {
        detail: "output does not contain an <svg> element".to_string(),
    })?;
    let svg = RE_GOOGLE_FONTS.replace_all(&raw[start..], "");
    Ok(svg.trim_end().to_string())
}

fn truncate_chars(s: &str, max: usize) -> String {
    let trimmed = s.trim();
    match trimmed.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}

// ── Fan-out ──────────────────────────────────────────────────────────────────

/// The failure reason shown for a diagram that could not be rendered.
pub fn failure_reason(err: &DiagramError) -> String {
    format!("{FAILURE_PREFIX}: {err}")
}

/// Render every block, at most `config.max_concurrent_renders` at a time.
///
/// Results come back in block order with matching ids. Diagram failures are
/// folded into their [`RenderResult`]; the only error is
/// [`Md2PdfError::Cancelled`], returned as soon as `cancel` fires. In-flight
/// renders are dropped at that point, which kills their processes and removes
/// their workspaces.
pub async fn render_all(
    blocks: &[DiagramBlock],
    renderer: &Arc<dyn DiagramRenderer>,
    config: &ConversionConfig,
    cancel: &CancellationToken,
) -> Result<Vec<RenderResult>, Md2PdfError> {
    let total = blocks.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_start(total);
    }
    if total == 0 {
        if let Some(ref cb) = config.progress_callback {
            cb.on_conversion_complete(0, 0);
        }
        return Ok(Vec::new());
    }
    info!(
        "Rendering {} diagram(s) with {} (max {} at once)",
        total,
        renderer.name(),
        config.max_concurrent_renders
    );

    let futures: Vec<_> = blocks.iter().map(|block| {
        let renderer = Arc::clone(renderer);
        let callback = config.progress_callback.clone();
        async move {
            if let Some(ref cb) = callback {
                cb.on_diagram_start(block.ordinal, total);
            }
            match renderer.render(&block.source).await {
                Ok(svg) => {
                    debug!(id = %block.id, bytes = svg.len(), "diagram rendered");
                    if let Some(ref cb) = callback {
                        cb.on_diagram_complete(block.ordinal, total, svg.len());
                    }
                    RenderResult::rendered(&block.id, svg)
                }
                Err(e) => {
                    let reason = failure_reason(&e);
                    warn!(id = %block.id, "{}", reason);
                    if let Some(ref cb) = callback {
                        cb.on_diagram_error(block.ordinal, total, &reason);
                    }
                    RenderResult::failed(&block.id, reason)
                }
            }
        }
    }).collect();
    let jobs = stream::iter(futures)
    .buffered(config.max_concurrent_renders.max(1))
    .collect::<Vec<_>>();

    let results = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            info!("Diagram rendering cancelled");
            return Err(Md2PdfError::Cancelled);
        }
        results = jobs => results,
    };

    let rendered = results.iter().filter(|r| !r.is_failure()).count();
    if let Some(ref cb) = config.progress_callback {
        cb.on_conversion_complete(total, rendered);
    }
    Ok(results)
}
