//! Fixed layout: turn an assembled HTML document into a paginated PDF.
//!
//! [`ChromiumPdf`] drives a headless Chromium with `--print-to-pdf`. The
//! command line cannot express page size, margins, scale or background
//! printing, so those are injected into the document as a print stylesheet
//! ([`print_stylesheet`]) before it is handed to the browser.
//!
//! Every call gets its own workspace holding the HTML, the PDF and a fresh
//! browser profile; concurrent conversions never share a Chromium instance.

use crate::config::ConversionConfig;
use crate::error::Md2PdfError;
use crate::options::{resolve_scale, DocumentOptions};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Virtual time Chromium may spend settling the page before printing.
const VIRTUAL_TIME_BUDGET_MS: u64 = 10_000;

/// Produces a paginated document from a complete HTML document.
#[async_trait]
pub trait FixedLayoutGenerator: Send + Sync {
    /// Lay out `html` with the page options and return the PDF bytes.
    async fn generate(&self, html: &str, options: &DocumentOptions) -> Result<Vec<u8>, Md2PdfError>;

    fn name(&self) -> &str {
        "layout"
    }
}

/// Print CSS carrying the page geometry for one conversion.
pub fn print_stylesheet(options: &DocumentOptions) -> String {
    let size = if options.prefer_css_page_size {
        String::new()
    } else {
        format!(" size: {};", options.page_format.css_size())
    };
    let adjust = if options.print_background { "exact" } else { "economy" };
    let scale = resolve_scale(options.scale);
    let zoom = if (scale - 1.0).abs() > f32::EPSILON {
        format!("\n  html {{ zoom: {scale}; }}")
    } else {
        String::new()
    };
    format!(
        "@page {{{size} margin: {margin}; }}\n@media print {{\n  html {{ -webkit-print-color-adjust: {adjust}; print-color-adjust: {adjust}; }}{zoom}\n  body {{ max-width: none; padding: 0; }}\n}}",
        margin = options.margins.css(),
    )
}

/// Marker attribute on the `<style>` element carrying [`print_stylesheet`].
const PRINT_STYLE_MARKER: &str = r#"data-md2pdf="print""#;

/// [`print_stylesheet`] wrapped in a marked `<style>` element.
pub fn print_style_element(options: &DocumentOptions) -> String {
    format!(
        "<style {PRINT_STYLE_MARKER}>\n{}\n</style>",
        print_stylesheet(options)
    )
}

/// Insert the print stylesheet into `html` unless it already carries one.
///
/// With `prefer_css_page_size` the rules go first in `<head>` so a page size
/// declared by the document itself wins; otherwise they go last and win.
pub fn inject_print_stylesheet(html: &str, options: &DocumentOptions) -> String {
    if html.contains(PRINT_STYLE_MARKER) {
        return html.to_string();
    }
    let style = print_style_element(options);
    let anchor = if options.prefer_css_page_size {
        html.find("<head>").map(|i| i + "<head>".len())
    } else {
        html.find("</head>")
    };
    match anchor {
        Some(i) => format!("{}\n{}\n{}", &html[..i], style, &html[i..]),
        None => format!("{style}\n{html}"),
    }
}

// ── Chromium ─────────────────────────────────────────────────────────────────

/// Generates PDFs with a headless Chromium / Chrome executable.
#[derive(Debug, Clone)]
pub struct ChromiumPdf {
    program: PathBuf,
    temp_root: Option<PathBuf>,
    timeout: Duration,
}

impl ChromiumPdf {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            temp_root: None,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_temp_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.temp_root = Some(root.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build from process configuration, locating Chromium when no path is set.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, Md2PdfError> {
        let program = match &config.chromium_path {
            Some(p) => p.clone(),
            None => external_tools::chromium_path()?,
        };
        let mut pdf = Self::new(program).with_timeout(Duration::from_secs(config.layout_timeout_secs));
        if let Some(root) = &config.temp_root {
            pdf = pdf.with_temp_root(root);
        }
        debug!(program = %pdf.program.display(), "using Chromium");
        Ok(pdf)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, workspace: &Path, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--no-first-run")
            .arg("--no-pdf-header-footer")
            .arg("--run-all-compositor-stages-before-draw")
            .arg(format!("--virtual-time-budget={VIRTUAL_TIME_BUDGET_MS}"))
            .arg(format!("--user-data-dir={}", workspace.join("profile").display()))
            .arg(format!("--print-to-pdf={}", output.display()))
            .arg(file_url(input));
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl FixedLayoutGenerator for ChromiumPdf {
    async fn generate(&self, html: &str, options: &DocumentOptions) -> Result<Vec<u8>, Md2PdfError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("md2pdf-");
        let workspace = match &self.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(|e| Md2PdfError::LayoutFailed(format!("could not create workspace: {e}")))?;

        let input = workspace.path().join("document.html");
        let output = workspace.path().join("document.pdf");
        tokio::fs::write(&input, inject_print_stylesheet(html, options))
            .await
            .map_err(|e| Md2PdfError::LayoutFailed(format!("could not write {}: {e}", input.display())))?;

        info!(
            "Generating PDF ({}, scale {}, margins {})",
            options.page_format,
            resolve_scale(options.scale),
            options.margins.css()
        );
        let child = self
            .command(workspace.path(), &input, &output)
            .spawn()
            .map_err(|e| {
                Md2PdfError::LayoutFailed(format!("could not start '{}': {e}", self.program.display()))
            })?;

        let result = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Md2PdfError::LayoutTimeout {
                ms: self.timeout.as_millis() as u64,
            })?
            .map_err(|e| Md2PdfError::LayoutFailed(e.to_string()))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(Md2PdfError::LayoutFailed(format!(
                "browser exited with {}: {}",
                result
                    .status
                    .code()
                    .map_or_else(|| "a signal".to_string(), |c| format!("code {c}")),
                stderr.trim()
            )));
        }

        let bytes = tokio::fs::read(&output)
            .await
            .map_err(|e| Md2PdfError::LayoutFailed(format!("no PDF produced: {e}")))?;
        if !bytes.starts_with(b"%PDF") {
            return Err(Md2PdfError::LayoutFailed(
                "browser output is not a PDF document".to_string(),
            ));
        }
        debug!(bytes = bytes.len(), "PDF generated");
        Ok(bytes)
    }

    fn name(&self) -> &str {
        "chromium"
    }
}

/// `file://` URL for a local path.
fn file_url(path: &Path) -> String {
    let raw = path.display().to_string().replace('\\', "/").replace(' ', "%20");
    if raw.starts_with('/') {
        format!("file://{raw}")
    } else {
        format!("file:///{raw}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Margins, PageFormat};

    #[test]
    fn test_default_stylesheet() {
        let css = print_stylesheet(&DocumentOptions::default());
        assert!(css.contains("@page { size: 210mm 297mm; margin: 20mm 20mm 20mm 20mm; }"));
        assert!(css.contains("print-color-adjust: exact"));
        assert!(css.contains("zoom: 2;"));
    }

    #[test]
    fn test_stylesheet_follows_options() {
        let opts = DocumentOptions {
            page_format: PageFormat::Letter,
            scale: 1.0,
            print_background: false,
            margins: Margins::uniform("1in"),
            ..Default::default()
        };
        let css = print_stylesheet(&opts);
        assert!(css.contains(&PageFormat::Letter.css_size()));
        assert!(css.contains("margin: 1in 1in 1in 1in"));
        assert!(css.contains("print-color-adjust: economy"));
        assert!(!css.contains("zoom"));
    }

    #[test]
    fn test_prefer_css_page_size_omits_size() {
        let opts = DocumentOptions {
            prefer_css_page_size: true,
            ..Default::default()
        };
        assert!(!print_stylesheet(&opts).contains("size:"));
    }

    #[test]
    fn test_injection_position() {
        let html = "<html><head><style>@page { size: A5; }</style></head><body></body></html>";
        let late = inject_print_stylesheet(html, &DocumentOptions::default());
        assert!(late.find("data-md2pdf").unwrap() > late.find("size: A5").unwrap());

        let opts = DocumentOptions {
            prefer_css_page_size: true,
            ..Default::default()
        };
        let early = inject_print_stylesheet(html, &opts);
        assert!(early.find("data-md2pdf").unwrap() < early.find("size: A5").unwrap());
    }

    #[test]
    fn test_stylesheet_rechecks_public_fields() {
        let opts = DocumentOptions {
            scale: f32::NAN,
            margins: Margins {
                top: "red; } body { display: none".into(),
                ..Margins::uniform("1in")
            },
            ..Default::default()
        };
        let css = print_stylesheet(&opts);
        assert!(css.contains("margin: 20mm 1in 1in 1in;"));
        assert!(css.contains("zoom: 2;"));
        assert!(!css.contains("display: none"));
    }

    #[test]
    fn test_injection_skipped_when_present() {
        let opts = DocumentOptions::default();
        let html = format!("<html><head>{}</head></html>", print_style_element(&opts));
        assert_eq!(inject_print_stylesheet(&html, &opts), html);
    }

    #[test]
    fn test_file_url() {
        assert_eq!(file_url(Path::new("/tmp/a b/doc.html")), "file:///tmp/a%20b/doc.html");
    }

    #[tokio::test]
    async fn test_missing_browser() {
        let pdf = ChromiumPdf::new("/nonexistent/chromium");
        let err = pdf.generate("<html></html>", &DocumentOptions::default()).await.unwrap_err();
        assert!(matches!(err, Md2PdfError::LayoutFailed(_)));
    }

    #[cfg(unix)]
    mod fake_browser {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn fake_chromium(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("chromium");
            let script = format!(
                "#!/bin/sh\nout=\"\"\nfor arg in \"$@\"; do\n  case \"$arg\" in\n    --print-to-pdf=*) out=\"${{arg#--print-to-pdf=}}\";;\n  esac\ndone\n{body}\n"
            );
            std::fs::write(&path, script).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn test_generates_pdf_bytes() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_chromium(dir.path(), "printf '%%PDF-1.7\\n%%fake\\n' > \"$out\"");
            let bytes = ChromiumPdf::new(program)
                .generate("<html><head></head><body>x</body></html>", &DocumentOptions::default())
                .await
                .unwrap();
            assert!(bytes.starts_with(b"%PDF-1.7"));
        }

        #[tokio::test]
        async fn test_rejects_non_pdf_output() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_chromium(dir.path(), "echo hello > \"$out\"");
            let err = ChromiumPdf::new(program)
                .generate("<html></html>", &DocumentOptions::default())
                .await
                .unwrap_err();
            assert!(err.to_string().contains("not a PDF"));
        }

        #[tokio::test]
        async fn test_nonzero_exit() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_chromium(dir.path(), "echo 'crashed' >&2\nexit 3");
            let err = ChromiumPdf::new(program)
                .generate("<html></html>", &DocumentOptions::default())
                .await
                .unwrap_err();
            let msg = err.to_string();
            assert!(msg.contains("code 3"), "{msg}");
            assert!(msg.contains("crashed"), "{msg}");
        }

        #[tokio::test]
        async fn test_timeout() {
            let dir = tempfile::tempdir().unwrap();
            let program = fake_chromium(dir.path(), "sleep 5");
            let err = ChromiumPdf::new(program)
                .with_timeout(Duration::from_millis(200))
                .generate("<html></html>", &DocumentOptions::default())
                .await
                .unwrap_err();
            assert!(matches!(err, Md2PdfError::LayoutTimeout { ms: 200 }));
            assert!(err.to_string().ends_with("after 200ms"), "{err}");
        }
    }
}
