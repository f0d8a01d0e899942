//! Per-invocation document options: page format, scale, margins, diagram
//! width and output filename.
//!
//! Every field has a default and every parser is *parse-or-default*: a value
//! that cannot be understood falls back to its default instead of failing the
//! conversion. Callers at the HTTP boundary hand us whatever JSON the client
//! sent ([`RawDocumentOptions`]); [`DocumentOptions::from_raw`] turns it into
//! a fully-populated, validated [`DocumentOptions`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default print scale (the highest the layout engine accepts).
pub const DEFAULT_SCALE: f32 = 2.0;
/// Lower scale bound.
pub const MIN_SCALE: f32 = 0.1;
/// Upper scale bound.
pub const MAX_SCALE: f32 = 2.0;
/// Default page margin on every side.
pub const DEFAULT_MARGIN: &str = "20mm";
/// Default maximum width of a rendered diagram.
pub const DEFAULT_DIAGRAM_MAX_WIDTH: &str = "100%";
/// Filename used when none (or nothing usable) was supplied.
pub const DEFAULT_FILENAME: &str = "document.pdf";
/// Default document title.
pub const DEFAULT_TITLE: &str = "Document";

// ── Page format ──────────────────────────────────────────────────────────

/// Physical page sizes supported by the fixed-layout generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageFormat {
    A0,
    A1,
    A2,
    A3,
    #[default]
    A4,
    A5,
    A6,
    Letter,
    Legal,
    Tabloid,
    Ledger,
}

impl PageFormat {
    /// All formats, in the order they are presented to users.
    pub const ALL: [PageFormat; 11] = [
        PageFormat::A4,
        PageFormat::Letter,
        PageFormat::Legal,
        PageFormat::Tabloid,
        PageFormat::Ledger,
        PageFormat::A0,
        PageFormat::A1,
        PageFormat::A2,
        PageFormat::A3,
        PageFormat::A5,
        PageFormat::A6,
    ];

    /// Parse a format name case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(name))
    }

    /// Parse a format name, falling back to A4.
    pub fn parse_or_default(name: &str) -> Self {
        Self::parse(name).unwrap_or_default()
    }

    /// Canonical name, e.g. `"A4"` or `"Letter"`.
    pub fn name(self) -> &'static str {
        match self {
            PageFormat::A0 => "A0",
            PageFormat::A1 => "A1",
            PageFormat::A2 => "A2",
            PageFormat::A3 => "A3",
            PageFormat::A4 => "A4",
            PageFormat::A5 => "A5",
            PageFormat::A6 => "A6",
            PageFormat::Letter => "Letter",
            PageFormat::Legal => "Legal",
            PageFormat::Tabloid => "Tabloid",
            PageFormat::Ledger => "Ledger",
        }
    }

    /// Page width as a CSS length.
    pub fn width(self) -> &'static str {
        self.dimensions().0
    }

    /// Page height as a CSS length.
    pub fn height(self) -> &'static str {
        self.dimensions().1
    }

    /// `(width, height)` in portrait orientation, except Ledger which is
    /// landscape tabloid.
    fn dimensions(self) -> (&'static str, &'static str) {
        match self {
            PageFormat::A0 => ("841mm", "1189mm"),
            PageFormat::A1 => ("594mm", "841mm"),
            PageFormat::A2 => ("420mm", "594mm"),
            PageFormat::A3 => ("297mm", "420mm"),
            PageFormat::A4 => ("210mm", "297mm"),
            PageFormat::A5 => ("148mm", "210mm"),
            PageFormat::A6 => ("105mm", "148mm"),
            PageFormat::Letter => ("8.5in", "11in"),
            PageFormat::Legal => ("8.5in", "14in"),
            PageFormat::Tabloid => ("11in", "17in"),
            PageFormat::Ledger => ("17in", "11in"),
        }
    }

    /// Value for a CSS `@page { size: … }` declaration.
    pub fn css_size(self) -> String {
        let (w, h) = self.dimensions();
        format!("{w} {h}")
    }
}

impl fmt::Display for PageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Margins ──────────────────────────────────────────────────────────────

/// Per-side page margins as CSS lengths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Margins {
    pub top: String,
    pub right: String,
    pub bottom: String,
    pub left: String,
}

impl Default for Margins {
    fn default() -> Self {
        Self::uniform(DEFAULT_MARGIN)
    }
}

impl Margins {
    /// The same margin on every side (invalid lengths become the default).
    pub fn uniform(value: &str) -> Self {
        let v = css_length_or(value, DEFAULT_MARGIN);
        Self {
            top: v.clone(),
            right: v.clone(),
            bottom: v.clone(),
            left: v,
        }
    }

    /// CSS shorthand `top right bottom left`.
    ///
    /// Fields are public, so each side is checked again here; anything that
    /// is not a plain CSS length prints as the default margin.
    pub fn css(&self) -> String {
        [&self.top, &self.right, &self.bottom, &self.left]
            .map(|side| css_length_or(side, DEFAULT_MARGIN))
            .join(" ")
    }
}

// ── Document options ─────────────────────────────────────────────────────

/// Options controlling one conversion. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentOptions {
    /// Physical page size. Default: A4.
    pub page_format: PageFormat,
    /// Print scale, always within `[0.1, 2.0]`. Default: 2.0.
    pub scale: f32,
    /// Print CSS backgrounds (code blocks, table headers, error boxes). Default: true.
    pub print_background: bool,
    /// Let a page size declared by the document win over `page_format`. Default: false.
    pub prefer_css_page_size: bool,
    /// Page margins. Default: 20mm on every side.
    pub margins: Margins,
    /// Maximum width of a diagram figure. Default: `100%`.
    pub diagram_max_width: String,
    /// Sanitised download filename. Default: `document.pdf`.
    pub output_filename: String,
    /// Document `<title>`. Default: `Document`.
    pub title: String,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            page_format: PageFormat::default(),
            scale: DEFAULT_SCALE,
            print_background: true,
            prefer_css_page_size: false,
            margins: Margins::default(),
            diagram_max_width: DEFAULT_DIAGRAM_MAX_WIDTH.to_string(),
            output_filename: DEFAULT_FILENAME.to_string(),
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

impl DocumentOptions {
    /// Set the scale, applying parse-or-default then clamping.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = resolve_scale(scale);
        self
    }

    /// Set the diagram width; invalid values fall back to `100%`.
    pub fn with_diagram_max_width(mut self, width: &str) -> Self {
        self.diagram_max_width = css_length_or(width, DEFAULT_DIAGRAM_MAX_WIDTH);
        self
    }

    /// `diagram_max_width` as it may appear in a stylesheet.
    pub fn css_diagram_max_width(&self) -> String {
        css_length_or(&self.diagram_max_width, DEFAULT_DIAGRAM_MAX_WIDTH)
    }

    /// Set the output filename (sanitised).
    pub fn with_filename(mut self, name: &str) -> Self {
        self.output_filename = resolve_filename(Some(name));
        self
    }

    /// Set the document title; blank titles keep the default.
    pub fn with_title(mut self, title: &str) -> Self {
        let t = title.trim();
        if !t.is_empty() {
            self.title = t.to_string();
        }
        self
    }

    /// Build options from loosely-typed client input.
    pub fn from_raw(raw: &RawDocumentOptions) -> Self {
        let defaults = Self::default();

        let margins = match &raw.margin {
            Some(m) => Margins {
                top: css_length_or(m.top.as_deref().unwrap_or(""), DEFAULT_MARGIN),
                right: css_length_or(m.right.as_deref().unwrap_or(""), DEFAULT_MARGIN),
                bottom: css_length_or(m.bottom.as_deref().unwrap_or(""), DEFAULT_MARGIN),
                left: css_length_or(m.left.as_deref().unwrap_or(""), DEFAULT_MARGIN),
            },
            None => defaults.margins,
        };

        Self {
            page_format: raw
                .format
                .as_deref()
                .map(PageFormat::parse_or_default)
                .unwrap_or_default(),
            scale: raw.scale.as_ref().map(scale_from_json).unwrap_or(DEFAULT_SCALE),
            print_background: raw.print_background.unwrap_or(defaults.print_background),
            prefer_css_page_size: raw
                .prefer_css_page_size
                .unwrap_or(defaults.prefer_css_page_size),
            margins,
            diagram_max_width: css_length_or(
                raw.diagram_max_width.as_deref().unwrap_or(""),
                DEFAULT_DIAGRAM_MAX_WIDTH,
            ),
            output_filename: resolve_filename(raw.filename.as_deref()),
            title: raw
                .title
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .unwrap_or(defaults.title),
        }
    }
}

/// Document options exactly as a client may send them; everything optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocumentOptions {
    pub format: Option<String>,
    /// Number or numeric string.
    pub scale: Option<serde_json::Value>,
    pub print_background: Option<bool>,
    #[serde(rename = "preferCSSPageSize")]
    pub prefer_css_page_size: Option<bool>,
    pub margin: Option<RawMargins>,
    pub diagram_max_width: Option<String>,
    pub filename: Option<String>,
    pub title: Option<String>,
}

/// Per-side margins as a client may send them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawMargins {
    pub top: Option<String>,
    pub right: Option<String>,
    pub bottom: Option<String>,
    pub left: Option<String>,
}

// ── Parsers ──────────────────────────────────────────────────────────────

/// Clamp a numeric scale into `[0.1, 2.0]`.
///
/// Zero and non-finite values are treated as "not provided" and become the
/// default 2.0; any other value is clamped.
pub fn resolve_scale(scale: f32) -> f32 {
    if !scale.is_finite() || scale == 0.0 {
        DEFAULT_SCALE
    } else {
        scale.clamp(MIN_SCALE, MAX_SCALE)
    }
}

/// Parse a textual scale: `"abc"` → 2.0, `"0"` → 2.0, `"5"` → 2.0, `"0.05"` → 0.1.
pub fn parse_scale(s: &str) -> f32 {
    s.trim()
        .parse::<f32>()
        .map(resolve_scale)
        .unwrap_or(DEFAULT_SCALE)
}

fn scale_from_json(v: &serde_json::Value) -> f32 {
    match v {
        serde_json::Value::Number(n) => n
            .as_f64()
            .map(|f| resolve_scale(f as f32))
            .unwrap_or(DEFAULT_SCALE),
        serde_json::Value::String(s) => parse_scale(s),
        _ => DEFAULT_SCALE,
    }
}

static RE_CSS_LENGTH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:0|\d+(?:\.\d+)?(?:%|px|mm|cm|in|pt|pc|em|rem|vw|vh))$").unwrap()
});

/// Return `value` when it is a plain CSS length, otherwise `fallback`.
///
/// Keeps arbitrary client text out of the generated stylesheet.
pub fn css_length_or(value: &str, fallback: &str) -> String {
    let v = value.trim();
    if RE_CSS_LENGTH.is_match(v) {
        v.to_string()
    } else {
        fallback.to_string()
    }
}

/// Sanitise a download filename.
///
/// Strips any directory part, replaces characters outside `[A-Za-z0-9._-]`
/// with `_`, defaults to `document` when nothing is left, and ensures a
/// `.pdf` suffix.
pub fn sanitize_pdf_filename(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    };
    if stem.to_ascii_lowercase().ends_with(".pdf") {
        stem
    } else {
        format!("{stem}.pdf")
    }
}

/// Resolve an optional filename: missing or blank → `document.pdf`.
pub fn resolve_filename(name: Option<&str>) -> String {
    match name.map(str::trim) {
        Some(n) if !n.is_empty() => sanitize_pdf_filename(n),
        _ => DEFAULT_FILENAME.to_string(),
    }
}
