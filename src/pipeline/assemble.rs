//! Document assembly: Markdown pass, diagram substitution, HTML shell.
//!
//! Substitution is a single left-to-right scan over the markup. Inserted
//! SVG or error text is written to the output and never scanned again.
//! Placeholder ids inside inserted content are also rewritten with a character
//! reference, so the finished document holds no placeholder text at all and
//! substituting it a second time changes nothing.

use crate::error::Md2PdfError;
use crate::options::DocumentOptions;
use crate::output::{RenderOutcome, RenderResult};
use crate::pipeline::extract::PLACEHOLDER_PREFIX;
use crate::pipeline::layout::print_style_element;
use crate::pipeline::markup::text_to_markup;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Shown when a failed diagram carries no reason.
pub const DEFAULT_ERROR_MESSAGE: &str = "Diagram could not be rendered.";

const PLACEHOLDER_OPEN: &str = r#"<figure data-diagram-id=""#;
const PLACEHOLDER_CLOSE: &str = r#""></figure>"#;

/// `diagram-placeholder-` with its final hyphen as `&#45;`; renders the same.
const INERT_PREFIX: &str = "diagram-placeholder&#45;";

/// Escape text for inclusion in HTML content or a quoted attribute.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// The markup that replaces a diagram's placeholder.
pub fn figure_for(result: &RenderResult) -> String {
    match &result.outcome {
        RenderOutcome::Rendered { svg } => {
            let svg = svg.replace(PLACEHOLDER_PREFIX, INERT_PREFIX);
            format!(r#"<figure class="mermaid-diagram">{svg}</figure>"#)
        }
        RenderOutcome::Failed { reason } => {
            let msg = if reason.trim().is_empty() {
                DEFAULT_ERROR_MESSAGE.to_string()
            } else {
                escape_html(reason).replace(PLACEHOLDER_PREFIX, INERT_PREFIX)
            };
            format!(r#"<figure class="mermaid-error"><pre>{msg}</pre></figure>"#)
        }
    }
}

/// Replace every placeholder in `markup` with its diagram figure.
///
/// Fails with [`Md2PdfError::Assembly`] when a result's placeholder does not
/// appear in the markup at all; the diagram would otherwise vanish silently.
pub fn substitute_placeholders(markup: &str, results: &[RenderResult]) -> Result<String, Md2PdfError> {
    let figures: HashMap<&str, String> = results
        .iter()
        .map(|r| (r.id.as_str(), figure_for(r)))
        .collect();
    let mut seen: HashSet<&str> = HashSet::with_capacity(results.len());
    let mut out = String::with_capacity(markup.len() + figures.values().map(String::len).sum::<usize>());
    let mut rest = markup;

    while let Some(pos) = rest.find(PLACEHOLDER_OPEN) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + PLACEHOLDER_OPEN.len()..];
        let hit = after
            .find('"')
            .filter(|&end| after[end..].starts_with(PLACEHOLDER_CLOSE))
            .and_then(|end| figures.get_key_value(&after[..end]));
        match hit {
            Some((id, figure)) => {
                out.push_str(figure);
                seen.insert(*id);
                rest = &after[id.len() + PLACEHOLDER_CLOSE.len()..];
            }
            None => {
                out.push_str(PLACEHOLDER_OPEN);
                rest = after;
            }
        }
    }
    out.push_str(rest);

    if let Some(missing) = results.iter().find(|r| !seen.contains(r.id.as_str())) {
        return Err(Md2PdfError::Assembly(format!(
            "placeholder for {} did not survive Markdown rendering",
            missing.id
        )));
    }
    debug!(replaced = seen.len(), "placeholders substituted");
    Ok(out)
}

/// Wrap a body fragment in a complete, self-contained HTML document.
///
/// The print stylesheet goes after the base styles so its page rules win,
/// or before them with `prefer_css_page_size` so the document's own do.
pub fn wrap_document(body: &str, options: &DocumentOptions) -> String {
    let page = print_style_element(options);
    let (early, late) = if options.prefer_css_page_size {
        (page.as_str(), "")
    } else {
        ("", page.as_str())
    };
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>{title}</title>
  {early}
  <style>
{css}
    body {{ max-width: {page_width}; }}
    figure.mermaid-diagram {{ max-width: {max_width}; }}
{print}
  </style>
  {late}
</head>
<body>
{body}
</body>
</html>
"#,
        title = escape_html(&options.title),
        css = BASE_CSS,
        page_width = options.page_format.width(),
        max_width = options.css_diagram_max_width(),
        print = PAGE_BREAK_CSS,
        body = body,
    )
}

/// Markdown (with placeholders) plus render results to a full HTML document.
pub fn assemble(
    rewritten: &str,
    results: &[RenderResult],
    options: &DocumentOptions,
) -> Result<String, Md2PdfError> {
    let markup = text_to_markup(rewritten);
    let body = substitute_placeholders(&markup, results)?;
    Ok(wrap_document(&body, options))
}

// ── Stylesheet ───────────────────────────────────────────────────────────────

const BASE_CSS: &str = r#"    * { box-sizing: border-box; }
    body {
      font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Ubuntu, sans-serif;
      line-height: 1.6;
      color: #1a1a1a;
      margin: 0 auto;
      padding: 20px;
    }
    h1 { font-size: 1.75rem; border-bottom: 2px solid #333; padding-bottom: 0.3em; }
    h2 { font-size: 1.35rem; margin-top: 1.5em; }
    h3 { font-size: 1.15rem; margin-top: 1.25em; }
    pre, code { font-family: Consolas, Monaco, monospace; background: #f5f5f5; }
    pre { padding: 12px; border-radius: 6px; max-width: 100%; white-space: pre-wrap; overflow-wrap: break-word; }
    code { padding: 2px 6px; border-radius: 4px; font-size: 0.9em; }
    pre code { padding: 0; background: none; white-space: pre-wrap; overflow-wrap: break-word; }
    table { border-collapse: collapse; width: 100%; margin: 1em 0; }
    th, td { border: 1px solid #ddd; padding: 8px 12px; text-align: left; }
    th { background: #f5f5f5; font-weight: 600; }
    blockquote { margin: 1em 0; padding-left: 1em; border-left: 4px solid #ddd; color: #555; }
    img { max-width: 100%; }
    figure.mermaid-diagram { margin: 1.5em auto; text-align: center; }
    figure.mermaid-diagram svg { max-width: 100%; height: auto; }
    figure.mermaid-error { margin: 1.5em 0; padding: 12px; background: #fff3cd; border: 1px solid #ffc107; border-radius: 6px; }
    figure.mermaid-error pre { margin: 0; background: transparent; color: #856404; }"#;

const PAGE_BREAK_CSS: &str = r#"    @media print {
      h1, h2, h3 { page-break-after: avoid; break-after: avoid; orphans: 2; }
      figure.mermaid-diagram, figure.mermaid-error {
        page-break-before: avoid;
        page-break-inside: avoid;
        break-inside: avoid;
      }
    }"#;
