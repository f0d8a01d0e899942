//! Diagram extraction: pull fenced diagram blocks out of Markdown source and
//! leave a unique placeholder where each one stood.
//!
//! ## Fence rules
//!
//! A diagram block opens with a fence line of 0–3 spaces, a run of at least
//! three backticks (or tildes), and an info string whose first word is the
//! diagram language. It closes at the first later line that is a fence of
//! the same character, at the same indentation, at least as long as the
//! opener, with nothing but whitespace after it. Shorter runs inside the
//! body are content.
//!
//! Fences of any other language are tracked too, so a Mermaid example shown
//! inside a ` ```markdown ` block stays a code sample. A diagram fence with
//! no closing line is left untouched, exactly as a Markdown renderer would
//! show it.
//!
//! ## Placeholders
//!
//! Each block becomes a blank line, the placeholder element, and another
//! blank line. The placeholder is a raw-HTML block that the Markdown pass
//! emits verbatim, so the assembler finds it by exact string match.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// Prefix shared by every placeholder id.
pub const PLACEHOLDER_PREFIX: &str = "diagram-placeholder-";

/// Default diagram language recognised in fence info strings.
pub const DEFAULT_LANGUAGE: &str = "mermaid";

/// One fenced diagram block found in the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramBlock {
    /// Unique within one extraction; also appears in the placeholder.
    pub id: String,
    /// Diagram source with the fence indentation removed, trimmed.
    pub source: String,
    /// 0-based position in the document.
    pub ordinal: usize,
}

/// The source with diagrams replaced, plus the blocks in document order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub rewritten: String,
    pub blocks: Vec<DiagramBlock>,
}

impl Extraction {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Placeholder id for the diagram at `ordinal`.
pub fn placeholder_id(ordinal: usize) -> String {
    format!("{PLACEHOLDER_PREFIX}{ordinal}")
}

/// The exact placeholder markup for `id`.
///
/// Used both when rewriting the source and when substituting rendered
/// diagrams back, so the two sides cannot drift apart.
pub fn placeholder_for(id: &str) -> String {
    format!(r#"<figure data-diagram-id="{id}"></figure>"#)
}

/// Extract `mermaid` blocks.
pub fn extract(raw: &str) -> Extraction {
    extract_with_language(raw, DEFAULT_LANGUAGE)
}

/// Extract blocks whose fence info string starts with `language`.
///
/// Text outside diagram blocks is copied byte for byte; with no diagrams
/// the rewritten text equals the input.
pub fn extract_with_language(raw: &str, language: &str) -> Extraction {
    let lines: Vec<&str> = raw.split_inclusive('\n').collect();
    let mut rewritten = String::with_capacity(raw.len());
    let mut blocks: Vec<DiagramBlock> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let Some(open) = parse_fence(line) else {
            rewritten.push_str(line);
            i += 1;
            continue;
        };

        if open.language() == Some(language) {
            let close = (i + 1..lines.len()).find(|&j| closes_diagram(lines[j], &open));
            match close {
                Some(j) => {
                    let source: String = lines[i + 1..j]
                        .iter()
                        .map(|l| strip_indent(l, open.indent))
                        .collect();
                    let ordinal = blocks.len();
                    let id = placeholder_id(ordinal);
                    push_placeholder(&mut rewritten, &id, open.indent);
                    blocks.push(DiagramBlock {
                        id,
                        source: source.trim().to_string(),
                        ordinal,
                    });
                    i = j + 1;
                }
                None => {
                    // Unterminated: the rest of the document is a code block.
                    debug!(line = i + 1, "unterminated {} fence left in place", language);
                    for rest in &lines[i..] {
                        rewritten.push_str(rest);
                    }
                    i = lines.len();
                }
            }
            continue;
        }

        // Any other fenced block is copied through its closing fence.
        rewritten.push_str(line);
        i += 1;
        while i < lines.len() {
            let inner = lines[i];
            rewritten.push_str(inner);
            i += 1;
            if closes_other(inner, &open) {
                break;
            }
        }
    }

    debug!(diagrams = blocks.len(), language, "extraction complete");
    Extraction { rewritten, blocks }
}

// ── Fence parsing ────────────────────────────────────────────────────────────

static RE_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^( {0,3})(`{3,}|~{3,})(.*?)[\r\n]*$").unwrap());

#[derive(Debug, Clone, Copy)]
struct Fence<'a> {
    indent: usize,
    marker: u8,
    len: usize,
    info: &'a str,
}

impl<'a> Fence<'a> {
    fn language(&self) -> Option<&'a str> {
        self.info.split_whitespace().next()
    }
}

fn parse_fence(line: &str) -> Option<Fence<'_>> {
    let caps = RE_FENCE.captures(line)?;
    let run = caps.get(2)?.as_str();
    let info = caps.get(3).map_or("", |m| m.as_str()).trim();
    let marker = run.as_bytes()[0];
    // Backtick fences cannot carry backticks in their info string.
    if marker == b'`' && info.contains('`') {
        return None;
    }
    Some(Fence {
        indent: caps.get(1).map_or(0, |m| m.as_str().len()),
        marker,
        len: run.len(),
        info,
    })
}

fn closes_diagram(line: &str, open: &Fence<'_>) -> bool {
    parse_fence(line).is_some_and(|f| {
        f.indent == open.indent && f.marker == open.marker && f.len >= open.len && f.info.is_empty()
    })
}

fn closes_other(line: &str, open: &Fence<'_>) -> bool {
    parse_fence(line)
        .is_some_and(|f| f.marker == open.marker && f.len >= open.len && f.info.is_empty())
}

/// Remove up to `indent` leading spaces.
fn strip_indent(line: &str, indent: usize) -> &str {
    let spaces = line.bytes().take(indent).take_while(|&b| b == b' ').count();
    &line[spaces..]
}

fn push_placeholder(out: &mut String, id: &str, indent: usize) {
    out.push('\n');
    out.push_str(&" ".repeat(indent));
    out.push_str(&placeholder_for(id));
    out.push_str("\n\n");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count_placeholders(text: &str) -> usize {
        text.matches(r#"<figure data-diagram-id=""#).count()
    }

    #[test]
    fn test_single_block() {
        let md = "# Title\n\n```mermaid\nflowchart TD\nA-->B\n```\n";
        let ex = extract(md);
        assert_eq!(ex.blocks.len(), 1);
        assert_eq!(ex.blocks[0].id, "diagram-placeholder-0");
        assert_eq!(ex.blocks[0].source, "flowchart TD\nA-->B");
        assert_eq!(ex.blocks[0].ordinal, 0);
        assert!(ex.rewritten.starts_with("# Title\n\n"));
        assert!(ex.rewritten.contains(&placeholder_for("diagram-placeholder-0")));
        assert!(!ex.rewritten.contains("```mermaid"));
        assert!(!ex.rewritten.contains("flowchart"));
    }

    #[test]
    fn test_multiple_blocks_in_order() {
        let md = "```mermaid\ngraph LR\nX-->Y\n```\ntext\n```mermaid\nsequenceDiagram\n```\n";
        let ex = extract(md);
        let ids: Vec<_> = ex.blocks.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, ["diagram-placeholder-0", "diagram-placeholder-1"]);
        assert_eq!(ex.blocks[1].source, "sequenceDiagram");
        assert_eq!(ex.blocks[1].ordinal, 1);
        let first = ex.rewritten.find("placeholder-0").unwrap();
        let second = ex.rewritten.find("placeholder-1").unwrap();
        assert!(first < second);
        assert!(ex.rewritten.contains("\ntext\n"));
    }

    #[test]
    fn test_placeholder_surrounded_by_blank_lines() {
        let ex = extract("before\n```mermaid\nA\n```\nafter\n");
        let expected = format!("before\n\n{}\n\nafter\n", placeholder_for("diagram-placeholder-0"));
        assert_eq!(ex.rewritten, expected);
    }

    #[test]
    fn test_no_diagrams_is_identity() {
        for md in [
            "",
            "plain text",
            "# H\n\n```rust\nfn main() {}\n```\n",
            "```mermaid\nnever closed\n",
            "line\r\nline\r\n",
        ] {
            let ex = extract(md);
            assert!(ex.is_empty());
            assert_eq!(ex.rewritten, md);
        }
    }

    #[test]
    fn test_empty_body() {
        let ex = extract("```mermaid\n```\n");
        assert_eq!(ex.blocks.len(), 1);
        assert_eq!(ex.blocks[0].source, "");
    }

    #[test]
    fn test_shorter_fence_inside_body_is_content() {
        let md = "````mermaid\nflowchart TD\n```\nstill body\n````\n";
        let ex = extract(md);
        assert_eq!(ex.blocks.len(), 1);
        assert_eq!(ex.blocks[0].source, "flowchart TD\n```\nstill body");
    }

    #[test]
    fn test_fence_with_trailing_text_does_not_close() {
        let md = "```mermaid\nA\n```not a close\nB\n```\n";
        let ex = extract(md);
        assert_eq!(ex.blocks[0].source, "A\n```not a close\nB");
    }

    #[test]
    fn test_mismatched_indent_does_not_close() {
        let md = "  ```mermaid\n  A\n```\n  B\n  ```\n";
        let ex = extract(md);
        assert_eq!(ex.blocks.len(), 1);
        assert_eq!(ex.blocks[0].source, "A\n```\nB");
        assert!(ex.rewritten.contains("\n  <figure"));
    }

    #[test]
    fn test_tilde_fence() {
        let ex = extract("~~~mermaid\npie\n~~~\n");
        assert_eq!(ex.blocks.len(), 1);
        assert_eq!(ex.blocks[0].source, "pie");
    }

    #[test]
    fn test_tilde_does_not_close_backtick() {
        let ex = extract("```mermaid\nA\n~~~\nB\n```\n");
        assert_eq!(ex.blocks[0].source, "A\n~~~\nB");
    }

    #[test]
    fn test_info_string_attributes() {
        let ex = extract("```mermaid {theme: dark}\nA\n```\n");
        assert_eq!(ex.blocks.len(), 1);
    }

    #[test]
    fn test_other_languages_ignored() {
        let ex = extract("```mermaidjs\nA\n```\n```text\nmermaid\n```\n");
        assert!(ex.is_empty());
    }

    #[test]
    fn test_diagram_inside_other_fence_is_skipped() {
        let md = "````markdown\n```mermaid\nA-->B\n```\n````\n\n```mermaid\nC\n```\n";
        let ex = extract(md);
        assert_eq!(ex.blocks.len(), 1);
        assert_eq!(ex.blocks[0].source, "C");
        assert!(ex.rewritten.contains("```mermaid\nA-->B\n```"));
    }

    #[test]
    fn test_unterminated_diagram_is_untouched() {
        let md = "```mermaid\nA\n```\n\n```mermaid\nB\n";
        let ex = extract(md);
        assert_eq!(ex.blocks.len(), 1);
        assert!(ex.rewritten.ends_with("```mermaid\nB\n"));
    }

    #[test]
    fn test_crlf_line_endings() {
        let md = "intro\r\n```mermaid\r\ngraph TD\r\nA-->B\r\n```\r\nouter\r\n";
        let ex = extract(md);
        assert_eq!(ex.blocks.len(), 1);
        assert_eq!(ex.blocks[0].source, "graph TD\r\nA-->B");
        assert!(ex.rewritten.starts_with("intro\r\n"));
        assert!(ex.rewritten.ends_with("outer\r\n"));
    }

    #[test]
    fn test_last_line_without_newline() {
        let ex = extract("```mermaid\nA\n```");
        assert_eq!(ex.blocks.len(), 1);
        assert_eq!(ex.blocks[0].source, "A");
    }

    #[test]
    fn test_custom_language() {
        let ex = extract_with_language("```plantuml\n@startuml\n```\n```mermaid\nA\n```\n", "plantuml");
        assert_eq!(ex.blocks.len(), 1);
        assert_eq!(ex.blocks[0].source, "@startuml");
    }

    #[test]
    fn test_placeholder_count_matches_blocks() {
        let samples = [
            "```mermaid\nA\n```\n```mermaid\nB\n```\n```mermaid\nC\n```\n",
            "x\n~~~~mermaid\nA\n~~~\n~~~~\ny\n```mermaid\n```\n",
            "```python\n```mermaid\n```\n```mermaid\nZ\n```\n",
            "   ```mermaid\n   A\n   ```\n",
            "    ```mermaid\nindented code, not a fence\n    ```\n",
        ];
        for md in samples {
            let ex = extract(md);
            assert_eq!(count_placeholders(&ex.rewritten), ex.blocks.len(), "input: {md:?}");
            for b in &ex.blocks {
                assert_eq!(ex.rewritten.matches(&placeholder_for(&b.id)).count(), 1);
            }
        }
    }

    #[test]
    fn test_four_space_indent_is_not_a_fence() {
        let md = "    ```mermaid\n    A\n    ```\n";
        let ex = extract(md);
        assert!(ex.is_empty());
        assert_eq!(ex.rewritten, md);
    }
}
