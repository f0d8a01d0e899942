//! Markdown to HTML body fragment.
//!
//! GitHub-flavoured extensions are on. Raw HTML passes through untouched,
//! which is what keeps diagram placeholders intact for the assembler.

use pulldown_cmark::{html, Options, Parser};

/// Parser options used for every document.
pub fn markdown_options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
        | Options::ENABLE_GFM
}

/// Render Markdown text to an HTML fragment (no `<html>`/`<body>` wrapper).
pub fn text_to_markup(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, markdown_options());
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
