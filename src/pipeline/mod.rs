//! Pipeline stages for Markdown-to-PDF conversion.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap the external tools (a different diagram renderer, a different
//! browser) without touching the text-processing stages.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ render ──▶ markup ──▶ assemble ──▶ layout
//! (fences)    (mmdc)     (CMark)    (HTML doc)   (Chromium)
//! ```
//!
//! 1. [`extract`] : replace each fenced diagram with a unique placeholder
//! 2. [`render`]  : render every diagram concurrently; failures become
//!    per-diagram reasons, never a failed document
//! 3. [`markup`]  : Markdown to an HTML fragment; placeholders pass through
//! 4. [`assemble`]: swap placeholders for SVG or error boxes and wrap the
//!    fragment in a styled, print-aware HTML shell
//! 5. [`layout`]  : paginate the HTML into a PDF; only needed for PDF output

pub mod assemble;
pub mod extract;
pub mod layout;
pub mod markup;
pub mod render;
