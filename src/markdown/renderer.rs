//! Document rendering with qualified code blocks.

use comrak::nodes::{AstNode, NodeHtmlBlock, NodeValue};
use comrak::{Arena, Options, format_html, parse_document};
use log::debug;
use serde::Serialize;

use super::fence;
use super::links::LinkResolver;
use super::postprocess::postprocess;
use super::stash::{HtmlStash, StashKind};
use crate::config::RenderConfig;
use crate::document::DocumentPath;
use crate::error::RenderResult;
use crate::highlight::Highlighter;
use crate::title::split_title;

/// HTML block type comrak assigns to generic block-level HTML.
const HTML_BLOCK_GENERIC: u8 = 6;

/// Rendered document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedPage {
    pub title: String,
    pub html: String,
}

/// Renders wiki documents to HTML.
///
/// Supports tables, strikethrough and autolinks on top of CommonMark,
/// highlights fenced code with inline styles, and applies qualifier lines
/// that follow fenced blocks. Raw HTML written by authors is sanitized.
///
/// The renderer holds only read-only state. Every call allocates its own
/// placeholder tables, so one renderer can serve any number of concurrent
/// renders.
pub struct MarkdownRenderer {
    config: RenderConfig,
    highlighter: Highlighter,
}

impl MarkdownRenderer {
    /// Creates renderer for a configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the configured highlight theme does not exist.
    pub fn new(config: RenderConfig) -> RenderResult<Self> {
        let highlighter = Highlighter::new(&config.highlight_theme)?;
        Ok(Self {
            config,
            highlighter,
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Renders a document to its title and HTML body.
    ///
    /// The title is the leading heading of the text, or the document's file
    /// name without extension when there is none.
    ///
    /// # Arguments
    ///
    /// * `path`: Location of the document, used for relative links
    /// * `text`: Raw Markdown text
    ///
    /// # Errors
    ///
    /// Returns error if any stage fails. No partial HTML is produced.
    pub fn render(&self, path: &DocumentPath, text: &str) -> RenderResult<RenderedPage> {
        let (title, body) = split_title(text);
        let title = title.unwrap_or_else(|| path.fallback_title().to_string());
        let html = self.render_body(body, path.base_path())?;

        debug!("Rendered '{}' ({} bytes)", path, html.len());
        Ok(RenderedPage { title, html })
    }

    /// Renders Markdown text whose relative links start from `base_path`.
    ///
    /// # Errors
    ///
    /// Returns error for an invalid qualifier, malformed raw HTML, or a
    /// highlighting or serialization failure.
    pub fn render_body(&self, text: &str, base_path: &[String]) -> RenderResult<String> {
        let mut stash = HtmlStash::new();
        let text = fence::preprocess(text, &self.highlighter, &mut stash)?;

        let options = Self::options();
        let arena = Arena::new();
        let root = parse_document(&arena, &text, &options);
        self.stash_nodes(root, &mut stash)?;

        let mut html = Vec::new();
        format_html(root, &options, &mut html)?;
        let html = String::from_utf8(html)?;

        let resolver = LinkResolver::new(
            self.config.base_url.as_str(),
            base_path.iter().map(String::as_str),
            self.config.doc_extension.as_str(),
        );
        let html = postprocess(&html, &resolver)?;

        stash.restore(&html)
    }

    /// Replaces raw HTML and remaining fenced code with stash placeholders.
    ///
    /// Fenced blocks that are not at column zero (inside lists or quotes)
    /// reach the parser intact and are highlighted here, without qualifiers.
    fn stash_nodes<'a>(&self, root: &'a AstNode<'a>, stash: &mut HtmlStash) -> RenderResult<()> {
        for node in root.descendants() {
            let mut data = node.data.borrow_mut();
            let replacement = match &data.value {
                NodeValue::HtmlInline(raw) => {
                    NodeValue::HtmlInline(stash.store(raw.as_str(), StashKind::Raw))
                }
                NodeValue::HtmlBlock(block) => NodeValue::HtmlBlock(NodeHtmlBlock {
                    block_type: block.block_type,
                    literal: format!("{}\n", stash.store(block.literal.as_str(), StashKind::Raw)),
                }),
                NodeValue::CodeBlock(code) if code.fenced => {
                    let language = code.info.split_whitespace().next();
                    let html = self.highlighter.highlight_block(&code.literal, language)?;
                    NodeValue::HtmlBlock(NodeHtmlBlock {
                        block_type: HTML_BLOCK_GENERIC,
                        literal: format!("{}\n", stash.store(html, StashKind::Safe)),
                    })
                }
                _ => continue,
            };
            data.value = replacement;
        }
        Ok(())
    }

    fn options() -> Options<'static> {
        let mut options = Options::default();

        options.extension.strikethrough = true;
        options.extension.table = true;
        options.extension.autolink = true;

        // Raw HTML reaches the output only through the sanitizer
        options.render.unsafe_ = true;

        options
    }
}
