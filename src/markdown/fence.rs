//! Fenced code blocks carrying qualifier lines.
//!
//! The scanner walks the document once, line by line, and splits it into
//! literal text and fenced blocks. A block is only recognized when its fence
//! starts at column zero and a matching closing fence exists; anything else
//! stays literal text for the Markdown parser to handle. Info strings and
//! closing fences follow CommonMark, so both sides agree on where a block
//! ends.

use log::debug;
use std::collections::BTreeSet;

use super::qualifier::{Marks, Qualifier};
use super::stash::{HtmlStash, StashKind};
use crate::error::RenderResult;
use crate::highlight::Highlighter;

/// Minimum fence run length.
const MIN_FENCE: usize = 3;

/// Spaces allowed before a closing fence.
const MAX_CLOSE_INDENT: usize = 3;

/// A fenced block with the qualifier lines that follow it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock<'a> {
    /// Language tag, absent when the fence has no info string.
    pub language: Option<&'a str>,
    /// Code body including its final newline.
    pub code: &'a str,
    /// Non-blank lines directly after the closing fence, without newlines.
    pub annotations: Vec<&'a str>,
}

/// One piece of a scanned document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Text(&'a str),
    Fenced(FencedBlock<'a>),
}

/// Opening fence: character, run length and language.
///
/// The language is the first word of the info string, with pandoc style
/// `.cpp` and `{.cpp}` unwrapped. A backtick fence whose info string holds
/// a backtick is not a fence at all.
fn opening_fence(line: &str) -> Option<(char, usize, Option<&str>)> {
    let fence_char = line.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let run = line.len() - line.trim_start_matches(fence_char).len();
    if run < MIN_FENCE {
        return None;
    }

    let info = line[run..].trim();
    if fence_char == '`' && info.contains('`') {
        return None;
    }
    let language = info
        .split_whitespace()
        .next()
        .map(|word| {
            word.trim_start_matches('{')
                .trim_start_matches('.')
                .trim_end_matches('}')
        })
        .filter(|lang| !lang.is_empty());
    Some((fence_char, run, language))
}

fn is_closing_fence(line: &str, fence_char: char, min_run: usize) -> bool {
    let line = line.trim_end_matches(['\n', '\r']);
    let fence = line.trim_start_matches(' ');
    if line.len() - fence.len() > MAX_CLOSE_INDENT {
        return false;
    }
    let rest = fence.trim_start_matches(fence_char);
    let run = fence.len() - rest.len();
    run >= min_run && rest.trim().is_empty()
}

fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// Splits a document into literal text and fenced blocks in one pass.
///
/// An opening fence without a matching close is left as literal text. The
/// blank line ending a block's annotation lines is consumed with the block,
/// so adjacent content is preserved untouched.
///
/// # Arguments
///
/// * `text`: Markdown text with the title already removed
///
/// # Returns
///
/// Segments in document order. Concatenating every segment's source text
/// yields the input minus the consumed terminator lines.
pub fn scan(text: &str) -> Vec<Segment<'_>> {
    let lines: Vec<(usize, &str)> = text
        .split_inclusive('\n')
        .scan(0, |offset, line| {
            let start = *offset;
            *offset += line.len();
            Some((start, line))
        })
        .collect();

    // Smallest run length per fence character with no closer left in the
    // rest of the document. Any longer fence further down fails too.
    let mut unclosed_backtick: Option<usize> = None;
    let mut unclosed_tilde: Option<usize> = None;

    let mut segments = Vec::new();
    let mut text_start = 0;
    let mut i = 0;

    while i < lines.len() {
        let (line_start, line) = lines[i];
        let Some((fence_char, run, language)) = opening_fence(line) else {
            i += 1;
            continue;
        };

        let unclosed = if fence_char == '`' {
            &mut unclosed_backtick
        } else {
            &mut unclosed_tilde
        };
        if unclosed.is_some_and(|n| run >= n) {
            i += 1;
            continue;
        }

        let Some(close) =
            (i + 1..lines.len()).find(|&j| is_closing_fence(lines[j].1, fence_char, run))
        else {
            *unclosed = Some(unclosed.map_or(run, |n| n.min(run)));
            i += 1;
            continue;
        };

        let code_start = line_start + line.len();
        let code_end = lines[close].0;

        let mut annotations = Vec::new();
        let mut next = close + 1;
        while next < lines.len() {
            let annotation = lines[next].1;
            next += 1;
            if is_blank(annotation) {
                break;
            }
            annotations.push(annotation.trim_end_matches(['\n', '\r']));
        }

        if text_start < line_start {
            segments.push(Segment::Text(&text[text_start..line_start]));
        }
        segments.push(Segment::Fenced(FencedBlock {
            language,
            code: &text[code_start..code_end],
            annotations,
        }));

        text_start = lines.get(next).map_or(text.len(), |(start, _)| *start);
        i = next;
    }

    if text_start < text.len() {
        segments.push(Segment::Text(&text[text_start..]));
    }

    segments
}

/// Renders one fenced block to its final HTML fragment.
///
/// Duplicate annotation lines collapse, and the remaining lines apply in
/// sorted order so the output never depends on line order.
///
/// # Errors
///
/// Returns error for an invalid qualifier or a highlighting failure.
pub fn render_block(block: &FencedBlock<'_>, highlighter: &Highlighter) -> RenderResult<String> {
    let lines: BTreeSet<&str> = block.annotations.iter().copied().collect();
    let qualifiers = lines
        .into_iter()
        .map(Qualifier::parse)
        .collect::<RenderResult<Vec<_>>>()?;

    let mut marks = Marks::new();
    let code = marks.mark(&qualifiers, block.code);

    let html = highlighter.highlight_block(&code, block.language)?;
    debug!(
        "Rendered fenced block ({}) with {} marker(s)",
        block.language.unwrap_or("plain"),
        marks.len()
    );
    marks.qualify(&html)
}

/// Replaces every qualified fenced block with a stash placeholder.
///
/// # Arguments
///
/// * `text`: Markdown text with the title already removed
/// * `highlighter`: Highlighter for fenced code
/// * `stash`: Receives one safe fragment per block
///
/// # Returns
///
/// Markdown text with each block replaced by its own placeholder paragraph
///
/// # Errors
///
/// Returns error if any block fails to render.
pub fn preprocess(
    text: &str,
    highlighter: &Highlighter,
    stash: &mut HtmlStash,
) -> RenderResult<String> {
    let mut out = String::with_capacity(text.len());

    for segment in scan(text) {
        match segment {
            Segment::Text(literal) => out.push_str(literal),
            Segment::Fenced(block) => {
                let html = render_block(&block, highlighter)?;
                let token = stash.store(html, StashKind::Safe);
                out.push('\n');
                out.push_str(&token);
                out.push_str("\n\n");
            }
        }
    }

    Ok(out)
}
