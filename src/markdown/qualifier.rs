//! Qualifier annotations on fenced code.
//!
//! A qualifier line follows a fenced block and names a token plus the
//! commands to apply to each of its occurrences:
//!
//! ```text
//! sort<color ff0000><link https://cpprefjp.github.io/reference/algorithm/sort.html>
//! ```
//!
//! Occurrences are marked in the plain code before highlighting, each one
//! wrapped as `TOKEN original TOKEN` with a random alphabetic token per
//! command. The token carries no payload; the command it stands for lives
//! in [`Marks`]. After highlighting, [`Marks::qualify`] swaps every marked
//! span for its wrapper element, closing and reopening the highlighter's
//! inline spans around it so the result stays well nested.

use log::debug;
use rand::RngExt;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::{RenderError, RenderResult};
use crate::util::is_identifier_char;

/// Length of generated placeholder tokens.
pub const TOKEN_LEN: usize = 32;

const TOKEN_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// Elements that may be closed and reopened around a wrapper.
const INLINE_TAGS: &[&str] = &["span", "i", "a", "b", "em", "strong", "u"];

/// Generates an opaque alphabetic placeholder token.
pub fn random_token() -> String {
    let mut rng = rand::rng();
    (0..TOKEN_LEN)
        .map(|_| TOKEN_ALPHABET[rng.random_range(0..TOKEN_ALPHABET.len())] as char)
        .collect()
}

/// One rendering command from a qualifier line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `italic`
    Italic,
    /// `color <hex>`, stored without the leading `#`
    Color(String),
    /// `link <url>`
    Link(String),
}

impl Command {
    fn open_tag(&self) -> String {
        match self {
            Command::Italic => "<i>".to_string(),
            Command::Color(hex) => format!("<span style=\"color:#{}\">", hex),
            Command::Link(url) => format!(
                "<a href=\"{}\">",
                html_escape::encode_double_quoted_attribute(url)
            ),
        }
    }

    fn close_tag(&self) -> &'static str {
        match self {
            Command::Italic => "</i>",
            Command::Color(_) => "</span>",
            Command::Link(_) => "</a>",
        }
    }
}

impl FromStr for Command {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(' ').filter(|p| !p.is_empty());
        let name = parts.next().unwrap_or("");
        let args: Vec<&str> = parts.collect();

        let invalid = |reason: &str| RenderError::InvalidQualifier {
            command: s.to_string(),
            reason: reason.to_string(),
        };

        match name {
            "italic" => Ok(Command::Italic),
            "color" => {
                let hex = args
                    .first()
                    .map(|h| h.trim_start_matches('#'))
                    .ok_or_else(|| invalid("missing color value"))?;
                let valid_len = hex.len() == 3 || hex.len() == 6;
                if !valid_len || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
                    return Err(invalid("color must be 3 or 6 hex digits"));
                }
                Ok(Command::Color(hex.to_string()))
            }
            "link" => {
                let url = args.first().ok_or_else(|| invalid("missing link target"))?;
                Ok(Command::Link((*url).to_string()))
            }
            _ => Err(RenderError::UnknownQualifier {
                command: name.to_string(),
            }),
        }
    }
}

/// A parsed qualifier line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Qualifier {
    target: String,
    commands: Vec<Command>,
}

impl Qualifier {
    /// Parses `target<command><command>...`.
    ///
    /// The target is everything before the first `<`. Each `<...>` group
    /// after it is one command; text outside the groups is ignored.
    /// Repeated commands on one line collapse into one.
    ///
    /// # Errors
    ///
    /// Returns error for an unknown command name or an invalid argument.
    pub fn parse(line: &str) -> RenderResult<Self> {
        let line = line.trim_end();
        let (target, mut rest) = match line.find('<') {
            Some(pos) => (&line[..pos], &line[pos..]),
            None => (line, ""),
        };

        let mut commands: Vec<Command> = Vec::new();
        while let Some(start) = rest.find('<') {
            let Some(len) = rest[start + 1..].find('>') else {
                break;
            };
            let command: Command = rest[start + 1..start + 1 + len].trim().parse()?;
            if !commands.contains(&command) {
                commands.push(command);
            }
            rest = &rest[start + len + 2..];
        }

        Ok(Self {
            target: target.trim().to_string(),
            commands,
        })
    }

    /// Token the qualifier applies to.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Commands in line order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }
}

/// Placeholder tokens handed out while marking, innermost wrapper first.
///
/// Each entry maps one token to the command it stands for. Qualifying in
/// entry order always works from the innermost wrapper outwards.
#[derive(Debug, Default)]
pub struct Marks {
    entries: Vec<(String, Command)>,
}

/// Marker placed in the code: byte offset, whether it opens, nesting rank
/// (lower is further inside) and token.
type Marker<'t> = (usize, bool, usize, &'t str);

impl Marks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of tokens handed out.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Marks every whole-word occurrence of each qualifier's target.
    ///
    /// All occurrences are found in the original code, so one qualifier
    /// never hides a target from another. An occurrence counts only when
    /// the characters on both sides are not identifier characters.
    ///
    /// Overlapping occurrences nest: a shorter target sits inside a longer
    /// one, and for the same target a later line wraps an earlier one. An
    /// occurrence that would cross one accepted from an earlier line is
    /// skipped. With several commands on one line the last ends up
    /// innermost.
    ///
    /// # Arguments
    ///
    /// * `qualifiers`: Parsed qualifier lines in application order
    /// * `code`: Original code text
    ///
    /// # Returns
    ///
    /// Code with marker tokens around each occurrence
    pub fn mark(&mut self, qualifiers: &[Qualifier], code: &str) -> String {
        let active: Vec<&Qualifier> = qualifiers
            .iter()
            .filter(|q| !q.target().is_empty() && !q.commands().is_empty())
            .collect();

        let mut spans: Vec<(usize, usize, usize)> = Vec::new();
        for (index, qualifier) in active.iter().enumerate() {
            let target = qualifier.target();
            let mut count = 0;
            for (start, end) in occurrences(code, target) {
                let crosses = spans.iter().any(|&(s, e, _)| {
                    start < e && s < end && !(s <= start && end <= e) && !(start <= s && e <= end)
                });
                if crosses {
                    debug!("Qualifier '{}' at {} crosses another, skipped", target, start);
                    continue;
                }
                spans.push((start, end, index));
                count += 1;
            }
            debug!("Qualifier '{}' marked {} occurrence(s)", target, count);
        }

        // Stable sort keeps line order among targets of equal length
        let mut nesting: Vec<usize> = (0..active.len()).collect();
        nesting.sort_by_key(|&index| active[index].target().len());

        let mut tokens: Vec<Vec<usize>> = vec![Vec::new(); active.len()];
        for index in nesting {
            for command in active[index].commands().iter().rev() {
                tokens[index].push(self.entries.len());
                self.entries.push((random_token(), command.clone()));
            }
        }

        let mut markers: Vec<Marker<'_>> = Vec::with_capacity(spans.len() * 2);
        for &(start, end, index) in &spans {
            for &rank in &tokens[index] {
                let token = self.entries[rank].0.as_str();
                markers.push((start, true, rank, token));
                markers.push((end, false, rank, token));
            }
        }
        // At one offset: closers innermost first, then openers outermost first
        markers.sort_by_key(|&(at, opening, rank, _)| {
            (at, opening, if opening { usize::MAX - rank } else { rank })
        });

        let mut out = String::with_capacity(code.len() + markers.len() * (TOKEN_LEN + 1));
        let mut last = 0;
        for (at, opening, _, token) in markers {
            out.push_str(&code[last..at]);
            last = at;
            if opening {
                out.push_str(token);
                out.push(' ');
            } else {
                out.push(' ');
                out.push_str(token);
            }
        }
        out.push_str(&code[last..]);
        out
    }

    /// Replaces every marked span in highlighted HTML with its wrapper.
    ///
    /// # Errors
    ///
    /// Returns error if a token's markers do not pair up.
    pub fn qualify(&self, html: &str) -> RenderResult<String> {
        let mut html = html.to_string();
        for (token, command) in &self.entries {
            html = apply(&html, token, command)?;
        }
        Ok(html)
    }
}

/// Whole-word occurrences of `target`, as byte ranges.
fn occurrences<'a>(code: &'a str, target: &'a str) -> impl Iterator<Item = (usize, usize)> + 'a {
    code.match_indices(target)
        .map(|(start, matched)| (start, start + matched.len()))
        .filter(|&(start, end)| is_word_boundary(code, start, end))
}

fn is_word_boundary(code: &str, start: usize, end: usize) -> bool {
    let before = code[..start].chars().next_back();
    let after = code[end..].chars().next();
    !before.is_some_and(is_identifier_char) && !after.is_some_and(is_identifier_char)
}

/// Piece of highlighted HTML.
#[derive(Debug)]
enum Piece {
    Open { name: String, raw: String },
    Close { name: String, raw: String },
    Other(String),
    Text(String),
    Marker { opening: bool },
}

/// Splits HTML into tags and text.
fn tokenize(html: &str) -> Vec<Piece> {
    let mut pieces = Vec::new();
    let mut rest = html;

    while !rest.is_empty() {
        let Some(lt) = rest.find('<') else {
            pieces.push(Piece::Text(rest.to_string()));
            break;
        };
        if lt > 0 {
            pieces.push(Piece::Text(rest[..lt].to_string()));
        }
        let Some(gt) = rest[lt..].find('>') else {
            pieces.push(Piece::Text(rest[lt..].to_string()));
            break;
        };

        let raw = &rest[lt..lt + gt + 1];
        let inner = &raw[1..raw.len() - 1];
        let name_of = |s: &str| {
            s.split(|c: char| c.is_whitespace() || c == '/')
                .next()
                .unwrap_or("")
                .to_ascii_lowercase()
        };

        let piece = if let Some(closing) = inner.strip_prefix('/') {
            Piece::Close {
                name: name_of(closing),
                raw: raw.to_string(),
            }
        } else if inner.starts_with('!') || inner.ends_with('/') || name_of(inner) == "br" {
            Piece::Other(raw.to_string())
        } else {
            Piece::Open {
                name: name_of(inner),
                raw: raw.to_string(),
            }
        };
        pieces.push(piece);
        rest = &rest[lt + gt + 1..];
    }

    pieces
}

/// Splits text pieces around `token` and drops the separating spaces.
fn split_markers(pieces: Vec<Piece>, token: &str) -> RenderResult<Vec<Piece>> {
    let mut out = Vec::with_capacity(pieces.len());
    let mut opening = true;
    let mut count = 0;

    for piece in pieces {
        let Piece::Text(text) = piece else {
            out.push(piece);
            continue;
        };

        let mut rest = text.as_str();
        while let Some(pos) = rest.find(token) {
            if pos > 0 {
                out.push(Piece::Text(rest[..pos].to_string()));
            }
            out.push(Piece::Marker { opening });
            opening = !opening;
            count += 1;
            rest = &rest[pos + token.len()..];
        }
        if !rest.is_empty() {
            out.push(Piece::Text(rest.to_string()));
        }
    }

    if count % 2 != 0 {
        return Err(RenderError::UnbalancedMarkers { count });
    }

    for i in 0..out.len() {
        let opening = match &out[i] {
            Piece::Marker { opening } => *opening,
            _ => continue,
        };
        let text = if opening {
            nearest_text(out[i + 1..].iter_mut())
        } else {
            nearest_text(out[..i].iter_mut().rev())
        };
        match text {
            Some(t) if opening && t.starts_with(' ') => {
                t.remove(0);
            }
            Some(t) if !opening && t.ends_with(' ') => {
                t.pop();
            }
            _ => {}
        }
    }

    Ok(out)
}

/// First non-empty text piece before the next marker.
fn nearest_text<'a>(pieces: impl Iterator<Item = &'a mut Piece>) -> Option<&'a mut String> {
    for piece in pieces {
        match piece {
            Piece::Marker { .. } => return None,
            Piece::Text(text) if !text.is_empty() => return Some(text),
            _ => {}
        }
    }
    None
}

/// Open element tracked while rebuilding the HTML.
#[derive(Debug, Clone)]
struct Frame {
    name: String,
    raw: String,
    wrapper: bool,
}

fn apply(html: &str, token: &str, command: &Command) -> RenderResult<String> {
    if !html.contains(token) {
        return Ok(html.to_string());
    }

    let pieces = split_markers(tokenize(html), token)?;
    let mut out = String::with_capacity(html.len());
    let mut stack: Vec<Frame> = Vec::new();

    for piece in pieces {
        match piece {
            Piece::Open { name, raw } => {
                out.push_str(&raw);
                stack.push(Frame {
                    name,
                    raw,
                    wrapper: false,
                });
            }
            Piece::Close { name, raw } => {
                let pos = stack.iter().rposition(|f| !f.wrapper && f.name == name);
                match pos {
                    Some(p) if p + 1 == stack.len() && is_empty_inline(&out, &stack[p]) => {
                        out.truncate(out.len() - stack[p].raw.len());
                    }
                    _ => out.push_str(&raw),
                }
                if let Some(p) = pos {
                    stack.truncate(p);
                }
            }
            Piece::Other(raw) | Piece::Text(raw) => out.push_str(&raw),
            Piece::Marker { opening: true } => {
                let split = stack
                    .iter()
                    .rposition(|f| !INLINE_TAGS.contains(&f.name.as_str()))
                    .map_or(0, |p| p + 1);
                let inline: Vec<Frame> = stack.split_off(split);

                close_frames(&mut out, &inline);
                out.push_str(&command.open_tag());
                stack.push(Frame {
                    name: String::new(),
                    raw: String::new(),
                    wrapper: true,
                });
                reopen_frames(&mut out, &inline);
                stack.extend(inline);
            }
            Piece::Marker { opening: false } => {
                let Some(pos) = stack.iter().rposition(|f| f.wrapper) else {
                    return Err(RenderError::UnbalancedMarkers { count: 1 });
                };
                let above: Vec<Frame> = stack.split_off(pos + 1);
                stack.pop();

                close_frames(&mut out, &above);
                out.push_str(command.close_tag());
                reopen_frames(&mut out, &above);
                stack.extend(above);
            }
        }
    }

    Ok(out)
}

/// True when `frame` was the last thing written, so closing it would
/// leave an empty inline element behind.
fn is_empty_inline(out: &str, frame: &Frame) -> bool {
    INLINE_TAGS.contains(&frame.name.as_str())
        && !frame.raw.is_empty()
        && out.ends_with(frame.raw.as_str())
}

fn close_frames(out: &mut String, frames: &[Frame]) {
    for frame in frames.iter().rev() {
        if is_empty_inline(out, frame) {
            out.truncate(out.len() - frame.raw.len());
        } else {
            let _ = write!(out, "</{}>", frame.name);
        }
    }
}

fn reopen_frames(out: &mut String, frames: &[Frame]) {
    for frame in frames {
        out.push_str(&frame.raw);
    }
}
