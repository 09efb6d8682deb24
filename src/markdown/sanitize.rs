//! Escaping of author-written raw HTML.
//!
//! Raw HTML embedded in a document is passed through only for a handful of
//! presentational tags and for character entities. Everything else is shown
//! as text.

use log::{error, trace};
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

use crate::error::{RenderError, RenderResult};
use crate::util::never_matching_regex;

/// Tags an author may write directly.
pub const ALLOWED_TAGS: &[&str] = &["code", "span", "b", "div", "br"];

static TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"^<(?:/(?P<close>[A-Za-z][A-Za-z0-9-]*)\s*"#,
        r#"|(?P<open>[A-Za-z][A-Za-z0-9-]*)"#,
        r#"(?:\s+[A-Za-z_:][-A-Za-z0-9_:.]*(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*"#,
        r#"\s*/?)>$"#
    ))
    .unwrap_or_else(|e| {
        error!("Failed to compile TAG regex: {e}");
        never_matching_regex()
    })
});

static ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^&(?:#[0-9]{1,7}|#[xX][0-9A-Fa-f]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});")
        .unwrap_or_else(|e| {
            error!("Failed to compile ENTITY regex: {e}");
            never_matching_regex()
        })
});

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\s+(?P<name>[A-Za-z_:][-A-Za-z0-9_:.]*)(?:\s*=\s*(?P<value>"[^"]*"|'[^']*'|[^\s"'=<>`]+))?"#)
        .unwrap_or_else(|e| {
            error!("Failed to compile ATTRIBUTE regex: {e}");
            never_matching_regex()
        })
});

/// Returns the tag to emit when `tag` is a single well-formed tag on the
/// allow-list. Event handler attributes and `javascript:` values are
/// dropped from opening tags.
fn allowed_tag(tag: &str) -> Option<Cow<'_, str>> {
    let caps = TAG.captures(tag)?;
    if let Some(name) = caps.name("close") {
        return is_allowed_name(name.as_str()).then_some(Cow::Borrowed(tag));
    }

    let name = caps.name("open")?;
    if !is_allowed_name(name.as_str()) {
        return None;
    }

    let mut kept = String::new();
    let mut dropped = false;
    for attribute in ATTRIBUTE.captures_iter(&tag[name.end()..]) {
        let (Some(raw), Some(attr_name)) = (attribute.get(0), attribute.name("name")) else {
            continue;
        };
        let value = attribute.name("value").map_or("", |v| v.as_str());
        if is_unsafe_attribute(attr_name.as_str(), value) {
            trace!("Dropping attribute {} from raw tag", attr_name.as_str());
            dropped = true;
        } else {
            kept.push_str(raw.as_str());
        }
    }

    if !dropped {
        return Some(Cow::Borrowed(tag));
    }
    let tail = if tag[..tag.len() - 1].trim_end().ends_with('/') {
        "/>"
    } else {
        ">"
    };
    Some(Cow::Owned(format!("<{}{}{}", name.as_str(), kept, tail)))
}

fn is_allowed_name(name: &str) -> bool {
    ALLOWED_TAGS.contains(&name.to_ascii_lowercase().as_str())
}

fn is_unsafe_attribute(name: &str, value: &str) -> bool {
    let script: String = value
        .trim_matches(['"', '\''])
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect();
    name.to_ascii_lowercase().starts_with("on")
        || script.to_ascii_lowercase().starts_with("javascript:")
}

fn escape_into(out: &mut String, text: &str) {
    out.push_str(&html_escape::encode_double_quoted_attribute(text));
}

/// Sanitizes one raw HTML fragment.
///
/// Allowed tags and valid character entities pass through unchanged. Any
/// other markup is escaped, as are stray `&`, `<`, `>` and `"` characters.
///
/// # Arguments
///
/// * `fragment`: Raw HTML as written in the document
///
/// # Errors
///
/// Returns error if a tag or comment is opened but never closed.
pub fn sanitize_fragment(fragment: &str) -> RenderResult<String> {
    let mut out = String::with_capacity(fragment.len());
    let mut rest = fragment;

    let malformed = || RenderError::MalformedHtml {
        fragment: fragment.to_string(),
    };

    while let Some(c) = rest.chars().next() {
        let consumed = match c {
            '<' if rest.starts_with("<!--") => {
                let end = rest.find("-->").ok_or_else(malformed)? + 3;
                escape_into(&mut out, &rest[..end]);
                end
            }
            '<' if rest[1..]
                .chars()
                .next()
                .is_some_and(|n| n.is_ascii_alphabetic() || matches!(n, '/' | '!' | '?')) =>
            {
                // A second '<' before any '>' means the first one was text
                match rest[1..].find(['<', '>']).map(|pos| pos + 1) {
                    Some(gt) if rest[gt..].starts_with('>') => {
                        let tag = &rest[..=gt];
                        match allowed_tag(tag) {
                            Some(clean) => out.push_str(&clean),
                            None => {
                                trace!("Escaping raw tag {}", tag);
                                escape_into(&mut out, tag);
                            }
                        }
                        gt + 1
                    }
                    Some(_) => {
                        out.push_str("&lt;");
                        1
                    }
                    None => return Err(malformed()),
                }
            }
            '&' => match ENTITY.find(rest) {
                Some(entity) => {
                    out.push_str(entity.as_str());
                    entity.end()
                }
                None => {
                    out.push_str("&amp;");
                    1
                }
            },
            '<' | '>' | '"' => {
                escape_into(&mut out, &rest[..1]);
                1
            }
            other => {
                out.push(other);
                other.len_utf8()
            }
        };
        rest = &rest[consumed..];
    }

    Ok(out)
}
