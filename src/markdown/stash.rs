//! Placeholder stash for HTML that must bypass Markdown processing.

use super::qualifier::random_token;
use super::sanitize::sanitize_fragment;
use crate::error::RenderResult;

/// How a stashed fragment is restored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StashKind {
    /// Produced by this pipeline, restored verbatim.
    Safe,
    /// Written by the author, restored through the sanitizer.
    Raw,
}

#[derive(Debug)]
struct Entry {
    token: String,
    kind: StashKind,
    html: String,
}

/// Fragments hidden behind opaque tokens for the length of one render.
#[derive(Debug, Default)]
pub struct HtmlStash {
    entries: Vec<Entry>,
}

impl HtmlStash {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a fragment and returns the token that stands in for it.
    pub fn store(&mut self, html: impl Into<String>, kind: StashKind) -> String {
        let token = random_token();
        self.entries.push(Entry {
            token: token.clone(),
            kind,
            html: html.into(),
        });
        token
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Puts every stashed fragment back in place of its token.
    ///
    /// A safe fragment that ended up as a paragraph of its own replaces
    /// the whole paragraph. Raw fragments are sanitized first.
    ///
    /// A fragment can only contain tokens handed out before it, so entries
    /// are restored newest first.
    ///
    /// # Errors
    ///
    /// Returns error if a raw fragment is malformed.
    pub fn restore(&self, html: &str) -> RenderResult<String> {
        let mut out = html.to_string();

        for entry in self.entries.iter().rev() {
            let fragment = match entry.kind {
                StashKind::Safe => {
                    out = out.replace(&format!("<p>{}</p>", entry.token), &entry.html);
                    entry.html.clone()
                }
                StashKind::Raw => sanitize_fragment(&entry.html)?,
            };
            out = out.replace(&entry.token, &fragment);
        }

        Ok(out)
    }
}
