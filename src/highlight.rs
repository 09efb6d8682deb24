//! Syntax highlighting with syntect.
//!
//! Fenced blocks are highlighted with inline styles so rendered pages carry
//! their colors without an accompanying stylesheet.

use syntect::easy::HighlightLines;
use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::{IncludeBackground, styled_line_to_highlighted_html};
use syntect::parsing::SyntaxSet;
use syntect::util::LinesWithEndings;

use crate::error::{RenderError, RenderResult};

/// Highlights fenced code blocks into self-contained HTML.
///
/// Holds the syntax definitions and the selected theme. Both are immutable
/// after construction, so one highlighter can serve concurrent renders.
pub struct Highlighter {
    syntax_set: SyntaxSet,
    theme: Theme,
}

impl Highlighter {
    /// Creates highlighter with the named theme.
    ///
    /// # Arguments
    ///
    /// * `theme_name`: syntect theme name (InspiredGitHub, base16-ocean.light, etc.)
    ///
    /// # Errors
    ///
    /// Returns error if the theme is not part of the default theme set.
    pub fn new(theme_name: &str) -> RenderResult<Self> {
        let mut themes = ThemeSet::load_defaults().themes;
        let theme = themes
            .remove(theme_name)
            .ok_or_else(|| RenderError::UnknownTheme {
                name: theme_name.to_string(),
            })?;

        Ok(Self {
            syntax_set: SyntaxSet::load_defaults_newlines(),
            theme,
        })
    }

    /// Renders a code block as a complete `<pre><code>` fragment.
    ///
    /// A recognized language produces inline styled spans over the theme
    /// background. Anything else degrades to an escaped plain block, tagged
    /// with the raw language string when one was given.
    ///
    /// # Arguments
    ///
    /// * `code`: Code block body
    /// * `language`: Language tag from the opening fence, if any
    ///
    /// # Errors
    ///
    /// Returns error if syntect fails on a line.
    pub fn highlight_block(&self, code: &str, language: Option<&str>) -> RenderResult<String> {
        let language = language.filter(|l| !l.is_empty());

        let Some((lang, syntax)) =
            language.and_then(|l| self.find_syntax(l).map(|syntax| (l, syntax)))
        else {
            return Ok(plain_block(code, language));
        };

        let mut highlighter = HighlightLines::new(syntax, &self.theme);
        let mut body = String::with_capacity(code.len() * 2);

        for line in LinesWithEndings::from(code) {
            let regions = highlighter.highlight_line(line, &self.syntax_set)?;
            body.push_str(&styled_line_to_highlighted_html(
                &regions[..],
                IncludeBackground::No,
            )?);
        }

        Ok(format!(
            "<pre style=\"{}\"><code class=\"language-{}\">{}</code></pre>",
            self.pre_style(),
            html_escape::encode_double_quoted_attribute(lang),
            body
        ))
    }

    fn find_syntax(&self, language: &str) -> Option<&syntect::parsing::SyntaxReference> {
        self.syntax_set
            .find_syntax_by_token(language)
            .or_else(|| self.syntax_set.find_syntax_by_extension(language))
    }

    fn pre_style(&self) -> String {
        match self.theme.settings.background {
            Some(c) => format!("background-color:#{:02x}{:02x}{:02x};", c.r, c.g, c.b),
            None => String::new(),
        }
    }
}

/// Escaped block used when no lexer matches.
fn plain_block(code: &str, language: Option<&str>) -> String {
    let escaped = html_escape::encode_double_quoted_attribute(code);
    match language {
        Some(lang) => format!(
            "<pre><code class=\"{}\">{}</code></pre>",
            html_escape::encode_double_quoted_attribute(lang),
            escaped
        ),
        None => format!("<pre><code>{}</code></pre>", escaped),
    }
}
