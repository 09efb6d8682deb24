//! Leading heading extraction.
//!
//! Wiki pages carry their title as the first heading of the document. The
//! splitter only ever looks at the start of the text, so an underline deep
//! inside the body is never mistaken for a title.

use log::error;
use regex::Regex;
use std::sync::LazyLock;

use crate::util::never_matching_regex;

static ATX_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A(?:[ \t]*\r?\n)*#+(?P<header>[^\n]*?)#*[ \t]*\r?(?:\n|\z)").unwrap_or_else(|e| {
        error!("Failed to compile ATX_HEADING regex: {e}");
        never_matching_regex()
    })
});

static SETEXT_HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\A(?:[ \t]*\r?\n)*(?P<header>[^\r\n]*\S[^\r\n]*)\r?\n=+[ \t]*\r?(?:\n|\z)").unwrap_or_else(|e| {
        error!("Failed to compile SETEXT_HEADING regex: {e}");
        never_matching_regex()
    })
});

/// Splits a leading heading off the document text.
///
/// Recognizes an ATX heading (`# Title`, trailing `#` allowed) or a Setext
/// heading (`Title` over a line of `=`) after any leading blank lines.
///
/// # Arguments
///
/// * `text`: Raw document text
///
/// # Returns
///
/// The trimmed title, if any, and the remaining body. When no title is
/// found the body is the whole input unchanged.
pub fn split_title(text: &str) -> (Option<String>, &str) {
    for re in [&*ATX_HEADING, &*SETEXT_HEADING] {
        if let Some(caps) = re.captures(text)
            && let (Some(whole), Some(header)) = (caps.get(0), caps.name("header"))
        {
            let title = header.as_str().trim();
            if title.is_empty() {
                continue;
            }
            return (Some(title.to_string()), &text[whole.end()..]);
        }
    }

    (None, text)
}
