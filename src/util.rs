//! Utility functions for andare

use regex::Regex;

/// Returns a regex that never matches.
///
/// Fallback for statically known patterns whose compilation failed; the
/// failure is logged by the caller and the feature degrades to a no-op.
pub fn never_matching_regex() -> Regex {
    Regex::new(r"[^\s\S]").expect("Failed to compile never-matching regex")
}

/// Returns the display name of a path segment.
///
/// The name is everything before the first `.`, so `atomic.md` becomes
/// `atomic` and `foo.tar.gz` becomes `foo`. Segments without a dot are
/// returned unchanged.
///
/// # Arguments
///
/// * `segment`: Single path segment (no `/`)
pub fn display_name(segment: &str) -> &str {
    segment.split('.').next().unwrap_or(segment)
}

/// Returns true when `c` may appear inside an identifier.
pub fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}
