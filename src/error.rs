//! Error types for the rendering pipeline.

use std::string::FromUtf8Error;

/// Result type for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;

/// Errors that fail the render of a whole document.
///
/// A failed render never yields partial HTML. Collaborator failures (missing
/// documents, git errors) are not represented here; they travel as
/// `anyhow::Error` from the source layer.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Unknown qualifier command '{command}'")]
    UnknownQualifier { command: String },

    #[error("Invalid qualifier '{command}': {reason}")]
    InvalidQualifier { command: String, reason: String },

    #[error("Qualifier markers are unbalanced after highlighting ({count} found)")]
    UnbalancedMarkers { count: usize },

    #[error("Raw HTML cannot be reparsed: {fragment}")]
    MalformedHtml { fragment: String },

    #[error("Highlight theme '{name}' is not available")]
    UnknownTheme { name: String },

    #[error("Syntax highlighting failed: {0}")]
    Highlight(#[from] syntect::Error),

    #[error("HTML serialization failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Rendered output is not valid UTF8: {0}")]
    Utf8(#[from] FromUtf8Error),

    #[error("HTML postprocessing failed: {0}")]
    Postprocess(String),
}
