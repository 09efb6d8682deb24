//! Markdown to HTML renderer for a C++ reference wiki.
//!
//! Documents are read from a git repository, rendered with qualified code
//! blocks and site-absolute links, and reported to an issue tracker when
//! they fail.

mod config;
mod contents;
mod document;
mod error;
mod git;
mod highlight;
pub mod issues;
pub mod markdown;
pub mod page;
mod title;
mod util;

pub use config::{
    Command, Config, DEFAULT_BASE_URL, DEFAULT_DOC_EXTENSION, DEFAULT_THEME, RenderConfig,
};
pub use contents::{
    ChangeKind, ContentNode, ContentTree, DiffEntry, all_entries, diff_refs, is_document,
};
pub use document::{DocumentPath, DocumentSource, RefSource, WorktreeSource, render_document};
pub use error::{RenderError, RenderResult};
pub use git::{FileEntry, commit_id, list_files, read_blob};
pub use highlight::Highlighter;
pub use markdown::{MarkdownRenderer, RenderedPage};
pub use title::split_title;
