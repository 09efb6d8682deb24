//! Markdown rendering for wiki documents.
//!
//! Rendering runs in this order: qualified fenced blocks are highlighted and
//! stashed, comrak converts the rest (raw HTML is stashed too), the HTML
//! tree is rewritten for code, tables and links, and finally the stash is
//! restored with raw fragments sanitized.

mod fence;
mod links;
mod postprocess;
mod qualifier;
mod renderer;
mod sanitize;
mod stash;

pub use fence::{FencedBlock, Segment, scan};
pub use links::{LinkResolver, ResolvedLink};
pub use postprocess::postprocess;
pub use qualifier::{Command, Marks, Qualifier};
pub use renderer::{MarkdownRenderer, RenderedPage};
pub use sanitize::{ALLOWED_TAGS, sanitize_fragment};
pub use stash::{HtmlStash, StashKind};
