//! Documents and where their text comes from.

use anyhow::{Context, Result, bail};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::git;
use crate::markdown::{MarkdownRenderer, RenderedPage};
use crate::util::display_name;

/// Location of a document as `/` separated path segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentPath {
    segments: Vec<String>,
}

impl DocumentPath {
    /// Creates path from segments.
    ///
    /// # Errors
    ///
    /// Returns error if there are no segments or any segment is empty, `.`
    /// or `..`.
    pub fn new(segments: Vec<String>) -> Result<Self> {
        if segments.is_empty() {
            bail!("Document path is empty");
        }
        if let Some(bad) = segments
            .iter()
            .find(|s| s.is_empty() || *s == "." || *s == "..")
        {
            bail!("Invalid document path segment '{}' in {}", bad, segments.join("/"));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Directory segments, everything but the file name.
    pub fn base_path(&self) -> &[String] {
        &self.segments[..self.segments.len() - 1]
    }

    pub fn file_name(&self) -> &str {
        self.segments.last().map_or("", String::as_str)
    }

    /// Title used when the document has no leading heading.
    pub fn fallback_title(&self) -> &str {
        display_name(self.file_name())
    }
}

impl FromStr for DocumentPath {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim_matches('/');
        Self::new(trimmed.split('/').map(str::to_string).collect())
            .with_context(|| format!("Invalid document path: {}", s))
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("/"))
    }
}

/// Supplier of raw document text.
pub trait DocumentSource {
    /// Fetches the UTF8 text of a document.
    ///
    /// # Errors
    ///
    /// Returns error if the document does not exist, cannot be read, or is
    /// not valid UTF8.
    fn fetch(&self, path: &DocumentPath) -> Result<String>;
}

/// Documents as committed at a git reference.
#[derive(Debug, Clone)]
pub struct RefSource {
    repo: PathBuf,
    reference: String,
}

impl RefSource {
    pub fn new(repo: impl Into<PathBuf>, reference: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            reference: reference.into(),
        }
    }
}

impl DocumentSource for RefSource {
    fn fetch(&self, path: &DocumentPath) -> Result<String> {
        let bytes = git::read_blob(&self.repo, &self.reference, path.to_string())
            .with_context(|| format!("Failed to read {} at {}", path, self.reference))?;
        String::from_utf8(bytes).with_context(|| format!("Document is not valid UTF8: {}", path))
    }
}

/// Documents in the working tree of a checkout.
#[derive(Debug, Clone)]
pub struct WorktreeSource {
    root: PathBuf,
}

impl WorktreeSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DocumentSource for WorktreeSource {
    fn fetch(&self, path: &DocumentPath) -> Result<String> {
        let file = path
            .segments()
            .iter()
            .fold(self.root.clone(), |acc, s| acc.join(s));
        let bytes = std::fs::read(&file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        String::from_utf8(bytes).with_context(|| format!("Document is not valid UTF8: {}", path))
    }
}

/// Fetches a document and renders it.
///
/// # Errors
///
/// Returns error if fetching or rendering fails. Fetch errors are passed on
/// with their context intact.
pub fn render_document(
    source: &dyn DocumentSource,
    path: &DocumentPath,
    renderer: &MarkdownRenderer,
) -> Result<RenderedPage> {
    let text = source.fetch(path)?;
    renderer
        .render(path, &text)
        .with_context(|| format!("Failed to render {}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use std::collections::HashMap;

    struct MemorySource(HashMap<String, String>);

    impl DocumentSource for MemorySource {
        fn fetch(&self, path: &DocumentPath) -> Result<String> {
            self.0
                .get(&path.to_string())
                .cloned()
                .with_context(|| format!("No such document: {}", path))
        }
    }

    #[test]
    fn test_parse_document_path() {
        // Act
        let path: DocumentPath = "/reference/atomic/atomic.md/".parse().expect("Should parse");

        // Assert
        assert_eq!(path.segments(), &["reference", "atomic", "atomic.md"]);
        assert_eq!(path.base_path(), &["reference", "atomic"]);
        assert_eq!(path.file_name(), "atomic.md");
        assert_eq!(path.fallback_title(), "atomic");
        assert_eq!(path.to_string(), "reference/atomic/atomic.md");
    }

    #[test]
    fn test_root_document_has_empty_base_path() {
        let path: DocumentPath = "index.md".parse().expect("Should parse");
        assert!(path.base_path().is_empty());
    }

    #[test]
    fn test_reject_invalid_paths() {
        assert!("".parse::<DocumentPath>().is_err());
        assert!("a//b.md".parse::<DocumentPath>().is_err());
        assert!("a/../b.md".parse::<DocumentPath>().is_err());
        assert!(DocumentPath::new(vec![]).is_err());
    }

    #[test]
    fn test_render_document_from_source() {
        // Arrange
        let source = MemorySource(HashMap::from([(
            "lang/cpp11.md".to_string(),
            "C++11\n=====\n\n[auto](auto.md)\n".to_string(),
        )]));
        let renderer = MarkdownRenderer::new(RenderConfig::default()).expect("Should build");
        let path = "lang/cpp11.md".parse().expect("Should parse");

        // Act
        let page = render_document(&source, &path, &renderer).expect("Should render");

        // Assert
        assert_eq!(page.title, "C++11");
        assert!(
            page.html
                .contains("href=\"https://sites.google.com/site/cpprefjp/lang/auto\""),
            "{}",
            page.html
        );
    }

    #[test]
    fn test_render_document_missing_propagates() {
        // Arrange
        let source = MemorySource(HashMap::new());
        let renderer = MarkdownRenderer::new(RenderConfig::default()).expect("Should build");
        let path = "missing.md".parse().expect("Should parse");

        // Act
        let result = render_document(&source, &path, &renderer);

        // Assert
        let err = result.expect_err("Missing document should fail");
        assert!(err.to_string().contains("No such document: missing.md"));
    }

    #[test]
    fn test_worktree_source_reads_file() {
        // Arrange
        let dir = tempfile::TempDir::new().expect("Should create temp dir");
        std::fs::create_dir_all(dir.path().join("a")).expect("Should create dir");
        std::fs::write(dir.path().join("a/b.md"), "# B\n").expect("Should write");
        let source = WorktreeSource::new(dir.path());

        // Act
        let text = source
            .fetch(&"a/b.md".parse().expect("Should parse"))
            .expect("Should read");

        // Assert
        assert_eq!(text, "# B\n");
    }

    #[test]
    fn test_worktree_source_rejects_invalid_utf8() {
        // Arrange
        let dir = tempfile::TempDir::new().expect("Should create temp dir");
        std::fs::write(dir.path().join("bad.md"), [0xff, 0xfe]).expect("Should write");
        let source = WorktreeSource::new(dir.path());

        // Act
        let result = source.fetch(&"bad.md".parse().expect("Should parse"));

        // Assert
        assert!(result.is_err());
    }
}
