//! Changed documents between two references, as a directory tree.
//!
//! The tree is what publishing tools consume to decide which pages to
//! create, update or delete. It serializes to nested JSON objects keyed by
//! path segment:
//!
//! ```json
//! {
//!   "file1.md": {"type": "file", "command": "update", "name": "file1", "path": "file1.md"},
//!   "dir1": {"type": "directory", "name": "dir1", "children": {...}}
//! }
//! ```

use anyhow::{Result, bail};
use log::{debug, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::git::{self, FileEntry};
use crate::util::display_name;

/// How a document changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Append,
    Update,
    Delete,
}

/// One changed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry {
    pub kind: ChangeKind,
    pub path: String,
}

impl DiffEntry {
    pub fn new(kind: ChangeKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Parses `git diff --name-status` output.
    ///
    /// Understands `A`, `M` and `D`. A rename (`R<score>`) becomes a delete
    /// of the old path and an append of the new one.
    ///
    /// # Errors
    ///
    /// Returns error for an unknown status or a line without a path.
    pub fn parse_name_status(text: &str) -> Result<Vec<Self>> {
        let mut entries = Vec::new();

        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let fields: Vec<&str> = line.split('\t').collect();
            let (status, paths) = match fields.split_first() {
                Some((status, paths)) if !paths.is_empty() => (*status, paths),
                _ => bail!("Malformed name-status line: {}", line),
            };

            match (status, paths) {
                ("A", [path]) => entries.push(Self::new(ChangeKind::Append, *path)),
                ("M", [path]) => entries.push(Self::new(ChangeKind::Update, *path)),
                ("D", [path]) => entries.push(Self::new(ChangeKind::Delete, *path)),
                (s, [from, to]) if s.starts_with('R') => {
                    entries.push(Self::new(ChangeKind::Delete, *from));
                    entries.push(Self::new(ChangeKind::Append, *to));
                }
                _ => bail!("Unknown change status '{}' in line: {}", status, line),
            }
        }

        Ok(entries)
    }
}

/// Compares the trees of two references.
///
/// Paths only at `remote` are appends, paths at both with different
/// content are updates, and paths only at `local` are deletes.
///
/// # Errors
///
/// Returns error if either reference cannot be listed.
pub fn diff_refs(repo: impl AsRef<Path>, local: &str, remote: &str) -> Result<Vec<DiffEntry>> {
    let repo = repo.as_ref();
    let local_files = by_path(git::list_files(repo, local)?);
    let remote_files = by_path(git::list_files(repo, remote)?);

    let mut entries = Vec::new();
    for (path, oid) in &remote_files {
        match local_files.get(path) {
            None => entries.push(DiffEntry::new(ChangeKind::Append, path.as_str())),
            Some(local_oid) if local_oid != oid => {
                entries.push(DiffEntry::new(ChangeKind::Update, path.as_str()))
            }
            Some(_) => {}
        }
    }
    for path in local_files.keys() {
        if !remote_files.contains_key(path) {
            entries.push(DiffEntry::new(ChangeKind::Delete, path.as_str()));
        }
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    debug!("{} change(s) between {} and {}", entries.len(), local, remote);
    Ok(entries)
}

/// Every file at a reference, listed as an update.
///
/// # Errors
///
/// Returns error if the reference cannot be listed.
pub fn all_entries(repo: impl AsRef<Path>, reference: &str) -> Result<Vec<DiffEntry>> {
    Ok(by_path(git::list_files(repo, reference)?)
        .into_keys()
        .map(|path| DiffEntry::new(ChangeKind::Update, path))
        .collect())
}

fn by_path(files: Vec<FileEntry>) -> BTreeMap<String, gix::ObjectId> {
    files
        .into_iter()
        .filter_map(|f| {
            let oid = *f.oid();
            match f.path() {
                Some(path) => Some((path.to_string(), oid)),
                None => {
                    warn!("Skipping non UTF8 path with object {}", f.oid_hex());
                    None
                }
            }
        })
        .collect()
}

/// Returns true when a file name is a publishable document.
///
/// Names starting with an uppercase letter (README.md, CONTRIBUTING.md)
/// are repository files rather than pages.
pub fn is_document(file_name: &str, extension: &str) -> bool {
    let uppercase = file_name.chars().next().is_some_and(char::is_uppercase);
    !uppercase && file_name.ends_with(extension)
}

/// Node of a [`ContentTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentNode {
    Directory {
        name: String,
        children: ContentTree,
    },
    File {
        command: ChangeKind,
        name: String,
        path: String,
    },
}

/// Changed documents nested by directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ContentTree(BTreeMap<String, ContentNode>);

impl ContentTree {
    /// Builds tree from diff entries, keeping only documents.
    ///
    /// # Arguments
    ///
    /// * `entries`: Changed paths
    /// * `extension`: Document extension, such as `.md`
    pub fn from_entries<'a>(
        entries: impl IntoIterator<Item = &'a DiffEntry>,
        extension: &str,
    ) -> Self {
        let mut tree = Self::default();

        for entry in entries {
            let segments: Vec<&str> = entry.path.split('/').collect();
            let Some((file, dirs)) = segments.split_last() else {
                continue;
            };
            if !is_document(file, extension) {
                debug!("Skipping non-document {}", entry.path);
                continue;
            }

            tree.insert(
                dirs,
                file,
                ContentNode::File {
                    command: entry.kind,
                    name: display_name(file).to_string(),
                    path: entry.path.clone(),
                },
            );
        }

        tree
    }

    fn insert(&mut self, dirs: &[&str], file: &str, node: ContentNode) {
        let mut current = &mut self.0;
        for dir in dirs {
            let entry = current
                .entry((*dir).to_string())
                .or_insert_with(|| ContentNode::Directory {
                    name: display_name(dir).to_string(),
                    children: ContentTree::default(),
                });
            match entry {
                ContentNode::Directory { children, .. } => current = &mut children.0,
                ContentNode::File { path, .. } => {
                    warn!("Directory {} collides with file {}", dir, path);
                    return;
                }
            }
        }
        current.insert(file.to_string(), node);
    }

    pub fn get(&self, segment: &str) -> Option<&ContentNode> {
        self.0.get(segment)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Document paths in the tree, depth first in key order.
    pub fn paths(&self) -> Vec<(&str, ChangeKind)> {
        let mut out = Vec::new();
        for node in self.0.values() {
            match node {
                ContentNode::Directory { children, .. } => out.extend(children.paths()),
                ContentNode::File { command, path, .. } => out.push((path.as_str(), *command)),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<DiffEntry> {
        DiffEntry::parse_name_status(
            "M\tf1.md\nA\tf2.md\nM\td1/f2.md\nD\td1/f3.md\nM\tUpper.md\nD\tignored.txt\n",
        )
        .expect("Should parse")
    }

    #[test]
    fn test_parse_name_status() {
        // Act
        let entries = sample();

        // Assert
        assert_eq!(entries.len(), 6);
        assert_eq!(entries[0], DiffEntry::new(ChangeKind::Update, "f1.md"));
        assert_eq!(entries[1], DiffEntry::new(ChangeKind::Append, "f2.md"));
        assert_eq!(entries[3], DiffEntry::new(ChangeKind::Delete, "d1/f3.md"));
    }

    #[test]
    fn test_parse_name_status_rename_and_empty() {
        // Act
        let entries = DiffEntry::parse_name_status("R087\told.md\tnew.md\n\n").expect("Should parse");

        // Assert
        assert_eq!(
            entries,
            vec![
                DiffEntry::new(ChangeKind::Delete, "old.md"),
                DiffEntry::new(ChangeKind::Append, "new.md"),
            ]
        );
        assert!(DiffEntry::parse_name_status("").expect("Should parse").is_empty());
    }

    #[test]
    fn test_parse_name_status_unknown_status() {
        // Act
        let result = DiffEntry::parse_name_status("X\tfile.md");

        // Assert
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("'X'"));
    }

    #[test]
    fn test_parse_name_status_missing_path() {
        assert!(DiffEntry::parse_name_status("M").is_err());
    }

    #[test]
    fn test_tree_from_entries() {
        // Arrange
        let entries = sample();

        // Act
        let tree = ContentTree::from_entries(&entries, ".md");

        // Assert
        assert_eq!(tree.len(), 3);
        assert_eq!(
            tree.get("f1.md"),
            Some(&ContentNode::File {
                command: ChangeKind::Update,
                name: "f1".to_string(),
                path: "f1.md".to_string(),
            })
        );
        assert!(matches!(
            tree.get("f2.md"),
            Some(ContentNode::File { command: ChangeKind::Append, .. })
        ));
        match tree.get("d1") {
            Some(ContentNode::Directory { name, children }) => {
                assert_eq!(name, "d1");
                assert_eq!(children.len(), 2);
                assert!(matches!(
                    children.get("f2.md"),
                    Some(ContentNode::File { command: ChangeKind::Update, .. })
                ));
                assert!(matches!(
                    children.get("f3.md"),
                    Some(ContentNode::File { command: ChangeKind::Delete, .. })
                ));
            }
            other => panic!("Expected directory, got {:?}", other),
        }
        assert!(tree.get("Upper.md").is_none());
        assert!(tree.get("ignored.txt").is_none());
    }

    #[test]
    fn test_tree_json_shape() {
        // Arrange
        let entries = vec![
            DiffEntry::new(ChangeKind::Update, "dir1.md"),
            DiffEntry::new(ChangeKind::Delete, "dir1/file3.md"),
        ];

        // Act
        let json = serde_json::to_value(ContentTree::from_entries(&entries, ".md"))
            .expect("Should serialize");

        // Assert
        assert_eq!(
            json,
            serde_json::json!({
                "dir1.md": {"type": "file", "command": "update", "name": "dir1", "path": "dir1.md"},
                "dir1": {
                    "type": "directory",
                    "name": "dir1",
                    "children": {
                        "file3.md": {"type": "file", "command": "delete", "name": "file3", "path": "dir1/file3.md"}
                    }
                }
            })
        );
    }

    #[test]
    fn test_tree_paths_depth_first() {
        // Arrange
        let tree = ContentTree::from_entries(&sample(), ".md");

        // Act
        let paths = tree.paths();

        // Assert
        assert_eq!(
            paths,
            vec![
                ("d1/f2.md", ChangeKind::Update),
                ("d1/f3.md", ChangeKind::Delete),
                ("f1.md", ChangeKind::Update),
                ("f2.md", ChangeKind::Append),
            ]
        );
    }

    #[test]
    fn test_is_document() {
        assert!(is_document("vector.md", ".md"));
        assert!(!is_document("README.md", ".md"));
        assert!(!is_document("logo.png", ".md"));
        assert!(is_document("_dummy.md", ".md"));
    }

    #[test]
    fn test_directory_file_collision_skipped() {
        // Arrange
        let entries = vec![
            DiffEntry::new(ChangeKind::Update, "a.md"),
            DiffEntry::new(ChangeKind::Update, "a.md/b.md"),
        ];

        // Act
        let tree = ContentTree::from_entries(&entries, ".md");

        // Assert
        assert_eq!(tree.paths(), vec![("a.md", ChangeKind::Update)]);
    }
}
