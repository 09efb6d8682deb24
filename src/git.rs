//! Git repository operations.

use anyhow::{Context, Result, anyhow, bail};
use gix::bstr::{BString, ByteSlice};
use std::path::Path;

/// File committed at some reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    path: BString,
    oid: gix::ObjectId,
}

impl FileEntry {
    /// File path relative to repository root, `/` separated.
    ///
    /// Returns None if the path is not valid UTF8.
    pub fn path(&self) -> Option<&str> {
        self.path.to_str().ok()
    }

    /// Blob id, equal for equal content.
    pub fn oid(&self) -> &gix::ObjectId {
        &self.oid
    }

    pub fn oid_hex(&self) -> String {
        self.oid.to_hex().to_string()
    }
}

fn open_repo(repo_path: &Path) -> Result<gix::Repository> {
    gix::open(repo_path)
        .with_context(|| format!("Failed to open repository at {}", repo_path.display()))
}

/// Resolves reference (branch, remote branch, tag or full commit id) to a commit.
fn resolve_commit<'a>(repo: &'a gix::Repository, ref_name: &str) -> Result<gix::Commit<'a>> {
    if let Ok(reference) = repo.find_reference(ref_name) {
        return reference
            .into_fully_peeled_id()
            .with_context(|| format!("Failed to peel reference '{}'", ref_name))?
            .object()
            .context("Failed to resolve object")?
            .try_into_commit()
            .map_err(|_| anyhow!("Reference '{}' does not point to a commit", ref_name));
    }

    let id = gix::ObjectId::from_hex(ref_name.as_bytes())
        .with_context(|| format!("Failed to find reference: {}", ref_name))?;
    repo.find_object(id)
        .with_context(|| format!("Failed to find object: {}", ref_name))?
        .try_into_commit()
        .map_err(|_| anyhow!("Object '{}' is not a commit", ref_name))
}

/// Returns the full commit id a reference points to.
///
/// # Errors
///
/// Returns error if the repository cannot be opened or the reference
/// cannot be resolved to a commit.
pub fn commit_id(repo_path: impl AsRef<Path>, ref_name: &str) -> Result<String> {
    let repo = open_repo(repo_path.as_ref())?;
    let commit = resolve_commit(&repo, ref_name)?;
    Ok(commit.id.to_hex().to_string())
}

fn commit_tree<'a>(repo: &'a gix::Repository, ref_name: &str) -> Result<gix::Tree<'a>> {
    resolve_commit(repo, ref_name)?
        .tree()
        .with_context(|| format!("Failed to read tree of {}", ref_name))
}

/// Reads a file as committed at a reference.
///
/// # Arguments
///
/// * `repo_path`: Path to git repository
/// * `ref_name`: Branch, remote branch, tag or commit id
/// * `file_path`: `/` separated path from the repository root
///
/// # Errors
///
/// Returns error if the reference does not resolve, or the path is missing
/// or names a directory.
pub fn read_blob(
    repo_path: impl AsRef<Path>,
    ref_name: &str,
    file_path: impl AsRef<Path>,
) -> Result<Vec<u8>> {
    let repo = open_repo(repo_path.as_ref())?;
    let mut tree = commit_tree(&repo, ref_name)?;
    let file_path = file_path.as_ref();

    let Some(entry) = tree
        .peel_to_entry_by_path(file_path)
        .with_context(|| format!("Failed to look up {}", file_path.display()))?
    else {
        bail!("File not found at {}: {}", ref_name, file_path.display());
    };

    let blob = entry
        .object()
        .with_context(|| format!("Failed to load object for {}", file_path.display()))?
        .try_into_blob()
        .map_err(|_| anyhow!("Not a file: {}", file_path.display()))?;

    Ok(blob.data.to_vec())
}

/// Lists every file at a reference, sorted by path.
///
/// # Errors
///
/// Returns error if the repository cannot be opened, the reference does
/// not resolve, or the tree cannot be walked.
///
/// # Examples
///
/// ```no_run
/// let files = andare::list_files(".", "origin/master")?;
/// let documents = files
///     .iter()
///     .filter_map(|f| f.path())
///     .filter(|p| p.ends_with(".md"))
///     .count();
/// println!("{} documents", documents);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn list_files(repo_path: impl AsRef<Path>, ref_name: &str) -> Result<Vec<FileEntry>> {
    let repo = open_repo(repo_path.as_ref())?;
    let tree = commit_tree(&repo, ref_name)?;

    let mut files: Vec<FileEntry> = tree
        .traverse()
        .breadthfirst
        .files()
        .with_context(|| format!("Failed to walk tree of {}", ref_name))?
        .into_iter()
        .map(|entry| FileEntry {
            path: entry.filepath,
            oid: entry.oid,
        })
        .collect();
    files.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(files)
}
