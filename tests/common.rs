//! Shared test utilities for integration tests.
//!
//! Provides helper functions for creating temporary git repositories and
//! performing common git operations used across multiple test files.

#![allow(dead_code)]

use anyhow::Result;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Runs a git command in the repository and returns its stdout.
///
/// # Errors
///
/// Returns error if git cannot be started or exits unsuccessfully
pub fn git(repo_path: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_path)
        .output()?;

    if !output.status.success() {
        anyhow::bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr)
        );
    }

    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

/// Creates temporary git repository on branch `master`.
///
/// # Errors
///
/// Returns error if git commands fail or directory creation fails
pub fn create_test_repo() -> Result<TempDir> {
    let dir = TempDir::new()?;
    let path = dir.path();

    git(path, &["init", "--initial-branch=master"])?;
    git(path, &["config", "user.name", "Test User"])?;
    git(path, &["config", "user.email", "test@example.com"])?;
    git(path, &["config", "commit.gpgsign", "false"])?;

    Ok(dir)
}

/// Commits staged changes and returns commit hash.
///
/// # Errors
///
/// Returns error if commit fails or hash cannot be retrieved
pub fn git_commit(repo_path: &Path, message: &str) -> Result<String> {
    git(repo_path, &["commit", "-m", message])?;
    git(repo_path, &["rev-parse", "HEAD"])
}

/// Stages files in repository.
///
/// # Errors
///
/// Returns error if git add fails
pub fn git_add(repo_path: &Path, files: &[&str]) -> Result<()> {
    let mut args = vec!["add", "-A", "--"];
    args.extend_from_slice(files);
    git(repo_path, &args)?;
    Ok(())
}

/// Writes file to repository, creating parent directories as needed.
///
/// # Errors
///
/// Returns error if directory creation or file write fails
pub fn write_file(repo_path: &Path, path: &str, content: &str) -> Result<()> {
    let file_path = repo_path.join(path);
    if let Some(parent) = file_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(file_path, content)?;
    Ok(())
}

/// Points `refs/remotes/origin/master` at the current HEAD, as a fetch
/// would after someone pushed.
///
/// # Errors
///
/// Returns error if the reference cannot be written
pub fn publish_head(repo_path: &Path) -> Result<()> {
    git(repo_path, &["update-ref", "refs/remotes/origin/master", "HEAD"])?;
    Ok(())
}

/// Builds a repository where `master` lags behind `origin/master`.
///
/// `master` holds the base commit. `origin/master` adds, changes and
/// removes documents on top of it.
///
/// # Errors
///
/// Returns error if any git step fails
pub fn create_diverged_repo() -> Result<TempDir> {
    let dir = create_test_repo()?;
    let path = dir.path();

    write_file(path, "README.md", "# Site\n")?;
    write_file(path, "index.md", "Top\n===\n\n[vector](reference/vector.md)\n")?;
    write_file(path, "reference/vector.md", "# vector\n\nold\n")?;
    write_file(path, "reference/list.md", "# list\n")?;
    git_add(path, &["."])?;
    let base = git_commit(path, "Base")?;

    write_file(path, "reference/vector.md", "# vector\n\nnew\n")?;
    write_file(path, "lang/cpp11.md", "C++11\n=====\n\n[auto](auto.md)\n")?;
    write_file(path, "README.md", "# Site\n\nchanged\n")?;
    std::fs::remove_file(path.join("reference/list.md"))?;
    git_add(path, &["."])?;
    git_commit(path, "Update")?;
    publish_head(path)?;

    git(path, &["reset", "--hard", &base])?;
    Ok(dir)
}
