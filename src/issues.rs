//! Issue tracker reports for documents that fail to render.
//!
//! After a publishing run, every document that failed is listed in one
//! issue per commit, titled `Update Error: <commit id>`. Later runs on the
//! same commit append to that issue. Once the commit renders cleanly the
//! issue is closed.

use anyhow::{Context, Result};
use log::info;
use std::fmt::Write as _;

/// Issue as seen by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub open: bool,
}

/// Edit applied to an existing issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueChange {
    pub body: Option<String>,
    pub close: bool,
}

/// Issue tracker client.
pub trait IssueTracker {
    /// Lists open issues.
    fn list_issues(&self) -> Result<Vec<Issue>>;

    /// Opens a new issue.
    fn create_issue(&mut self, title: &str, body: &str) -> Result<Issue>;

    /// Edits an existing issue.
    fn update_issue(&mut self, number: u64, change: IssueChange) -> Result<Issue>;
}

/// Title of the issue that tracks failures for a commit.
pub fn issue_title(commit_id: &str) -> String {
    format!("Update Error: {}", commit_id)
}

/// Where report rows link to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLinks {
    /// Repository page, such as `https://github.com/cpprefjp/site`.
    pub repo_url: String,
    /// Branch files are linked at.
    pub branch: String,
    /// Site that re-renders a document for checking.
    pub check_url: String,
}

/// Failures of one publishing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub commit_id: String,
    /// Document paths that failed to render.
    pub failures: Vec<String>,
    /// Time of the next scheduled run, if known.
    pub next_run: Option<String>,
}

impl ErrorReport {
    fn table(&self, links: &ReportLinks) -> String {
        let mut table = String::from("| File | Check |\n|------|-------|\n");
        for path in &self.failures {
            let _ = writeln!(
                table,
                "| [/{path}]({repo}/blob/{branch}/{path}) | [check]({check}/view/{path}) |",
                path = path,
                repo = links.repo_url.trim_end_matches('/'),
                branch = links.branch,
                check = links.check_url.trim_end_matches('/'),
            );
        }
        table
    }

    fn next_run_line(&self) -> String {
        match &self.next_run {
            Some(at) => format!("\nThe next scheduled run is at [{}].\n", at),
            None => String::new(),
        }
    }

    /// Body of a newly opened issue.
    pub fn new_issue_body(&self, links: &ReportLinks) -> String {
        format!(
            "Automatic update failed.\n\n\
             Fix the files below and make sure their check pages open without errors.\n\n\
             {}{}",
            self.table(links),
            self.next_run_line()
        )
    }

    /// Section appended to an existing issue.
    pub fn update_section(&self, links: &ReportLinks, updated_at: jiff::Timestamp) -> String {
        format!(
            "\n\n---- Updated at {} ----\n\
             Some files are still failing.\n\n\
             {}{}",
            updated_at.strftime("%Y-%m-%d %H:%M:%S UTC"),
            self.table(links),
            self.next_run_line()
        )
    }
}

/// Note appended when an issue is closed.
pub const CLOSING_NOTE: &str = "\n\n---- Closed by andare ----\nThe fix has been confirmed, closing.";

fn find_issue(tracker: &dyn IssueTracker, title: &str) -> Result<Option<Issue>> {
    Ok(tracker
        .list_issues()
        .context("Failed to list issues")?
        .into_iter()
        .find(|issue| issue.open && issue.title == title))
}

/// Files or updates the issue for a run's failures.
///
/// # Arguments
///
/// * `tracker`: Issue tracker client
/// * `report`: Failed documents of the run
/// * `links`: Link targets for the failure table
/// * `updated_at`: Time stamped on an update section
///
/// # Returns
///
/// The created or updated issue
///
/// # Errors
///
/// Returns error if the tracker fails.
pub fn register_errors(
    tracker: &mut dyn IssueTracker,
    report: &ErrorReport,
    links: &ReportLinks,
    updated_at: jiff::Timestamp,
) -> Result<Issue> {
    let title = issue_title(&report.commit_id);

    match find_issue(tracker, &title)? {
        Some(issue) => {
            info!("Updating issue #{} for {}", issue.number, report.commit_id);
            let body = format!("{}{}", issue.body, report.update_section(links, updated_at));
            tracker
                .update_issue(
                    issue.number,
                    IssueChange {
                        body: Some(body),
                        close: false,
                    },
                )
                .with_context(|| format!("Failed to update issue #{}", issue.number))
        }
        None => {
            info!("Opening issue for {}", report.commit_id);
            tracker
                .create_issue(&title, &report.new_issue_body(links))
                .context("Failed to create issue")
        }
    }
}

/// Closes the failure issue of a commit, if there is one.
///
/// # Returns
///
/// Whether an issue was closed
///
/// # Errors
///
/// Returns error if the tracker fails.
pub fn resolve_errors(tracker: &mut dyn IssueTracker, commit_id: &str) -> Result<bool> {
    let title = issue_title(commit_id);
    let Some(issue) = find_issue(tracker, &title)? else {
        return Ok(false);
    };

    info!("Closing issue #{} for {}", issue.number, commit_id);
    tracker
        .update_issue(
            issue.number,
            IssueChange {
                body: Some(format!("{}{}", issue.body, CLOSING_NOTE)),
                close: true,
            },
        )
        .with_context(|| format!("Failed to close issue #{}", issue.number))?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MemoryTracker {
        issues: Vec<Issue>,
    }

    impl IssueTracker for MemoryTracker {
        fn list_issues(&self) -> Result<Vec<Issue>> {
            Ok(self.issues.iter().filter(|i| i.open).cloned().collect())
        }

        fn create_issue(&mut self, title: &str, body: &str) -> Result<Issue> {
            let issue = Issue {
                number: self.issues.len() as u64 + 1,
                title: title.to_string(),
                body: body.to_string(),
                open: true,
            };
            self.issues.push(issue.clone());
            Ok(issue)
        }

        fn update_issue(&mut self, number: u64, change: IssueChange) -> Result<Issue> {
            let issue = self
                .issues
                .iter_mut()
                .find(|i| i.number == number)
                .context("No such issue")?;
            if let Some(body) = change.body {
                issue.body = body;
            }
            if change.close {
                issue.open = false;
            }
            Ok(issue.clone())
        }
    }

    fn links() -> ReportLinks {
        ReportLinks {
            repo_url: "https://github.com/cpprefjp/site".to_string(),
            branch: "master".to_string(),
            check_url: "https://check.example.com/".to_string(),
        }
    }

    fn report(failures: &[&str]) -> ErrorReport {
        ErrorReport {
            commit_id: "abc123".to_string(),
            failures: failures.iter().map(|s| s.to_string()).collect(),
            next_run: Some("2026-10-20 03:00".to_string()),
        }
    }

    fn at() -> jiff::Timestamp {
        jiff::Timestamp::from_second(1_700_000_000).expect("Should build timestamp")
    }

    #[test]
    fn test_issue_title() {
        assert_eq!(issue_title("abc123"), "Update Error: abc123");
    }

    #[test]
    fn test_register_creates_issue() {
        // Arrange
        let mut tracker = MemoryTracker::default();

        // Act
        let issue = register_errors(&mut tracker, &report(&["reference/vector.md"]), &links(), at())
            .expect("Should register");

        // Assert
        assert_eq!(issue.title, "Update Error: abc123");
        assert!(issue.body.starts_with("Automatic update failed."));
        assert!(issue.body.contains(
            "| [/reference/vector.md](https://github.com/cpprefjp/site/blob/master/reference/vector.md) \
             | [check](https://check.example.com/view/reference/vector.md) |"
        ), "{}", issue.body);
        assert!(issue.body.ends_with("The next scheduled run is at [2026-10-20 03:00].\n"));
        assert_eq!(tracker.issues.len(), 1);
    }

    #[test]
    fn test_register_updates_existing_issue() {
        // Arrange
        let mut tracker = MemoryTracker::default();
        register_errors(&mut tracker, &report(&["a.md", "b.md"]), &links(), at())
            .expect("Should register");

        // Act
        let issue = register_errors(&mut tracker, &report(&["b.md"]), &links(), at())
            .expect("Should update");

        // Assert
        assert_eq!(tracker.issues.len(), 1, "Should reuse the open issue");
        assert!(issue.body.contains("---- Updated at 2023-11-14 22:13:20 UTC ----"), "{}", issue.body);
        assert_eq!(issue.body.matches("| [/b.md]").count(), 2);
    }

    #[test]
    fn test_register_ignores_closed_issue() {
        // Arrange
        let mut tracker = MemoryTracker::default();
        register_errors(&mut tracker, &report(&["a.md"]), &links(), at()).expect("Should register");
        resolve_errors(&mut tracker, "abc123").expect("Should resolve");

        // Act
        register_errors(&mut tracker, &report(&["a.md"]), &links(), at()).expect("Should register");

        // Assert
        assert_eq!(tracker.issues.len(), 2);
    }

    #[test]
    fn test_resolve_closes_issue() {
        // Arrange
        let mut tracker = MemoryTracker::default();
        register_errors(&mut tracker, &report(&["a.md"]), &links(), at()).expect("Should register");

        // Act
        let closed = resolve_errors(&mut tracker, "abc123").expect("Should resolve");

        // Assert
        assert!(closed);
        assert!(!tracker.issues[0].open);
        assert!(tracker.issues[0].body.ends_with(CLOSING_NOTE));
    }

    #[test]
    fn test_resolve_without_issue() {
        // Arrange
        let mut tracker = MemoryTracker::default();

        // Act
        let closed = resolve_errors(&mut tracker, "def456").expect("Should resolve");

        // Assert
        assert!(!closed);
    }

    #[test]
    fn test_body_without_next_run() {
        // Arrange
        let mut r = report(&["a.md"]);
        r.next_run = None;

        // Act
        let body = r.new_issue_body(&links());

        // Assert
        assert!(!body.contains("next scheduled run"));
        assert!(body.ends_with("|\n"));
    }
}
