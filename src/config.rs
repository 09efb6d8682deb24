//! Command line and rendering configuration.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use url::Url;

/// Canonical site the wiki is published to.
pub const DEFAULT_BASE_URL: &str = "https://sites.google.com/site/cpprefjp";

/// Extension of wiki documents.
pub const DEFAULT_DOC_EXTENSION: &str = ".md";

/// syntect theme used for fenced code.
pub const DEFAULT_THEME: &str = "InspiredGitHub";

/// Settings threaded through every render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Root URL that site-absolute and relative links resolve against.
    pub base_url: String,
    /// Document extension, stripped from resolved links.
    pub doc_extension: String,
    /// syntect theme name.
    pub highlight_theme: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            doc_extension: DEFAULT_DOC_EXTENSION.to_string(),
            highlight_theme: DEFAULT_THEME.to_string(),
        }
    }
}

impl RenderConfig {
    /// Validates configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the base URL does not parse or has no host, or the
    /// extension does not start with a dot.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("Base URL must be absolute: {}", self.base_url))?;
        if url.host_str().is_none_or(str::is_empty) {
            bail!("Base URL has no host: {}", self.base_url);
        }

        if !self.doc_extension.starts_with('.') || self.doc_extension.len() < 2 {
            bail!(
                "Document extension must start with '.': {}",
                self.doc_extension
            );
        }

        Ok(())
    }
}

/// Command line configuration for andare.
#[derive(Debug, Clone, Parser)]
#[command(name = "andare", version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,

    /// Repository path
    #[arg(long, global = true, default_value = ".")]
    pub repo: PathBuf,

    /// Canonical site URL that links resolve against
    #[arg(long, global = true, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Document extension
    #[arg(long, global = true, default_value = DEFAULT_DOC_EXTENSION)]
    pub extension: String,

    /// Syntax highlighting theme (InspiredGitHub, base16-ocean.light, etc.)
    #[arg(long, global = true, default_value = DEFAULT_THEME)]
    pub theme: String,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Render one document to JSON with its title and HTML
    Render {
        /// Document path inside the repository, such as reference/vector.md
        path: String,

        /// Git reference to read the document from
        #[arg(long = "ref", default_value = "HEAD", conflicts_with = "worktree")]
        reference: String,

        /// Read the document from the working tree instead
        #[arg(long)]
        worktree: bool,
    },

    /// Render one document as a standalone HTML page
    View {
        /// Document path inside the repository
        path: String,

        /// Git reference to read the document from
        #[arg(long = "ref", default_value = "HEAD")]
        reference: String,

        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Open the written page in the default browser
        #[arg(long, requires = "output")]
        open: bool,

        /// Base URL for "edit this page" links
        #[arg(long, default_value = "https://github.com/cpprefjp/site/edit/master")]
        edit_base: String,
    },

    /// List documents changed between two references as a JSON tree
    Contents {
        /// Local reference
        #[arg(long, default_value = "master")]
        local: String,

        /// Remote reference
        #[arg(long, default_value = "origin/master")]
        remote: String,

        /// Read `git diff --name-status` output from FILE (`-` for stdin)
        /// instead of comparing references
        #[arg(long, value_name = "FILE")]
        name_status: Option<PathBuf>,
    },

    /// List every document at a reference as a JSON tree
    AllContents {
        /// Git reference to list
        #[arg(long = "ref", default_value = "HEAD")]
        reference: String,
    },

    /// Render every changed document and report failures
    Check {
        /// Local reference
        #[arg(long, default_value = "master")]
        local: String,

        /// Remote reference
        #[arg(long, default_value = "origin/master")]
        remote: String,

        /// Repository page URL used in report links
        #[arg(long, default_value = "https://github.com/cpprefjp/site")]
        repo_url: String,

        /// Site URL of the page that re-checks a document
        #[arg(long, default_value = "https://cpprefjp-autoupdate.herokuapp.com")]
        check_url: String,

        /// Time of the next scheduled run, shown in the report
        #[arg(long)]
        next_run: Option<String>,
    },
}

impl Config {
    /// Parses configuration from command line arguments.
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    /// Returns the rendering settings selected on the command line.
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig {
            base_url: self.base_url.clone(),
            doc_extension: self.extension.clone(),
            highlight_theme: self.theme.clone(),
        }
    }

    /// Validates configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the repository path does not exist or the render
    /// settings are invalid.
    pub fn validate(&self) -> Result<()> {
        if !self.repo.exists() {
            bail!("Repository path does not exist: {}", self.repo.display());
        }

        self.render_config().validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_config_defaults() {
        // Act
        let config = RenderConfig::default();

        // Assert
        assert_eq!(config.base_url, "https://sites.google.com/site/cpprefjp");
        assert_eq!(config.doc_extension, ".md");
        assert_eq!(config.highlight_theme, "InspiredGitHub");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_relative_base_url() {
        // Arrange
        let config = RenderConfig {
            base_url: "sites.google.com/site".to_string(),
            ..RenderConfig::default()
        };

        // Act
        let result = config.validate();

        // Assert
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("absolute"));
    }

    #[test]
    fn test_validate_accepts_userinfo_and_port() {
        let config = RenderConfig {
            base_url: "https://user:p@ss@wiki.example.com:8443/site".to_string(),
            ..RenderConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_host() {
        let config = RenderConfig {
            base_url: "mailto:someone@example.com".to_string(),
            ..RenderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_extension_without_dot() {
        let config = RenderConfig {
            doc_extension: "md".to_string(),
            ..RenderConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_render_command() {
        // Act
        let config = Config::try_parse_from([
            "andare",
            "render",
            "reference/vector.md",
            "--ref",
            "origin/master",
            "-vv",
        ])
        .expect("Should parse");

        // Assert
        assert_eq!(config.verbose, 2);
        assert_eq!(config.repo, PathBuf::from("."));
        match config.command {
            Command::Render {
                path,
                reference,
                worktree,
            } => {
                assert_eq!(path, "reference/vector.md");
                assert_eq!(reference, "origin/master");
                assert!(!worktree);
            }
            other => panic!("Expected render command, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        // Act
        let config = Config::try_parse_from([
            "andare",
            "contents",
            "--base-url",
            "https://example.com",
            "--theme",
            "base16-ocean.light",
        ])
        .expect("Should parse");

        // Assert
        let render = config.render_config();
        assert_eq!(render.base_url, "https://example.com");
        assert_eq!(render.highlight_theme, "base16-ocean.light");
        assert!(matches!(
            config.command,
            Command::Contents { ref local, ref remote, name_status: None }
                if local == "master" && remote == "origin/master"
        ));
    }

    #[test]
    fn test_worktree_conflicts_with_ref() {
        // Act
        let result = Config::try_parse_from([
            "andare", "render", "a.md", "--ref", "main", "--worktree",
        ]);

        // Assert
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_existing_path() {
        // Arrange
        let config = Config::try_parse_from(["andare", "all-contents"]).expect("Should parse");

        // Act
        let result = config.validate();

        // Assert
        assert!(result.is_ok(), "Current directory should be valid");
    }
}
