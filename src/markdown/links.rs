//! Link resolution against the canonical site.

use log::trace;
use url::{ParseError, Url};

/// A rewritten link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub href: String,
    /// Whether the link leaves the canonical site.
    pub external: bool,
}

impl ResolvedLink {
    fn internal(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            external: false,
        }
    }
}

/// Resolves document links to absolute URLs on the canonical site.
///
/// Site-absolute links (`/a/b.md`) are prefixed with the base URL, relative
/// links (`../b.md`) are first resolved against the directory of the
/// current document. Both lose a trailing document extension, since the
/// canonical site serves pages without one.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    base_url: String,
    base_host: Option<String>,
    base_path: Vec<String>,
    extension: String,
}

impl LinkResolver {
    /// Creates resolver for a document directory.
    ///
    /// # Arguments
    ///
    /// * `base_url`: Canonical site root, such as `https://example.com/site`
    /// * `base_path`: Directory segments of the current document
    /// * `extension`: Document extension stripped from resolved links
    pub fn new(
        base_url: impl Into<String>,
        base_path: impl IntoIterator<Item = impl Into<String>>,
        extension: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into().trim_end_matches('/').to_string();
        let base_host = Url::parse(&base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase));
        Self {
            base_url,
            base_host,
            base_path: base_path.into_iter().map(Into::into).collect(),
            extension: extension.into(),
        }
    }

    /// Resolves one `href`.
    ///
    /// Cases, checked in order:
    /// - empty or fragment only: unchanged
    /// - absolute (`scheme:` or `//host`): unchanged, external when the
    ///   host differs from the base URL's host
    /// - site-absolute (`/path`): base URL + path, extension stripped
    /// - relative: resolved against the document directory, then as above
    ///
    /// Query strings and fragments survive resolution. A `..` with nothing
    /// left to pop is ignored, so links never climb above the site root.
    pub fn resolve(&self, href: &str) -> ResolvedLink {
        if href.is_empty() || href.starts_with('#') {
            return ResolvedLink::internal(href);
        }

        let parsed = match href.strip_prefix("//") {
            Some(rest) => Url::parse(&format!("https://{}", rest)),
            None => Url::parse(href),
        };
        match parsed {
            Ok(url) => {
                let external = match (url.host_str(), &self.base_host) {
                    (Some(host), Some(base)) => !host.eq_ignore_ascii_case(base),
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                return ResolvedLink {
                    href: href.to_string(),
                    external,
                };
            }
            Err(ParseError::RelativeUrlWithoutBase) => {}
            Err(e) => {
                trace!("Leaving unparsable link '{}' as written: {}", href, e);
                return ResolvedLink::internal(href);
            }
        }

        let (path, suffix) = split_suffix(href);
        let absolute = match path.strip_prefix('/') {
            Some(site_path) => format!("/{}", site_path),
            None => self.join_relative(path),
        };

        let stripped = absolute
            .strip_suffix(self.extension.as_str())
            .filter(|_| !self.extension.is_empty())
            .unwrap_or(absolute.as_str());
        let resolved = format!("{}{}{}", self.base_url, stripped, suffix);

        trace!("Resolved link '{}' to '{}'", href, resolved);
        ResolvedLink::internal(resolved)
    }

    /// Walks relative segments from the document directory.
    fn join_relative(&self, path: &str) -> String {
        let mut segments: Vec<&str> = self.base_path.iter().map(String::as_str).collect();

        for segment in path.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }

        let mut joined = format!("/{}", segments.join("/"));
        if path.ends_with('/') && !joined.ends_with('/') {
            joined.push('/');
        }
        joined
    }
}

/// Splits `href` into its path and its `?query#fragment` suffix.
fn split_suffix(href: &str) -> (&str, &str) {
    match href.find(['?', '#']) {
        Some(pos) => href.split_at(pos),
        None => (href, ""),
    }
}
