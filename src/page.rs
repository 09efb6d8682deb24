//! Standalone HTML page for a rendered document.

use maud::{DOCTYPE, Markup, PreEscaped, html};

use crate::document::DocumentPath;
use crate::markdown::RenderedPage;

/// Inline styles for the page chrome. Code colors come from the highlighter.
const PAGE_STYLE: &str = "\
body { max-width: 960px; margin: 0 auto; padding: 1rem; font-family: sans-serif; }
pre { padding: 0.5rem; overflow-x: auto; }
footer { margin-top: 2rem; border-top: 1px solid #ccc; padding-top: 0.5rem; font-size: 0.9em; }";

/// Link to the source of a document on its hosting site.
pub fn edit_url(edit_base: &str, path: &DocumentPath) -> String {
    format!("{}/{}", edit_base.trim_end_matches('/'), path)
}

/// Wraps a rendered document in a full HTML page.
///
/// # Arguments
///
/// * `page`: Rendered title and body
/// * `edit_url`: Target of the "edit this page" footer link
///
/// # Returns
///
/// Complete HTML document with the body inserted unescaped
pub fn document_page(page: &RenderedPage, edit_url: &str) -> Markup {
    html! {
        (DOCTYPE)
        html lang="ja" {
            head {
                meta charset="utf-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (page.title) }
                style { (PreEscaped(PAGE_STYLE)) }
            }
            body {
                h1 { (page.title) }
                article {
                    (PreEscaped(&page.html))
                }
                footer {
                    a href=(edit_url) { "edit this page" }
                }
            }
        }
    }
}
