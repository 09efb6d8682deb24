//! Attribute and link rewriting on the rendered HTML tree.

use kuchikikiki::{Attribute, ExpandedName, NodeRef};
use log::trace;
use markup5ever::{QualName, local_name, ns};
use tendril::TendrilSink;

use super::links::LinkResolver;
use crate::error::{RenderError, RenderResult};

/// Inline style forced on code span text.
const CODE_STYLE: &str = "color: #000";

/// Rewrites elements of an HTML body fragment.
///
/// - `code`: text moves into a span with an explicit foreground color
/// - `table`: visible collapsed border
/// - `a`: `href` resolved to the canonical site, cross-domain links open in
///   a new browsing context
///
/// Elements are collected before any of them is touched, so inserting the
/// code spans never disturbs the traversal.
///
/// # Arguments
///
/// * `html`: Body fragment as produced by the Markdown converter
/// * `resolver`: Link resolver for the current document
///
/// # Errors
///
/// Returns error if the fragment has no body or fails to serialize.
pub fn postprocess(html: &str, resolver: &LinkResolver) -> RenderResult<String> {
    let document = kuchikikiki::parse_html().one(html);
    let body = document
        .select_first("body")
        .map_err(|()| RenderError::Postprocess("Parsed document has no body".to_string()))?;
    let body = body.as_node();

    let elements: Vec<NodeRef> = body
        .descendants()
        .filter(|node| node.as_element().is_some())
        .collect();

    for node in &elements {
        let Some(element) = node.as_element() else {
            continue;
        };

        let name = element.name.local.clone();
        if name == local_name!("code") {
            wrap_code_text(node);
        } else if name == local_name!("table") {
            let mut attributes = element.attributes.borrow_mut();
            attributes.insert("border", "1".to_string());
            attributes.insert("bordercolor", "#888".to_string());
            attributes.insert("style", "border-collapse:collapse".to_string());
        } else if name == local_name!("a") {
            let mut attributes = element.attributes.borrow_mut();
            let Some(href) = attributes.get(local_name!("href")).map(str::to_string) else {
                continue;
            };
            let link = resolver.resolve(&href);
            if link.href != href {
                trace!("Rewrote href '{}' to '{}'", href, link.href);
            }
            attributes.insert(local_name!("href"), link.href);
            if link.external {
                attributes.insert(local_name!("target"), "_blank".to_string());
            }
        }
    }

    let mut out = Vec::with_capacity(html.len());
    for child in body.children() {
        child.serialize(&mut out)?;
    }
    Ok(String::from_utf8(out)?)
}

/// Moves the children of a `code` element into a colored span.
fn wrap_code_text(code: &NodeRef) {
    let span = NodeRef::new_element(
        QualName::new(None, ns!(html), local_name!("span")),
        vec![(
            ExpandedName::new("", "style"),
            Attribute {
                prefix: None,
                value: CODE_STYLE.to_string(),
            },
        )],
    );

    let children: Vec<NodeRef> = code.children().collect();
    for child in children {
        span.append(child);
    }
    code.append(span);
}
