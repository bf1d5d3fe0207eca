//! Display text and the string identities derived from it.
//!
//! Node handles never outlive a detection pass; statistics are keyed by
//! [`element_key`] and [`page_key`] instead. Two different controls with the
//! same label share one key. That collision is accepted.

#![allow(missing_docs)]

use url::Url;

use crate::dom::Dom;

/// Label for a candidate, in priority order: `aria-label`, `data-tooltip`,
/// `title`, trimmed text content of 1..=99 chars, then the tag name (or the
/// role when the tag is empty).
pub fn button_text<D: Dom>(dom: &D, node: &D::Node) -> String {
    for attr in ["aria-label", "data-tooltip", "title"] {
        if let Some(value) = dom.attribute(node, attr)
            && !value.is_empty()
        {
            return value;
        }
    }

    if let Some(text) = dom.text_content(node) {
        let trimmed = text.trim();
        let len = trimmed.chars().count();
        if (1..100).contains(&len) {
            return trimmed.to_string();
        }
    }

    let tag = dom.tag_name(node).to_lowercase();
    if !tag.is_empty() {
        return tag;
    }
    dom.attribute(node, "role")
        .filter(|r| !r.is_empty())
        .unwrap_or_else(|| "button".to_string())
}

/// Statistics key for a label: whitespace collapsed, trimmed, cut to
/// `max_chars` characters.
#[must_use]
pub fn element_key(label: &str, max_chars: usize) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(max_chars)
        .collect()
}

/// Short selector-like hint: `#id`, else `tag.class1.class2`, else `tag`.
pub fn selector_hint<D: Dom>(dom: &D, node: &D::Node) -> String {
    let tag = dom.tag_name(node).to_lowercase();
    if let Some(id) = dom.attribute(node, "id").filter(|id| !id.is_empty()) {
        return format!("#{id}");
    }
    let classes = dom
        .attribute(node, "class")
        .map(|class| {
            class
                .split_whitespace()
                .take(2)
                .collect::<Vec<_>>()
                .join(".")
        })
        .unwrap_or_default();
    if classes.is_empty() {
        tag
    } else {
        format!("{tag}.{classes}")
    }
}

/// Coarse page identity: `host + "/" + first path segment`.
///
/// `https://mail.example.com/inbox/123` → `mail.example.com/inbox`;
/// a bare host yields `host/`; anything unparseable or host-less yields
/// `unknown/`.
#[must_use]
pub fn page_key(location: &str) -> String {
    let Ok(url) = Url::parse(location) else {
        return "unknown/".to_string();
    };
    let Some(host) = url.host_str() else {
        return "unknown/".to_string();
    };
    let first = url
        .path_segments()
        .and_then(|mut segments| segments.next())
        .unwrap_or("");
    format!("{host}/{first}")
}
