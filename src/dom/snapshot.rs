//! In-memory page model implementing [`Dom`].
//!
//! A snapshot is a flat list of elements in document order, each carrying the
//! geometry and style a live page would report. It is what the CLI loads from
//! JSON and what the test-suite drives the whole core against. Mutating
//! operations are recorded as [`Effect`]s so callers can assert on them.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::geometry::{ComputedStyle, Rect, Viewport};
use super::query::NodeQuery;
use super::Dom;
use crate::core::errors::{Result, SmartNavError};

/// Handle into a [`PageSnapshot`]: the element's document-order index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// One element of the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotElement {
    pub tag: String,
    pub attributes: BTreeMap<String, String>,
    pub text: Option<String>,
    /// `None` simulates an element whose geometry cannot be read.
    pub rect: Option<Rect>,
    pub style: ComputedStyle,
    /// Overrides the native focusability derived from tag/attributes.
    pub focusable: Option<bool>,
    pub content_editable: bool,
    /// A removed element: every mutation on it fails.
    pub detached: bool,
}

impl Default for SnapshotElement {
    fn default() -> Self {
        Self {
            tag: "div".to_string(),
            attributes: BTreeMap::new(),
            text: None,
            rect: Some(Rect::default()),
            style: ComputedStyle::default(),
            focusable: None,
            content_editable: false,
            detached: false,
        }
    }
}

impl SnapshotElement {
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes
            .insert(name.to_ascii_lowercase(), value.to_string());
        self
    }

    #[must_use]
    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    #[must_use]
    pub fn rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.rect = Some(Rect::new(x, y, width, height));
        self
    }

    #[must_use]
    pub fn style(mut self, style: ComputedStyle) -> Self {
        self.style = style;
        self
    }

    #[must_use]
    pub fn content_editable(mut self) -> Self {
        self.content_editable = true;
        self
    }

    fn natively_focusable(&self) -> bool {
        match self.tag.as_str() {
            "button" | "input" | "select" | "textarea" => true,
            "a" => self.attributes.contains_key("href"),
            _ => self.attributes.contains_key("tabindex") || self.content_editable,
        }
    }
}

/// A side effect a mutation produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Effect {
    Focused { node: NodeId },
    Scrolled { node: NodeId },
    Clicked { node: NodeId },
    AttributeSet { node: NodeId, name: String, value: String },
    OpenedUrl { url: String },
}

/// Serializable page snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageSnapshot {
    pub url: String,
    pub viewport: Viewport,
    pub elements: Vec<SnapshotElement>,
    /// Index of the focused element.
    pub active: Option<usize>,
    #[serde(skip)]
    effects: Vec<Effect>,
}

impl Default for PageSnapshot {
    fn default() -> Self {
        Self {
            url: "about:blank".to_string(),
            viewport: Viewport::default(),
            elements: Vec::new(),
            active: None,
            effects: Vec::new(),
        }
    }
}

impl PageSnapshot {
    #[must_use]
    pub fn new(url: &str, viewport: Viewport) -> Self {
        Self {
            url: url.to_string(),
            viewport,
            ..Self::default()
        }
    }

    /// Append an element, returning its handle.
    pub fn push(&mut self, element: SnapshotElement) -> NodeId {
        self.elements.push(element);
        NodeId(self.elements.len() - 1)
    }

    #[must_use]
    pub fn with(mut self, element: SnapshotElement) -> Self {
        self.push(element);
        self
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|source| SmartNavError::io(path, source))?;
        Self::from_json(&raw)
    }

    /// Move focus without recording an effect (the user clicking into a field).
    pub fn set_active(&mut self, node: Option<NodeId>) {
        self.active = node.map(|n| n.0);
    }

    #[must_use]
    pub fn element(&self, node: NodeId) -> Option<&SnapshotElement> {
        self.elements.get(node.0)
    }

    pub fn element_mut(&mut self, node: NodeId) -> Option<&mut SnapshotElement> {
        self.elements.get_mut(node.0)
    }

    #[must_use]
    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Drain recorded effects.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    fn get(&self, node: NodeId, operation: &'static str) -> Result<&SnapshotElement> {
        match self.elements.get(node.0) {
            Some(el) if !el.detached => Ok(el),
            _ => Err(SmartNavError::StaleNode { operation }),
        }
    }
}

impl Dom for PageSnapshot {
    type Node = NodeId;

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn location(&self) -> String {
        self.url.clone()
    }

    fn query(&self, query: &NodeQuery) -> Vec<NodeId> {
        self.elements
            .iter()
            .enumerate()
            .filter(|(_, el)| !el.detached)
            .filter(|(_, el)| {
                query.matches(&el.tag, |name| el.attributes.get(name).map(String::as_str))
            })
            .map(|(idx, _)| NodeId(idx))
            .collect()
    }

    fn tag_name(&self, node: &NodeId) -> String {
        self.elements
            .get(node.0)
            .map(|el| el.tag.clone())
            .unwrap_or_default()
    }

    fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
        self.elements
            .get(node.0)?
            .attributes
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    fn text_content(&self, node: &NodeId) -> Option<String> {
        self.elements.get(node.0)?.text.clone()
    }

    fn bounding_rect(&self, node: &NodeId) -> Result<Rect> {
        self.get(*node, "bounding_rect")?
            .rect
            .ok_or_else(|| SmartNavError::dom("bounding_rect", "layout unavailable"))
    }

    fn computed_style(&self, node: &NodeId) -> Result<ComputedStyle> {
        Ok(self.get(*node, "computed_style")?.style.clone())
    }

    fn is_content_editable(&self, node: &NodeId) -> bool {
        self.elements
            .get(node.0)
            .is_some_and(|el| el.content_editable)
    }

    fn is_focusable(&self, node: &NodeId) -> bool {
        self.elements
            .get(node.0)
            .is_some_and(|el| el.focusable.unwrap_or_else(|| el.natively_focusable()))
    }

    fn active_element(&self) -> Option<NodeId> {
        self.active.map(NodeId)
    }

    fn focus(&mut self, node: &NodeId) -> Result<()> {
        let el = self.get(*node, "focus")?;
        if !el.focusable.unwrap_or_else(|| el.natively_focusable()) {
            return Err(SmartNavError::dom("focus", "element is not focusable"));
        }
        self.active = Some(node.0);
        self.effects.push(Effect::Focused { node: *node });
        Ok(())
    }

    fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> Result<()> {
        self.get(*node, "set_attribute")?;
        let name = name.to_ascii_lowercase();
        if let Some(el) = self.elements.get_mut(node.0) {
            el.attributes.insert(name.clone(), value.to_string());
        }
        self.effects.push(Effect::AttributeSet {
            node: *node,
            name,
            value: value.to_string(),
        });
        Ok(())
    }

    fn scroll_into_view(&mut self, node: &NodeId) -> Result<()> {
        self.get(*node, "scroll_into_view")?;
        self.effects.push(Effect::Scrolled { node: *node });
        Ok(())
    }

    fn click(&mut self, node: &NodeId) -> Result<()> {
        self.get(*node, "click")?;
        self.effects.push(Effect::Clicked { node: *node });
        Ok(())
    }

    fn open_url(&mut self, url: &str) -> Result<()> {
        self.effects.push(Effect::OpenedUrl {
            url: url.to_string(),
        });
        Ok(())
    }
}
