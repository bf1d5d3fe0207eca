//! Host document abstraction.
//!
//! The core never touches a browser directly. A host (content script bridge,
//! headless driver, or the in-memory [`snapshot::PageSnapshot`]) implements
//! [`Dom`], and detection, navigation and key routing run against it.
//!
//! Node handles are ephemeral: they are valid for one detection pass and are
//! never persisted. Anything crossing a storage or time boundary is derived
//! into string keys first (see [`crate::detector::text`]).

pub mod geometry;
pub mod query;
pub mod snapshot;

use std::fmt;
use std::hash::Hash;

use crate::core::errors::Result;

pub use geometry::{ComputedStyle, Point, Rect, Viewport};
pub use query::NodeQuery;

/// Read access plus the limited mutations the navigator needs.
pub trait Dom {
    /// Opaque element handle with identity equality.
    type Node: Clone + Eq + Hash + fmt::Debug;

    /// Visible area in CSS pixels.
    fn viewport(&self) -> Viewport;

    /// Current page URL.
    fn location(&self) -> String;

    /// All elements matching `query`, in document order.
    fn query(&self, query: &NodeQuery) -> Vec<Self::Node>;

    /// Lowercase tag name.
    fn tag_name(&self, node: &Self::Node) -> String;

    /// Raw attribute value, `None` when absent.
    fn attribute(&self, node: &Self::Node, name: &str) -> Option<String>;

    /// Concatenated descendant text, untrimmed.
    fn text_content(&self, node: &Self::Node) -> Option<String>;

    /// Box in viewport coordinates. Fails for detached nodes.
    fn bounding_rect(&self, node: &Self::Node) -> Result<Rect>;

    /// The style subset the scorer and visibility filter read.
    fn computed_style(&self, node: &Self::Node) -> Result<ComputedStyle>;

    /// `contenteditable` in effect on the node.
    fn is_content_editable(&self, node: &Self::Node) -> bool;

    /// Whether `focus()` would take effect without a `tabindex` fallback.
    fn is_focusable(&self, node: &Self::Node) -> bool;

    /// The element that currently holds focus, if any.
    fn active_element(&self) -> Option<Self::Node>;

    /// Move keyboard focus to the node.
    fn focus(&mut self, node: &Self::Node) -> Result<()>;

    /// Used only for the `tabindex` focus fallback.
    fn set_attribute(&mut self, node: &Self::Node, name: &str, value: &str) -> Result<()>;

    /// Scroll so the element sits in the vertical center of the viewport.
    fn scroll_into_view(&mut self, node: &Self::Node) -> Result<()>;

    /// Programmatic activation (`element.click()`).
    fn click(&mut self, node: &Self::Node) -> Result<()>;

    /// Open a URL in a new browsing context.
    fn open_url(&mut self, url: &str) -> Result<()>;
}
