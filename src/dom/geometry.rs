//! Shared geometry and style types: viewport, rectangles, anchor points, computed style.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

/// Viewport dimensions in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
        }
    }
}

impl Viewport {
    /// Center of the viewport; the pointer anchor before any pointer movement.
    #[must_use]
    pub fn center(&self) -> Point {
        Point {
            x: self.width / 2.0,
            y: self.height / 2.0,
        }
    }
}

/// A point in viewport coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// Element bounding box in viewport coordinates (as `getBoundingClientRect`).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    pub fn top(&self) -> f64 {
        self.y
    }

    #[must_use]
    pub fn left(&self) -> f64 {
        self.x
    }

    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    #[must_use]
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    #[must_use]
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    /// True when the box has positive extent and overlaps the viewport.
    #[must_use]
    pub fn is_on_screen(&self, viewport: &Viewport) -> bool {
        if self.width <= 0.0 || self.height <= 0.0 {
            return false;
        }
        !(self.bottom() < 0.0
            || self.top() > viewport.height
            || self.right() < 0.0
            || self.left() > viewport.width)
    }
}

/// The subset of computed style the detector reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputedStyle {
    pub display: String,
    pub visibility: String,
    pub opacity: f64,
    /// `None` for `z-index: auto`.
    pub z_index: Option<i64>,
}

impl Default for ComputedStyle {
    fn default() -> Self {
        Self {
            display: "block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
            z_index: None,
        }
    }
}

impl ComputedStyle {
    /// Not `display:none`, not `visibility:hidden`, opacity above zero.
    #[must_use]
    pub fn is_rendered(&self) -> bool {
        self.display != "none" && self.visibility != "hidden" && self.opacity > 0.0
    }
}
