//! Prominence scoring: area, placement, class/role intent, tabindex, and a
//! gated style refinement (z-index, opacity).
//!
//! ```text
//! score  = width * height / area_divisor
//!        + position_bonus   if min_top < top < fraction * viewport_height
//!        + accent_bonus     if class/id carries an accent keyword
//!        + button_bonus     if class/id carries a button keyword, or role=button on a non-<button>
//!        + tabindex bonus   (primary for tabindex == 1, standard for any other value >= 0)
//! if score > refinement_gate:
//!     score += z_index / z_index_divisor   (positive z-index only)
//!     score *= min(opacity, 1)
//! ```
//!
//! Computed style is only read past the gate.

#![allow(missing_docs)]

use serde::Serialize;

use crate::core::config::ScoringConfig;
use crate::core::errors::Result;
use crate::dom::{ComputedStyle, Dom, Rect, Viewport};

/// Class/id/role facts the scorer and the button-likeness check read.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementTraits {
    /// Lowercase tag name.
    pub tag: String,
    /// Lowercase class attribute.
    pub class: String,
    /// Lowercase id attribute.
    pub id: String,
    pub role: Option<String>,
    pub tabindex: Option<String>,
}

impl ElementTraits {
    pub fn read<D: Dom>(dom: &D, node: &D::Node) -> Self {
        Self {
            tag: dom.tag_name(node).to_lowercase(),
            class: dom
                .attribute(node, "class")
                .unwrap_or_default()
                .to_lowercase(),
            id: dom.attribute(node, "id").unwrap_or_default().to_lowercase(),
            role: dom.attribute(node, "role"),
            tabindex: dom.attribute(node, "tabindex"),
        }
    }

    /// Any keyword occurs in the class or id attribute.
    #[must_use]
    pub fn class_or_id_contains(&self, keywords: &[String]) -> bool {
        keywords
            .iter()
            .any(|k| self.class.contains(k.as_str()) || self.id.contains(k.as_str()))
    }

    #[must_use]
    pub fn has_button_role(&self) -> bool {
        self.role.as_deref() == Some("button")
    }

    /// Integer value of `tabindex`, parsed leniently like `parseInt`.
    #[must_use]
    pub fn tabindex_value(&self) -> Option<i64> {
        self.tabindex.as_deref().and_then(parse_int_prefix)
    }
}

/// Per-term record of how a score was assembled.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub area: f64,
    pub position: f64,
    pub accent: f64,
    pub button: f64,
    pub tabindex: f64,
    pub z_index: f64,
    pub opacity_multiplier: f64,
    /// Whether the style refinement ran.
    pub refined: bool,
    pub total: f64,
}

impl ScoreBreakdown {
    /// Named additive terms, in application order.
    #[must_use]
    pub fn terms(&self) -> [(&'static str, f64); 6] {
        [
            ("area", self.area),
            ("position", self.position),
            ("accent", self.accent),
            ("button", self.button),
            ("tabindex", self.tabindex),
            ("z_index", self.z_index),
        ]
    }

    #[must_use]
    pub fn summary(&self) -> String {
        let terms = self
            .terms()
            .iter()
            .filter(|(_, v)| v.abs() > f64::EPSILON)
            .map(|(name, v)| format!("{name}={v:.1}"))
            .collect::<Vec<_>>()
            .join(" ");
        if self.refined {
            format!(
                "{terms} opacity=x{:.2} total={:.1}",
                self.opacity_multiplier, self.total
            )
        } else {
            format!("{terms} total={:.1} (unrefined)", self.total)
        }
    }
}

/// Deterministic prominence scorer.
#[derive(Debug, Clone)]
pub struct ProminenceScorer {
    config: ScoringConfig,
}

impl ProminenceScorer {
    #[must_use]
    pub fn from_config(config: &ScoringConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Score one element. `style` is only invoked when the running total
    /// passes the refinement gate; its error aborts this element only.
    pub fn score(
        &self,
        traits: &ElementTraits,
        rect: Rect,
        viewport: Viewport,
        style: impl FnOnce() -> Result<ComputedStyle>,
    ) -> Result<ScoreBreakdown> {
        let c = &self.config;
        let mut b = ScoreBreakdown {
            opacity_multiplier: 1.0,
            ..ScoreBreakdown::default()
        };

        b.area = rect.area() / c.area_divisor;

        let top = rect.top();
        if top > c.position_min_top_px && top < viewport.height * c.position_max_viewport_fraction
        {
            b.position = c.position_bonus;
        }

        if traits.class_or_id_contains(&c.accent_keywords) {
            b.accent = c.accent_bonus;
        }

        if traits.class_or_id_contains(&c.button_keywords)
            || (traits.has_button_role() && traits.tag != "button")
        {
            b.button = c.button_bonus;
        }

        b.tabindex = match traits.tabindex_value() {
            Some(1) => c.tabindex_primary_bonus,
            Some(v) if v >= 0 => c.tabindex_bonus,
            _ => 0.0,
        };

        let mut total = b.area + b.position + b.accent + b.button + b.tabindex;

        if total > c.refinement_gate {
            let style = style()?;
            b.refined = true;
            if let Some(z) = style.z_index
                && z > 0
            {
                #[allow(clippy::cast_precision_loss)]
                let bump = z as f64 / c.z_index_divisor;
                b.z_index = bump;
                total += bump;
            }
            b.opacity_multiplier = opacity_factor(style.opacity);
            total *= b.opacity_multiplier;
        }

        b.total = total;
        Ok(b)
    }
}

/// Opacity as a multiplier: capped at 1, and an unreadable or zero value
/// counts as fully opaque.
fn opacity_factor(opacity: f64) -> f64 {
    if opacity.is_finite() && opacity > 0.0 {
        opacity.min(1.0)
    } else {
        1.0
    }
}

/// Leading-integer parse: optional whitespace and sign, then digits.
/// `"1"`, `" 2 "`, `"3px"` parse; `""`, `"abc"`, `"-"` do not.
fn parse_int_prefix(raw: &str) -> Option<i64> {
    let s = raw.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    digits[..end].parse::<i64>().ok().map(|v| sign * v)
}
