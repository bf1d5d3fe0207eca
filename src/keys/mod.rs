//! Keyboard routing: which keys the overlay takes, and which it leaves alone.
//!
//! [`KeyRouter::route`] is a pure decision over the key, the focused element,
//! and a read-only view of the navigator. Executing the decision (moving the
//! selection, recording stats) belongs to the session.

#![allow(missing_docs)]

pub mod bindings;

use crate::dom::Dom;
use crate::navigator::Direction;

pub use bindings::{KeyAction, KeyBinding, KeyBindings, KeyEvent};

/// Input `type`s that accept typed text. An input without a type is text too.
const TEXT_INPUT_TYPES: [&str; 12] = [
    "text",
    "email",
    "password",
    "search",
    "tel",
    "url",
    "number",
    "date",
    "datetime-local",
    "month",
    "time",
    "week",
];

/// Whether typing into `node` would be disturbed by intercepting keys.
pub fn is_text_editable<D: Dom>(dom: &D, node: &D::Node) -> bool {
    match dom.tag_name(node).to_ascii_lowercase().as_str() {
        "textarea" => true,
        "input" => {
            let kind = dom
                .attribute(node, "type")
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase();
            kind.is_empty() || TEXT_INPUT_TYPES.contains(&kind.as_str())
        }
        _ => dom.is_content_editable(node),
    }
}

/// What the router sees of the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectedView {
    Nothing,
    /// A real candidate; `focused` when it is the page's active element.
    Real { focused: bool },
    Synthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigatorView {
    pub selected: SelectedView,
    /// Any overlay artifact (highlight) is on screen.
    pub overlay_visible: bool,
}

impl NavigatorView {
    #[must_use]
    pub const fn idle() -> Self {
        Self {
            selected: SelectedView::Nothing,
            overlay_visible: false,
        }
    }

    const fn has_selection(&self) -> bool {
        !matches!(self.selected, SelectedView::Nothing)
    }
}

/// Routing decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Not ours: leave the event alone.
    PassThrough,
    /// Move the selection. Intercepted unless nothing can be selected.
    Advance(Direction),
    /// Accept the focused candidate, reset, and let the browser activate it.
    AcceptFocused,
    /// Click the selected candidate ourselves; intercepted.
    ClickSelected,
    /// Run the selected synthetic entry; intercepted.
    RunSynthetic,
    /// Close the interaction; intercepted.
    Cancel,
}

impl Route {
    /// Whether the host must call `preventDefault` (assuming the route runs).
    #[must_use]
    pub const fn intercepts(self) -> bool {
        !matches!(self, Self::PassThrough | Self::AcceptFocused)
    }
}

/// Stateless key classifier.
#[derive(Debug, Clone, Default)]
pub struct KeyRouter {
    bindings: KeyBindings,
}

impl KeyRouter {
    #[must_use]
    pub const fn new(bindings: KeyBindings) -> Self {
        Self { bindings }
    }

    #[must_use]
    pub const fn bindings(&self) -> &KeyBindings {
        &self.bindings
    }

    /// Decide what `event` does. Nothing is routed while the focused element
    /// takes text.
    pub fn route<D: Dom>(&self, dom: &D, event: &KeyEvent, view: NavigatorView) -> Route {
        let Some(action) = self.bindings.classify(event) else {
            return Route::PassThrough;
        };
        if dom
            .active_element()
            .is_some_and(|active| is_text_editable(dom, &active))
        {
            return Route::PassThrough;
        }
        decide(action, view)
    }
}

const fn decide(action: KeyAction, view: NavigatorView) -> Route {
    match action {
        KeyAction::Forward => Route::Advance(Direction::Forward),
        KeyAction::Backward => Route::Advance(Direction::Backward),
        KeyAction::Confirm => match view.selected {
            SelectedView::Real { focused: true } => Route::AcceptFocused,
            SelectedView::Synthetic => Route::RunSynthetic,
            SelectedView::Real { focused: false } | SelectedView::Nothing => Route::PassThrough,
        },
        KeyAction::ClickConfirm => match view.selected {
            SelectedView::Real { .. } => Route::ClickSelected,
            SelectedView::Synthetic => Route::RunSynthetic,
            SelectedView::Nothing => Route::PassThrough,
        },
        KeyAction::Cancel => {
            if view.has_selection() || view.overlay_visible {
                Route::Cancel
            } else {
                Route::PassThrough
            }
        }
    }
}

/// Result of handling one key, for the host.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyDisposition {
    /// Call `preventDefault`/`stopPropagation`.
    pub prevent_default: bool,
    pub action: Option<KeyAction>,
    /// User-visible notice, e.g. when nothing was detected.
    pub message: Option<String>,
}

impl KeyDisposition {
    #[must_use]
    pub const fn passthrough() -> Self {
        Self {
            prevent_default: false,
            action: None,
            message: None,
        }
    }

    #[must_use]
    pub const fn handled(action: KeyAction, prevent_default: bool) -> Self {
        Self {
            prevent_default,
            action: Some(action),
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Viewport;
    use crate::dom::snapshot::{NodeId, PageSnapshot, SnapshotElement};

    fn page_with_focus(el: SnapshotElement) -> PageSnapshot {
        let mut p = PageSnapshot::new("https://example.com/", Viewport::default());
        let id = p.push(el);
        p.set_active(Some(id));
        p
    }

    fn active_real(focused: bool) -> NavigatorView {
        NavigatorView {
            selected: SelectedView::Real { focused },
            overlay_visible: true,
        }
    }

    #[test]
    fn text_editable_detection() {
        let cases = [
            (SnapshotElement::new("textarea"), true),
            (SnapshotElement::new("input"), true),
            (SnapshotElement::new("input").attr("type", "EMAIL"), true),
            (SnapshotElement::new("input").attr("type", "datetime-local"), true),
            (SnapshotElement::new("input").attr("type", "checkbox"), false),
            (SnapshotElement::new("input").attr("type", "submit"), false),
            (SnapshotElement::new("div").content_editable(), true),
            (SnapshotElement::new("button"), false),
        ];
        for (el, expected) in cases {
            let p = page_with_focus(el.clone());
            assert_eq!(is_text_editable(&p, &NodeId(0)), expected, "{el:?}");
        }
    }

    #[test]
    fn typing_in_a_text_field_is_never_intercepted() {
        let router = KeyRouter::default();
        let p = page_with_focus(SnapshotElement::new("input").attr("type", "text"));
        for key in ["Tab", "Enter", " ", "Escape", "d", "w"] {
            assert_eq!(
                router.route(&p, &KeyEvent::key(key), active_real(true)),
                Route::PassThrough,
                "{key}"
            );
        }
    }

    #[test]
    fn navigation_keys_advance() {
        let router = KeyRouter::default();
        let p = page_with_focus(SnapshotElement::new("input").attr("type", "checkbox"));
        assert_eq!(
            router.route(&p, &KeyEvent::key("Tab"), NavigatorView::idle()),
            Route::Advance(Direction::Forward)
        );
        assert_eq!(
            router.route(&p, &KeyEvent::shifted("Tab"), NavigatorView::idle()),
            Route::Advance(Direction::Backward)
        );
    }

    #[test]
    fn confirm_requires_focus_on_the_selection() {
        let router = KeyRouter::default();
        let p = PageSnapshot::default();
        let enter = KeyEvent::key("Enter");
        assert_eq!(router.route(&p, &enter, active_real(true)), Route::AcceptFocused);
        assert_eq!(router.route(&p, &enter, active_real(false)), Route::PassThrough);
        assert_eq!(router.route(&p, &enter, NavigatorView::idle()), Route::PassThrough);
        assert!(!Route::AcceptFocused.intercepts());
    }

    #[test]
    fn click_confirm_and_synthetic_confirm_intercept() {
        let router = KeyRouter::default();
        let p = PageSnapshot::default();
        assert_eq!(
            router.route(&p, &KeyEvent::key("w"), active_real(false)),
            Route::ClickSelected
        );
        let synthetic = NavigatorView {
            selected: SelectedView::Synthetic,
            overlay_visible: false,
        };
        assert_eq!(
            router.route(&p, &KeyEvent::key("Enter"), synthetic),
            Route::RunSynthetic
        );
        assert!(Route::RunSynthetic.intercepts());
    }

    #[test]
    fn cancel_only_when_something_is_showing() {
        let router = KeyRouter::default();
        let p = PageSnapshot::default();
        let esc = KeyEvent::key("Escape");
        assert_eq!(router.route(&p, &esc, NavigatorView::idle()), Route::PassThrough);
        let overlay_only = NavigatorView {
            selected: SelectedView::Nothing,
            overlay_visible: true,
        };
        assert_eq!(router.route(&p, &esc, overlay_only), Route::Cancel);
        assert_eq!(router.route(&p, &esc, active_real(false)), Route::Cancel);
    }
}
