//! Presentation seam. The core computes where a highlight goes; a presenter
//! draws it.

#![allow(missing_docs)]

pub mod color;

use serde::Serialize;

use crate::dom::{Point, Rect};

pub use color::{ColorPreference, ColorToken};

/// Everything a presenter needs to draw one highlight.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightRequest {
    pub target_rect: Rect,
    /// Where a connector starts, usually the last pointer position.
    pub anchor_point: Point,
    pub color_token: ColorToken,
}

/// Draws and removes the overlay.
pub trait Presenter {
    /// Replace any current highlight with `request`.
    fn show(&mut self, request: &HighlightRequest);

    fn clear(&mut self);

    fn is_active(&self) -> bool;
}

/// Presenter that draws nothing and keeps every request.
#[derive(Debug, Clone, Default)]
pub struct RecordingPresenter {
    shown: Vec<HighlightRequest>,
    current: Option<HighlightRequest>,
    clears: usize,
}

impl RecordingPresenter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every request shown so far, oldest first.
    #[must_use]
    pub fn history(&self) -> &[HighlightRequest] {
        &self.shown
    }

    #[must_use]
    pub const fn current(&self) -> Option<&HighlightRequest> {
        self.current.as_ref()
    }

    #[must_use]
    pub const fn clear_count(&self) -> usize {
        self.clears
    }
}

impl Presenter for RecordingPresenter {
    fn show(&mut self, request: &HighlightRequest) {
        self.shown.push(request.clone());
        self.current = Some(request.clone());
    }

    fn clear(&mut self) {
        if self.current.take().is_some() {
            self.clears += 1;
        }
    }

    fn is_active(&self) -> bool {
        self.current.is_some()
    }
}

impl<P: Presenter + ?Sized> Presenter for Box<P> {
    fn show(&mut self, request: &HighlightRequest) {
        (**self).show(request);
    }

    fn clear(&mut self) {
        (**self).clear();
    }

    fn is_active(&self) -> bool {
        (**self).is_active()
    }
}
