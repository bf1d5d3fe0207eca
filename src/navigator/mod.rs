//! Selection state machine over the ranked candidate ring.
//!
//! ```text
//! Idle   (current = None)           --advance/select--> Active
//! Active (current = Some(i), i < n) --advance--------> Active (ring: wraps both ways)
//! any                               --reset----------> Idle, candidates dropped
//! ```
//!
//! Landing on a synthetic entry runs its action and resets. Landing on a real
//! one focuses it (assigning `tabindex="0"` first when the element cannot take
//! focus natively) and scrolls it to the viewport center.

#![allow(missing_docs)]

pub mod schedule;
pub mod session;

#[cfg(test)]
mod test_properties;

use thiserror::Error;

use crate::core::errors::SmartNavError;
use crate::detector::Detector;
use crate::detector::candidate::{Candidate, RankedCandidateList, SyntheticAction};
use crate::dom::{Dom, Rect};

/// Ring direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

/// Candidate list plus the current position in it.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionState<N> {
    candidates: RankedCandidateList<N>,
    current: Option<usize>,
}

impl<N> Default for SelectionState<N> {
    fn default() -> Self {
        Self {
            candidates: RankedCandidateList::default(),
            current: None,
        }
    }
}

impl<N> SelectionState<N> {
    #[must_use]
    pub fn candidates(&self) -> &RankedCandidateList<N> {
        &self.candidates
    }

    #[must_use]
    pub const fn current(&self) -> Option<usize> {
        self.current
    }

    /// Index to land on when moving one step from the current position.
    #[must_use]
    pub fn step(&self, direction: Direction) -> Option<usize> {
        let n = self.candidates.len();
        if n == 0 {
            return None;
        }
        Some(match (direction, self.current) {
            (Direction::Forward, None) => 0,
            (Direction::Forward, Some(i)) => (i + 1) % n,
            (Direction::Backward, None | Some(0)) => n - 1,
            (Direction::Backward, Some(i)) => i - 1,
        })
    }
}

/// Where a move ended up.
#[derive(Debug, Clone, PartialEq)]
pub enum Landing {
    /// A page element now holds focus.
    Real {
        index: usize,
        /// Geometry read after scrolling.
        rect: Rect,
        text: String,
        element_key: String,
    },
    /// A synthetic entry ran its action; the navigator is back to idle.
    Synthetic {
        index: usize,
        label: String,
        action: SyntheticAction,
        /// The action's host call failed; the reset still happened.
        action_error: Option<String>,
    },
}

impl Landing {
    #[must_use]
    pub const fn index(&self) -> usize {
        match self {
            Self::Real { index, .. } | Self::Synthetic { index, .. } => *index,
        }
    }
}

#[derive(Debug, Error)]
pub enum NavError {
    #[error("no buttons detected on this page")]
    NoCandidates,

    #[error("candidate index {index} out of range (list has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("could not focus candidate {index}: {source}")]
    Focus {
        index: usize,
        #[source]
        source: SmartNavError,
    },

    #[error("no candidate is selected")]
    NothingSelected,
}

/// Owns the detector and the selection state for one page context.
#[derive(Debug)]
pub struct Navigator<N> {
    detector: Detector<N>,
    state: SelectionState<N>,
}

impl<N: Clone + Eq + std::hash::Hash> Navigator<N> {
    #[must_use]
    pub fn new(detector: Detector<N>) -> Self {
        Self {
            detector,
            state: SelectionState::default(),
        }
    }

    #[must_use]
    pub fn detector(&self) -> &Detector<N> {
        &self.detector
    }

    #[must_use]
    pub fn state(&self) -> &SelectionState<N> {
        &self.state
    }

    #[must_use]
    pub fn candidates(&self) -> &RankedCandidateList<N> {
        &self.state.candidates
    }

    #[must_use]
    pub const fn current_index(&self) -> Option<usize> {
        self.state.current
    }

    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.state.current.is_some()
    }

    #[must_use]
    pub fn selected(&self) -> Option<&Candidate<N>> {
        self.state.current.and_then(|i| self.state.candidates.get(i))
    }

    /// Load candidates if none are cached. Fails when the page offers no
    /// real candidate, leaving the navigator idle.
    pub fn activate<D: Dom<Node = N>>(&mut self, dom: &D) -> Result<(), NavError> {
        if self.state.candidates.has_no_real_candidates() {
            self.state.candidates = self.detector.detect(dom);
        }
        if self.state.candidates.has_no_real_candidates() {
            self.reset();
            return Err(NavError::NoCandidates);
        }
        Ok(())
    }

    /// Move one step around the ring. From idle this starts a fresh pass.
    pub fn advance<D: Dom<Node = N>>(
        &mut self,
        dom: &mut D,
        direction: Direction,
    ) -> Result<Landing, NavError> {
        if !self.is_active() {
            self.reset();
            self.activate(dom)?;
        }
        let index = self.state.step(direction).ok_or(NavError::NoCandidates)?;
        self.land(dom, index)
    }

    /// Jump straight to `index`.
    pub fn select_by_index<D: Dom<Node = N>>(
        &mut self,
        dom: &mut D,
        index: usize,
    ) -> Result<Landing, NavError> {
        let len = self.state.candidates.len();
        if index >= len {
            return Err(NavError::IndexOutOfRange { index, len });
        }
        self.land(dom, index)
    }

    /// Back to idle. Drops the candidate list so no handle outlives it.
    pub fn reset(&mut self) {
        self.state = SelectionState::default();
    }

    /// Re-detect, keeping the current index when it still fits.
    /// Returns the surviving index.
    pub fn refresh<D: Dom<Node = N>>(&mut self, dom: &D) -> Option<usize> {
        let current = self.state.current;
        self.state.candidates = self.detector.detect(dom);
        match current {
            Some(i) if i < self.state.candidates.len() => Some(i),
            Some(_) => {
                self.reset();
                None
            }
            None => None,
        }
    }

    /// Focus and programmatically click the selected real candidate.
    pub fn click_selected<D: Dom<Node = N>>(&self, dom: &mut D) -> Result<usize, NavError> {
        let index = self.state.current.ok_or(NavError::NothingSelected)?;
        let Some(Candidate::Real(real)) = self.state.candidates.get(index) else {
            return Err(NavError::NothingSelected);
        };
        let node = real.node.clone();
        if dom.is_focusable(&node) {
            dom.focus(&node)
                .map_err(|source| NavError::Focus { index, source })?;
        }
        dom.click(&node)
            .map_err(|source| NavError::Focus { index, source })?;
        Ok(index)
    }

    /// Run the action of the synthetic entry at `index` and reset.
    pub fn run_synthetic<D: Dom<Node = N>>(&mut self, dom: &mut D, index: usize) -> Option<Landing> {
        let Some(Candidate::Synthetic(entry)) = self.state.candidates.get(index) else {
            return None;
        };
        let entry = entry.clone();
        let action_error = match &entry.action {
            SyntheticAction::Dismiss => None,
            SyntheticAction::OpenUrl { url } => dom.open_url(url).err().map(|e| e.to_string()),
        };
        self.reset();
        Some(Landing::Synthetic {
            index,
            label: entry.label,
            action: entry.action,
            action_error,
        })
    }

    fn land<D: Dom<Node = N>>(&mut self, dom: &mut D, index: usize) -> Result<Landing, NavError> {
        let real = match self.state.candidates.get(index) {
            Some(Candidate::Real(real)) => real.clone(),
            Some(Candidate::Synthetic(_)) => {
                return self.run_synthetic(dom, index).ok_or(NavError::NoCandidates);
            }
            None => {
                return Err(NavError::IndexOutOfRange {
                    index,
                    len: self.state.candidates.len(),
                });
            }
        };

        let previous = self.state.current;
        self.state.current = Some(index);
        let focused = focus_with_fallback(dom, &real.node).and_then(|()| dom.scroll_into_view(&real.node));
        if let Err(source) = focused {
            self.state.current = previous;
            return Err(NavError::Focus { index, source });
        }

        let rect = dom.bounding_rect(&real.node).unwrap_or(real.rect);
        Ok(Landing::Real {
            index,
            rect,
            text: real.text,
            element_key: real.element_key,
        })
    }

    #[cfg(test)]
    pub(crate) fn park_on(&mut self, index: usize) {
        self.state.current = Some(index);
    }

    #[cfg(test)]
    pub(crate) fn load(&mut self, candidates: RankedCandidateList<N>) {
        self.state = SelectionState {
            candidates,
            current: None,
        };
    }
}

/// Focus `node`, giving it `tabindex="0"` first when it cannot take focus
/// and has no tabindex of its own.
fn focus_with_fallback<D: Dom>(dom: &mut D, node: &D::Node) -> crate::core::errors::Result<()> {
    if !dom.is_focusable(node) && dom.attribute(node, "tabindex").is_none() {
        dom.set_attribute(node, "tabindex", "0")?;
    }
    dom.focus(node)
}
