//! Candidate model: real page elements and synthetic escape entries.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::detector::scoring::ScoreBreakdown;
use crate::dom::Rect;

/// What a synthetic entry does when the user lands on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SyntheticAction {
    /// "None of these": close the interaction.
    Dismiss,
    /// Open an external link, then close the interaction.
    OpenUrl { url: String },
}

/// Configured synthetic tail entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntheticEntry {
    pub label: String,
    pub action: SyntheticAction,
}

impl SyntheticEntry {
    /// The default "other" entry.
    #[must_use]
    pub fn other() -> Self {
        Self {
            label: "other".to_string(),
            action: SyntheticAction::Dismiss,
        }
    }

    /// Stable hint for a synthetic entry (`fake-<label>`).
    #[must_use]
    pub fn selector_hint(&self) -> String {
        format!("fake-{}", self.label)
    }
}

/// A detected, scored page element.
#[derive(Debug, Clone, PartialEq)]
pub struct RealCandidate<N> {
    pub node: N,
    pub text: String,
    pub element_key: String,
    pub selector_hint: String,
    pub rect: Rect,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    /// Tier that discovered the element.
    pub source: DiscoveryTier,
}

/// Which collection tier found an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryTier {
    NativeButton,
    ButtonRole,
    Heuristic,
}

/// One entry of a ranked list.
#[derive(Debug, Clone, PartialEq)]
pub enum Candidate<N> {
    Real(RealCandidate<N>),
    Synthetic(SyntheticEntry),
}

impl<N> Candidate<N> {
    /// Display text.
    #[must_use]
    pub fn text(&self) -> &str {
        match self {
            Self::Real(real) => &real.text,
            Self::Synthetic(entry) => &entry.label,
        }
    }

    #[must_use]
    pub fn node(&self) -> Option<&N> {
        match self {
            Self::Real(real) => Some(&real.node),
            Self::Synthetic(_) => None,
        }
    }

    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        matches!(self, Self::Synthetic(_))
    }

    #[must_use]
    pub fn selector_hint(&self) -> String {
        match self {
            Self::Real(real) => real.selector_hint.clone(),
            Self::Synthetic(entry) => entry.selector_hint(),
        }
    }
}

/// Ordered detection result: real candidates by descending score, then the
/// synthetic tail. Rebuilt on every pass, never edited in place.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidateList<N> {
    entries: Vec<Candidate<N>>,
    real_len: usize,
}

impl<N> Default for RankedCandidateList<N> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            real_len: 0,
        }
    }
}

impl<N> RankedCandidateList<N> {
    /// Assemble from already-ranked real candidates and the synthetic tail.
    #[must_use]
    pub fn new(real: Vec<RealCandidate<N>>, tail: &[SyntheticEntry]) -> Self {
        let real_len = real.len();
        let mut entries: Vec<Candidate<N>> = real.into_iter().map(Candidate::Real).collect();
        entries.extend(tail.iter().cloned().map(Candidate::Synthetic));
        Self { entries, real_len }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of real (page) candidates.
    #[must_use]
    pub fn real_len(&self) -> usize {
        self.real_len
    }

    /// No page element qualified; only the synthetic tail is present.
    #[must_use]
    pub fn has_no_real_candidates(&self) -> bool {
        self.real_len == 0
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Candidate<N>> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate<N>> {
        self.entries.iter()
    }

    pub fn real(&self) -> impl Iterator<Item = &RealCandidate<N>> {
        self.entries.iter().filter_map(|c| match c {
            Candidate::Real(real) => Some(real),
            Candidate::Synthetic(_) => None,
        })
    }
}
