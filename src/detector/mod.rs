//! Button detector: tiered collection, visibility filtering, prominence ranking.

#![allow(missing_docs)]

pub mod candidate;
pub mod scoring;
pub mod text;

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

use serde::Serialize;

use crate::core::config::{Config, DetectorConfig};
use crate::core::errors::Result;
use crate::dom::{Dom, NodeQuery};

use self::candidate::{DiscoveryTier, RankedCandidateList, RealCandidate, SyntheticEntry};
use self::scoring::{ElementTraits, ProminenceScorer};

/// Per-pass counters, for the activity log and `detect --explain`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DetectionStats {
    /// Distinct elements examined across all tiers.
    pub examined: usize,
    pub rejected_hidden: usize,
    pub rejected_small: usize,
    pub rejected_not_button_like: usize,
    /// Elements skipped because a DOM read failed.
    pub rejected_errors: usize,
    /// Real candidates kept before truncation.
    pub qualified: usize,
    /// Real candidates in the returned list.
    pub returned: usize,
    /// The pass was short-circuited by the re-entrancy guard.
    pub reentrant: bool,
}

/// Why an element did not become a candidate.
enum Rejection {
    Hidden,
    Small,
    NotButtonLike,
}

/// Detector for one page context. Holds the last completed list so a nested
/// call (a host mutation callback firing during a scan) returns it instead
/// of starting another scan.
#[derive(Debug)]
pub struct Detector<N> {
    config: DetectorConfig,
    scorer: ProminenceScorer,
    native: NodeQuery,
    role: NodeQuery,
    heuristics: Vec<NodeQuery>,
    element_key_max_chars: usize,
    scanning: Cell<bool>,
    last: RefCell<RankedCandidateList<N>>,
    last_stats: Cell<DetectionStats>,
}

/// Clears the scanning flag when a pass ends, including by unwinding.
struct ScanGuard<'a>(&'a Cell<bool>);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<N: Clone + Eq + std::hash::Hash> Detector<N> {
    /// Build a detector, parsing every configured selector up front.
    pub fn new(config: &Config) -> Result<Self> {
        let detector = &config.detector;
        let heuristics = detector
            .tag_selectors
            .iter()
            .map(|s| NodeQuery::parse(s))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            native: NodeQuery::parse(&detector.native_selector)?,
            role: NodeQuery::parse(&detector.role_selector)?,
            heuristics,
            element_key_max_chars: config.stats.element_key_max_chars,
            scorer: ProminenceScorer::from_config(&config.scoring),
            config: detector.clone(),
            scanning: Cell::new(false),
            last: RefCell::new(RankedCandidateList::default()),
            last_stats: Cell::new(DetectionStats::default()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    #[must_use]
    pub fn synthetic_tail(&self) -> &[SyntheticEntry] {
        &self.config.synthetic_tail
    }

    /// Counters of the most recent pass.
    #[must_use]
    pub fn last_stats(&self) -> DetectionStats {
        self.last_stats.get()
    }

    /// The list the most recent completed pass returned.
    #[must_use]
    pub fn last_list(&self) -> RankedCandidateList<N> {
        self.last.borrow().clone()
    }

    /// Run one detection pass. Never fails: an element whose evaluation errors
    /// is skipped, and a page with no qualifying element yields just the
    /// synthetic tail.
    pub fn detect<D: Dom<Node = N>>(&self, dom: &D) -> RankedCandidateList<N> {
        if self.scanning.replace(true) {
            let mut stats = self.last_stats.get();
            stats.reentrant = true;
            self.last_stats.set(stats);
            return self.last.borrow().clone();
        }
        let _guard = ScanGuard(&self.scanning);

        let mut stats = DetectionStats::default();
        let mut seen: HashSet<N> = HashSet::new();
        let mut kept: Vec<RealCandidate<N>> = Vec::new();

        let native = dom.query(&self.native);
        for node in native.into_iter().take(self.config.native_cap) {
            self.consider(dom, node, DiscoveryTier::NativeButton, &mut seen, &mut kept, &mut stats);
        }

        let roles = dom
            .query(&self.role)
            .into_iter()
            .take(self.config.role_cap)
            .filter(|node| dom.tag_name(node) != "button");
        for node in roles {
            self.consider(dom, node, DiscoveryTier::ButtonRole, &mut seen, &mut kept, &mut stats);
        }

        for query in &self.heuristics {
            for node in dom.query(query).into_iter().take(self.config.heuristic_cap) {
                self.consider(dom, node, DiscoveryTier::Heuristic, &mut seen, &mut kept, &mut stats);
            }
        }

        stats.qualified = kept.len();
        // `sort_by` is stable: equal scores keep discovery order.
        kept.sort_by(|a, b| b.score.total_cmp(&a.score));
        kept.truncate(self.config.max_candidates);
        stats.returned = kept.len();

        let list = RankedCandidateList::new(kept, &self.config.synthetic_tail);
        *self.last.borrow_mut() = list.clone();
        self.last_stats.set(stats);
        list
    }

    fn consider<D: Dom<Node = N>>(
        &self,
        dom: &D,
        node: N,
        tier: DiscoveryTier,
        seen: &mut HashSet<N>,
        kept: &mut Vec<RealCandidate<N>>,
        stats: &mut DetectionStats,
    ) {
        if !seen.insert(node.clone()) {
            return;
        }
        stats.examined += 1;
        match self.evaluate(dom, node, tier) {
            Ok(Ok(candidate)) => kept.push(candidate),
            Ok(Err(Rejection::Hidden)) => stats.rejected_hidden += 1,
            Ok(Err(Rejection::Small)) => stats.rejected_small += 1,
            Ok(Err(Rejection::NotButtonLike)) => stats.rejected_not_button_like += 1,
            Err(_) => stats.rejected_errors += 1,
        }
    }

    fn evaluate<D: Dom<Node = N>>(
        &self,
        dom: &D,
        node: N,
        tier: DiscoveryTier,
    ) -> Result<std::result::Result<RealCandidate<N>, Rejection>> {
        let viewport = dom.viewport();
        let rect = dom.bounding_rect(&node)?;
        if !rect.is_on_screen(&viewport) || !dom.computed_style(&node)?.is_rendered() {
            return Ok(Err(Rejection::Hidden));
        }
        let min = self.config.min_size_px;
        if rect.width < min || rect.height < min {
            return Ok(Err(Rejection::Small));
        }

        let traits = ElementTraits::read(dom, &node);
        if tier == DiscoveryTier::Heuristic && !self.looks_like_button(dom, &node, &traits) {
            return Ok(Err(Rejection::NotButtonLike));
        }

        let breakdown = self
            .scorer
            .score(&traits, rect, viewport, || dom.computed_style(&node))?;
        let label = text::button_text(dom, &node);
        Ok(Ok(RealCandidate {
            element_key: text::element_key(&label, self.element_key_max_chars),
            selector_hint: text::selector_hint(dom, &node),
            text: label,
            rect,
            score: breakdown.total,
            breakdown,
            source: tier,
            node,
        }))
    }

    /// Cheap button-likeness check for heuristic matches: explicit role,
    /// a class/id marker, or an action verb in the text.
    fn looks_like_button<D: Dom<Node = N>>(
        &self,
        dom: &D,
        node: &N,
        traits: &ElementTraits,
    ) -> bool {
        if traits.has_button_role() {
            return true;
        }
        let markers = &self.config.button_markers;
        if traits.class_or_id_contains(markers) {
            return true;
        }
        let text = dom.text_content(node).unwrap_or_default().trim().to_lowercase();
        self.config
            .text_hint_keywords
            .iter()
            .any(|verb| text.contains(verb.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::detector::candidate::{Candidate, SyntheticAction};
    use crate::dom::snapshot::{NodeId, PageSnapshot, SnapshotElement};
    use crate::dom::{ComputedStyle, Viewport};

    fn detector() -> Detector<NodeId> {
        let cfg = Config::default();
        Detector::new(&cfg).unwrap()
    }

    fn page() -> PageSnapshot {
        PageSnapshot::new("https://mail.example.com/mail/u/0", Viewport::default())
    }

    #[test]
    fn empty_page_yields_only_the_synthetic_tail() {
        let list = detector().detect(&page());
        assert!(list.has_no_real_candidates());
        assert_eq!(list.len(), 1);
        match list.get(0) {
            Some(Candidate::Synthetic(entry)) => {
                assert_eq!(entry.label, "other");
                assert_eq!(entry.action, SyntheticAction::Dismiss);
            }
            other => panic!("unexpected head: {other:?}"),
        }
    }

    #[test]
    fn ranks_by_score_descending() {
        let p = page()
            .with(SnapshotElement::new("button").text("Small").rect(0.0, 10.0, 40.0, 25.0))
            .with(
                SnapshotElement::new("button")
                    .attr("class", "btn primary")
                    .text("Send")
                    .rect(0.0, 100.0, 120.0, 40.0),
            )
            .with(SnapshotElement::new("button").text("Wide").rect(0.0, 10.0, 300.0, 40.0));
        let list = detector().detect(&p);
        let order: Vec<&str> = list.iter().map(Candidate::text).collect();
        assert_eq!(order, vec!["Send", "Wide", "Small", "other"]);
    }

    #[test]
    fn ties_keep_discovery_order() {
        let mut p = page();
        for label in ["A", "B", "C"] {
            p.push(SnapshotElement::new("button").text(label).rect(0.0, 10.0, 30.0, 30.0));
        }
        let list = detector().detect(&p);
        let order: Vec<&str> = list.real().map(|c| c.text.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[test]
    fn filters_hidden_offscreen_and_small_elements() {
        let p = page()
            .with(SnapshotElement::new("button").text("tiny").rect(0.0, 100.0, 19.0, 40.0))
            .with(SnapshotElement::new("button").text("below").rect(0.0, 900.0, 80.0, 40.0))
            .with(SnapshotElement::new("button").text("hidden").rect(0.0, 100.0, 80.0, 40.0).style(
                ComputedStyle {
                    display: "none".to_string(),
                    ..ComputedStyle::default()
                },
            ))
            .with(SnapshotElement::new("button").text("clear").rect(0.0, 100.0, 80.0, 40.0).style(
                ComputedStyle {
                    opacity: 0.0,
                    ..ComputedStyle::default()
                },
            ))
            .with(SnapshotElement::new("button").text("ok").rect(0.0, 100.0, 20.0, 20.0));
        let d = detector();
        let list = d.detect(&p);
        let texts: Vec<&str> = list.real().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["ok"]);
        let stats = d.last_stats();
        assert_eq!(stats.rejected_small, 1);
        assert_eq!(stats.rejected_hidden, 3);
    }

    #[test]
    fn element_errors_skip_only_that_element() {
        let mut broken = SnapshotElement::new("button").text("broken");
        broken.rect = None;
        let p = page()
            .with(broken)
            .with(SnapshotElement::new("button").text("fine").rect(0.0, 100.0, 60.0, 30.0));
        let d = detector();
        let list = d.detect(&p);
        assert_eq!(list.real_len(), 1);
        assert_eq!(d.last_stats().rejected_errors, 1);
    }

    #[test]
    fn role_tier_skips_native_buttons_and_dedups() {
        let p = page()
            .with(
                SnapshotElement::new("button")
                    .attr("role", "button")
                    .text("Native")
                    .rect(0.0, 100.0, 60.0, 30.0),
            )
            .with(
                SnapshotElement::new("div")
                    .attr("role", "button")
                    .attr("class", "T-I")
                    .text("Archive")
                    .rect(0.0, 200.0, 60.0, 30.0),
            );
        let d = detector();
        let list = d.detect(&p);
        assert_eq!(list.real_len(), 2);
        assert_eq!(d.last_stats().examined, 2);
        let sources: Vec<DiscoveryTier> = list.real().map(|c| c.source).collect();
        assert!(sources.contains(&DiscoveryTier::NativeButton));
        assert!(sources.contains(&DiscoveryTier::ButtonRole));
    }

    #[test]
    fn heuristic_tier_requires_button_likeness() {
        let p = page()
            // Matches [id*="button"] and carries the marker in its id.
            .with(SnapshotElement::new("span").attr("id", "send-button").rect(0.0, 100.0, 60.0, 30.0))
            // Matches [class*="Button"] but "Button" lowercases to a marker too.
            .with(SnapshotElement::new("div").attr("class", "BigButton").rect(0.0, 200.0, 60.0, 30.0))
            // Collected by the role tier before the heuristics run.
            .with(SnapshotElement::new("a").attr("role", "button").rect(0.0, 300.0, 60.0, 30.0));
        let list = detector().detect(&p);
        assert_eq!(list.real_len(), 3);
    }

    #[test]
    fn heuristic_text_verb_qualifies_element() {
        let mut cfg = Config::default();
        cfg.detector.tag_selectors = vec![r#"[class*="card"]"#.to_string()];
        let d = Detector::new(&cfg).unwrap();
        let p = page()
            .with(SnapshotElement::new("div").attr("class", "card").text("Save changes").rect(0.0, 100.0, 60.0, 30.0))
            .with(SnapshotElement::new("div").attr("class", "card").text("Profile").rect(0.0, 200.0, 60.0, 30.0));
        let list = d.detect(&p);
        let texts: Vec<&str> = list.real().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["Save changes"]);
        assert_eq!(d.last_stats().rejected_not_button_like, 1);
    }

    #[test]
    fn truncates_to_max_candidates_before_tail() {
        let mut p = page();
        for i in 0..20 {
            #[allow(clippy::cast_precision_loss)]
            let width = 30.0 + i as f64;
            p.push(SnapshotElement::new("button").text(&format!("b{i}")).rect(0.0, 10.0, width, 30.0));
        }
        let d = detector();
        let list = d.detect(&p);
        assert_eq!(list.real_len(), 15);
        assert_eq!(list.len(), 16);
        assert_eq!(list.get(0).map(Candidate::text), Some("b19"));
        assert!(list.get(15).is_some_and(Candidate::is_synthetic));
        assert_eq!(d.last_stats().qualified, 20);
    }

    #[test]
    fn native_cap_bounds_tier_one() {
        let mut cfg = Config::default();
        cfg.detector.native_cap = 2;
        let d = Detector::new(&cfg).unwrap();
        let mut p = page();
        for label in ["a", "b", "c"] {
            p.push(SnapshotElement::new("button").text(label).rect(0.0, 10.0, 30.0, 30.0));
        }
        assert_eq!(d.detect(&p).real_len(), 2);
    }

    #[test]
    fn candidates_carry_keys_and_hints() {
        let p = page().with(
            SnapshotElement::new("button")
                .attr("id", "send")
                .attr("aria-label", "Send   now")
                .rect(0.0, 100.0, 60.0, 30.0),
        );
        let list = detector().detect(&p);
        let first = list.real().next().unwrap();
        assert_eq!(first.text, "Send   now");
        assert_eq!(first.element_key, "Send now");
        assert_eq!(first.selector_hint, "#send");
    }

    /// Host whose reads call back into the detector, as a mutation observer
    /// firing mid-scan would.
    struct Reentrant<'a> {
        inner: PageSnapshot,
        detector: &'a Detector<NodeId>,
        nested: RefCell<Option<usize>>,
    }

    impl Dom for Reentrant<'_> {
        type Node = NodeId;
        fn viewport(&self) -> Viewport {
            self.inner.viewport()
        }
        fn location(&self) -> String {
            self.inner.location()
        }
        fn query(&self, query: &NodeQuery) -> Vec<NodeId> {
            if self.nested.borrow().is_none() {
                let nested = self.detector.detect(&self.inner);
                *self.nested.borrow_mut() = Some(nested.len());
            }
            self.inner.query(query)
        }
        fn tag_name(&self, node: &NodeId) -> String {
            self.inner.tag_name(node)
        }
        fn attribute(&self, node: &NodeId, name: &str) -> Option<String> {
            self.inner.attribute(node, name)
        }
        fn text_content(&self, node: &NodeId) -> Option<String> {
            self.inner.text_content(node)
        }
        fn bounding_rect(&self, node: &NodeId) -> Result<crate::dom::Rect> {
            self.inner.bounding_rect(node)
        }
        fn computed_style(&self, node: &NodeId) -> Result<ComputedStyle> {
            self.inner.computed_style(node)
        }
        fn is_content_editable(&self, node: &NodeId) -> bool {
            self.inner.is_content_editable(node)
        }
        fn is_focusable(&self, node: &NodeId) -> bool {
            self.inner.is_focusable(node)
        }
        fn active_element(&self) -> Option<NodeId> {
            self.inner.active_element()
        }
        fn focus(&mut self, node: &NodeId) -> Result<()> {
            self.inner.focus(node)
        }
        fn set_attribute(&mut self, node: &NodeId, name: &str, value: &str) -> Result<()> {
            self.inner.set_attribute(node, name, value)
        }
        fn scroll_into_view(&mut self, node: &NodeId) -> Result<()> {
            self.inner.scroll_into_view(node)
        }
        fn click(&mut self, node: &NodeId) -> Result<()> {
            self.inner.click(node)
        }
        fn open_url(&mut self, url: &str) -> Result<()> {
            self.inner.open_url(url)
        }
    }

    #[test]
    fn nested_detection_returns_last_completed_list() {
        let d = detector();
        let host = Reentrant {
            inner: page().with(SnapshotElement::new("button").text("Go").rect(0.0, 100.0, 60.0, 30.0)),
            detector: &d,
            nested: RefCell::new(None),
        };
        let outer = d.detect(&host);
        // The nested call saw the (empty) previous list, not a fresh scan.
        assert_eq!(*host.nested.borrow(), Some(0));
        assert_eq!(outer.real_len(), 1);
        // A later pass is not blocked.
        assert_eq!(d.detect(&host).real_len(), 1);
    }
}
