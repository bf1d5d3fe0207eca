//! Property-based tests for ring navigation and ranking order.

use proptest::prelude::*;

use super::{Direction, Navigator, SelectionState};
use crate::core::config::Config;
use crate::detector::Detector;
use crate::detector::candidate::{RankedCandidateList, SyntheticEntry};
use crate::dom::Viewport;
use crate::dom::snapshot::{NodeId, PageSnapshot, SnapshotElement};

// ──────────────────── strategies ────────────────────

fn ring(len: usize, current: Option<usize>) -> SelectionState<NodeId> {
    let tail: Vec<SyntheticEntry> = (0..len)
        .map(|i| SyntheticEntry {
            label: format!("slot-{i}"),
            ..SyntheticEntry::other()
        })
        .collect();
    SelectionState {
        candidates: RankedCandidateList::new(Vec::new(), &tail),
        current,
    }
}

fn arb_ring() -> impl Strategy<Value = SelectionState<NodeId>> {
    (1usize..40).prop_flat_map(|n| (0..n).prop_map(move |i| ring(n, Some(i))))
}

/// Button widths drawn from a small set so ties are common.
fn arb_widths() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(0u8..6, 0..30)
}

fn page_from(widths: &[u8]) -> PageSnapshot {
    let mut page = PageSnapshot::new("https://example.com/", Viewport::default());
    for (i, w) in widths.iter().enumerate() {
        page.push(
            SnapshotElement::new("button")
                .text(&format!("b{i}"))
                .rect(0.0, 10.0, 20.0 + f64::from(*w) * 10.0, 30.0),
        );
    }
    page
}

fn walk(state: &mut SelectionState<NodeId>, direction: Direction) {
    state.current = state.step(direction);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// n forward steps return to the start.
    #[test]
    fn forward_is_a_ring(mut state in arb_ring()) {
        let start = state.current;
        for _ in 0..state.candidates.len() {
            walk(&mut state, Direction::Forward);
        }
        prop_assert_eq!(state.current, start);
    }

    /// Backward undoes forward and vice versa.
    #[test]
    fn backward_inverts_forward(mut state in arb_ring()) {
        let start = state.current;
        walk(&mut state, Direction::Forward);
        walk(&mut state, Direction::Backward);
        prop_assert_eq!(state.current, start);
        walk(&mut state, Direction::Backward);
        walk(&mut state, Direction::Forward);
        prop_assert_eq!(state.current, start);
    }

    /// Steps never leave `[0, n)`.
    #[test]
    fn steps_stay_in_range(
        mut state in arb_ring(),
        moves in prop::collection::vec(any::<bool>(), 1..60),
    ) {
        let n = state.candidates.len();
        for forward in moves {
            walk(&mut state, if forward { Direction::Forward } else { Direction::Backward });
            prop_assert!(state.current.is_some_and(|i| i < n));
        }
    }

    /// Real prefix is non-increasing by score; equal scores keep document order.
    #[test]
    fn ranking_is_stable_and_descending(widths in arb_widths()) {
        let cfg = Config::default();
        let detector: Detector<NodeId> = Detector::new(&cfg).unwrap();
        let list = detector.detect(&page_from(&widths));
        let real: Vec<_> = list.real().collect();
        prop_assert_eq!(real.len(), widths.len().min(cfg.detector.max_candidates));
        for pair in real.windows(2) {
            prop_assert!(pair[0].score >= pair[1].score);
            if (pair[0].score - pair[1].score).abs() < f64::EPSILON {
                prop_assert!(pair[0].node < pair[1].node);
            }
        }
        prop_assert_eq!(list.len(), real.len() + cfg.detector.synthetic_tail.len());
    }

    /// Whatever the key sequence, the navigator's index is always valid.
    #[test]
    fn navigator_index_always_valid(
        widths in prop::collection::vec(0u8..6, 1..8),
        moves in prop::collection::vec(any::<bool>(), 1..30),
    ) {
        let cfg = Config::default();
        let mut nav = Navigator::new(Detector::new(&cfg).unwrap());
        let mut page = page_from(&widths);
        for forward in moves {
            let direction = if forward { Direction::Forward } else { Direction::Backward };
            let _ = nav.advance(&mut page, direction);
            if let Some(i) = nav.current_index() {
                prop_assert!(i < nav.candidates().real_len());
            }
        }
    }
}
