//! One page context: navigator, stats, presenter and the deferred tasks that
//! tie them together.
//!
//! Hosts feed events in (`handle_key`, `on_mutations`, `set_pointer`) and
//! call [`NavigatorSession::tick`] from a timer. Deferred work (re-detection,
//! auto-close, the stats flush) runs only from `tick`, never from inside the
//! call that armed it, so a page change the session causes cannot re-enter
//! the session through a mutation callback.

#![allow(missing_docs)]

use std::sync::Arc;
use std::time::Duration;

use crate::core::config::{Config, NavigatorConfig};
use crate::core::errors::Result;
use crate::detector::Detector;
use crate::detector::candidate::Candidate;
use crate::detector::text::page_key;
use crate::dom::{Dom, Point};
use crate::keys::{KeyBindings, KeyDisposition, KeyEvent, KeyRouter, NavigatorView, Route, SelectedView};
use crate::logger::{ActivityLog, EventType, LogEntry, Severity};
use crate::navigator::schedule::{Clock, ScheduledTask};
use crate::navigator::{Direction, Landing, NavError, Navigator};
use crate::presenter::{ColorPreference, ColorToken, HighlightRequest, Presenter};
use crate::stats::backend::KeyValueStore;
use crate::stats::export::ExportDocument;
use crate::stats::session_log::SessionLog;
use crate::stats::store::{FlushOutcome, LoadOutcome, StatsRecorder};

// ──────────────────── mutation filtering ────────────────────

/// An element node inserted into the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddedElement {
    pub tag: String,
    pub id: Option<String>,
    pub class: Option<String>,
    pub role: Option<String>,
}

impl AddedElement {
    #[must_use]
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }

    #[must_use]
    pub fn class(mut self, class: &str) -> Self {
        self.class = Some(class.to_string());
        self
    }

    #[must_use]
    pub fn role(mut self, role: &str) -> Self {
        self.role = Some(role.to_string());
        self
    }
}

/// What a host's mutation observer reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList { added: Vec<AddedElement> },
    Attribute { name: String, target_id: Option<String> },
}

/// Decides which page mutations warrant a re-detection.
#[derive(Debug, Clone)]
pub struct MutationFilter {
    overlay_prefix: String,
}

impl MutationFilter {
    #[must_use]
    pub fn new(overlay_prefix: &str) -> Self {
        Self {
            overlay_prefix: overlay_prefix.to_string(),
        }
    }

    /// Button-like insertions and `role`/`class`/`style` changes count.
    /// Anything carrying the overlay id prefix is the overlay's own doing.
    #[must_use]
    pub fn is_relevant(&self, record: &MutationRecord) -> bool {
        match record {
            MutationRecord::ChildList { added } => added
                .iter()
                .any(|el| !self.is_overlay(el.id.as_deref()) && looks_like_button(el)),
            MutationRecord::Attribute { name, target_id } => {
                !self.is_overlay(target_id.as_deref())
                    && matches!(name.as_str(), "role" | "class" | "style")
            }
        }
    }

    fn is_overlay(&self, id: Option<&str>) -> bool {
        id.is_some_and(|id| id.starts_with(&self.overlay_prefix))
    }
}

fn looks_like_button(el: &AddedElement) -> bool {
    let class = el.class.as_deref().unwrap_or_default();
    el.tag.eq_ignore_ascii_case("button")
        || el.role.as_deref() == Some("button")
        || class.contains("button")
        || class.contains("t-i")
}

// ──────────────────── session ────────────────────

/// Collaborators a host supplies.
pub struct SessionParts {
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
    pub presenter: Box<dyn Presenter>,
    pub activity: Box<dyn ActivityLog>,
}

#[derive(Debug, Default)]
struct SessionTasks {
    initial: ScheduledTask,
    refresh: ScheduledTask,
    post_select: ScheduledTask,
    periodic: ScheduledTask,
    auto_close: ScheduledTask,
}

/// Owned per-page state. Instantiate once per page context.
pub struct NavigatorSession<N> {
    navigator: Navigator<N>,
    router: KeyRouter,
    filter: MutationFilter,
    stats: StatsRecorder,
    session_log: SessionLog,
    store: Arc<dyn KeyValueStore>,
    color_pref: ColorPreference,
    color: ColorToken,
    presenter: Box<dyn Presenter>,
    highlight: Option<HighlightRequest>,
    activity: Box<dyn ActivityLog>,
    clock: Arc<dyn Clock>,
    timing: NavigatorConfig,
    anchor: Option<Point>,
    tasks: SessionTasks,
}

impl<N: std::fmt::Debug + Clone + Eq + std::hash::Hash> std::fmt::Debug for NavigatorSession<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigatorSession")
            .field("current", &self.navigator.current_index())
            .field("color", &self.color)
            .field("anchor", &self.anchor)
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

const fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

impl<N: Clone + Eq + std::hash::Hash> NavigatorSession<N> {
    pub fn new(config: &Config, parts: SessionParts) -> Result<Self> {
        let SessionParts {
            store,
            clock,
            presenter,
            activity,
        } = parts;
        let color_pref = ColorPreference::new(config.stats.color_key.clone());
        let color = color_pref.load(store.as_ref());
        Ok(Self {
            navigator: Navigator::new(Detector::new(config)?),
            router: KeyRouter::new(KeyBindings::from_config(&config.keys)),
            filter: MutationFilter::new(&config.navigator.overlay_id_prefix),
            stats: StatsRecorder::new(Arc::clone(&store), Arc::clone(&clock), &config.stats),
            session_log: SessionLog::started_at(clock.wall_time()),
            store,
            color_pref,
            color,
            presenter,
            highlight: None,
            activity,
            clock,
            timing: config.navigator.clone(),
            anchor: None,
            tasks: SessionTasks::default(),
        })
    }

    #[must_use]
    pub fn navigator(&self) -> &Navigator<N> {
        &self.navigator
    }

    pub fn stats_mut(&mut self) -> &mut StatsRecorder {
        &mut self.stats
    }

    #[must_use]
    pub fn session_log(&self) -> &SessionLog {
        &self.session_log
    }

    /// The highlight currently on screen.
    #[must_use]
    pub fn highlight(&self) -> Option<&HighlightRequest> {
        self.highlight.as_ref()
    }

    #[must_use]
    pub fn color(&self) -> &ColorToken {
        &self.color
    }

    /// Any selection or overlay is up.
    #[must_use]
    pub fn is_showing(&self) -> bool {
        self.navigator.is_active() || self.presenter.is_active()
    }

    #[must_use]
    pub const fn has_pending_refresh(&self) -> bool {
        self.tasks.refresh.is_pending()
    }

    /// Arm the initial detection and the periodic refresh, and load stats.
    pub fn start(&mut self) {
        let now = self.clock.now();
        self.tasks
            .initial
            .schedule(now, ms(self.timing.initial_detect_delay_ms));
        if let Some(period) = self.timing.periodic_refresh_ms {
            self.tasks.periodic.schedule(now, ms(period));
        }
        let entry = self.entry(EventType::SessionStart, Severity::Info);
        self.activity.record(entry);

        let loaded = self.stats.ensure_loaded().clone();
        let entry = match loaded {
            LoadOutcome::Loaded { pages } => self
                .entry(EventType::StatsLoaded, Severity::Info)
                .details(format!("{pages} pages")),
            LoadOutcome::Missing => self
                .entry(EventType::StatsLoaded, Severity::Info)
                .details("no saved stats"),
            LoadOutcome::Failed { details } => self
                .entry(EventType::StorageError, Severity::Warning)
                .ok(false)
                .details(details),
        };
        self.activity.record(entry);
    }

    /// Run every deferred task that is due. Several refresh triggers due at
    /// once cost one detection pass.
    pub fn tick<D: Dom<Node = N>>(&mut self, dom: &D) {
        let now = self.clock.now();
        let mut refresh_due = false;
        for task in [
            &mut self.tasks.initial,
            &mut self.tasks.refresh,
            &mut self.tasks.post_select,
        ] {
            refresh_due |= task.fire_if_due(now);
        }
        if self.tasks.periodic.fire_if_due(now) {
            if let Some(period) = self.timing.periodic_refresh_ms {
                self.tasks.periodic.schedule(now, ms(period));
            }
            refresh_due |= self.navigator.is_active();
        }
        if refresh_due {
            self.refresh(dom);
        }
        if self.tasks.auto_close.fire_if_due(now) && self.is_showing() {
            self.close_because("auto_close");
        }
        if let Some(outcome) = self.stats.tick() {
            self.log_flush(&outcome);
        }
    }

    /// Feed observer records. Relevant ones (re)arm the debounced refresh;
    /// nothing is detected here. Returns whether a refresh was armed.
    pub fn on_mutations(&mut self, records: &[MutationRecord]) -> bool {
        if !records.iter().any(|r| self.filter.is_relevant(r)) {
            return false;
        }
        self.tasks
            .refresh
            .schedule(self.clock.now(), ms(self.timing.refresh_debounce_ms));
        true
    }

    /// Last known pointer position; the anchor of the next highlight.
    pub fn set_pointer(&mut self, point: Point) {
        self.anchor = Some(point);
    }

    /// Switch the highlight color, redraw, and persist the choice.
    pub fn set_color(&mut self, color: ColorToken) -> Result<()> {
        self.color = color;
        if let Some(mut request) = self.highlight.take() {
            request.color_token = self.color.clone();
            self.presenter.show(&request);
            self.highlight = Some(request);
        }
        if let Err(e) = self.color_pref.save(self.store.as_ref(), &self.color) {
            let entry = self.entry(EventType::StorageError, Severity::Warning).error(&e);
            self.activity.record(entry);
            return Err(e);
        }
        Ok(())
    }

    /// Handle one key press and tell the host whether to swallow it.
    pub fn handle_key<D: Dom<Node = N>>(&mut self, dom: &mut D, event: &KeyEvent) -> KeyDisposition {
        let Some(action) = self.router.bindings().classify(event) else {
            return KeyDisposition::passthrough();
        };
        let view = self.view(dom);
        match self.router.route(dom, event, view) {
            Route::PassThrough => KeyDisposition::passthrough(),
            Route::Advance(direction) => {
                self.session_log.record_tab_press();
                match self.advance(dom, direction) {
                    Ok(_) => KeyDisposition::handled(action, true),
                    // The page keeps its own Tab behaviour.
                    Err(e @ NavError::NoCandidates) => {
                        KeyDisposition::handled(action, false).with_message(e.to_string())
                    }
                    Err(e) => KeyDisposition::handled(action, true).with_message(e.to_string()),
                }
            }
            Route::AcceptFocused => {
                self.accept(dom);
                KeyDisposition::handled(action, false)
            }
            Route::ClickSelected => match self.navigator.click_selected(dom) {
                Ok(_) => {
                    self.accept(dom);
                    KeyDisposition::handled(action, true)
                }
                Err(e) => {
                    self.log_nav_error(dom, &e);
                    KeyDisposition::handled(action, true).with_message(e.to_string())
                }
            },
            Route::RunSynthetic => {
                let landing = self
                    .navigator
                    .current_index()
                    .and_then(|index| self.navigator.run_synthetic(dom, index));
                if let Some(landing) = landing {
                    self.after_landing(dom, &landing);
                }
                KeyDisposition::handled(action, true)
            }
            Route::Cancel => {
                self.close_because("cancel");
                KeyDisposition::handled(action, true)
            }
        }
    }

    /// Move the selection. Starting from idle runs a fresh pass and counts
    /// every real candidate of it as shown.
    pub fn advance<D: Dom<Node = N>>(
        &mut self,
        dom: &mut D,
        direction: Direction,
    ) -> std::result::Result<Landing, NavError> {
        let fresh_pass = !self.navigator.is_active();
        let result = self.navigator.advance(dom, direction);
        if fresh_pass && !matches!(result, Err(NavError::NoCandidates)) {
            self.record_shown(dom);
        }
        match &result {
            Ok(landing) => self.after_landing(dom, landing),
            Err(NavError::NoCandidates) => {
                self.clear_highlight();
                let entry = self
                    .entry(EventType::NoCandidates, Severity::Info)
                    .page(page_key(&dom.location()));
                self.activity.record(entry);
            }
            Err(e) => self.log_nav_error(dom, e),
        }
        result
    }

    /// The popup's "toggle navigation": close when showing, otherwise start
    /// and land on the first candidate. Returns whether navigation is active.
    pub fn toggle<D: Dom<Node = N>>(&mut self, dom: &mut D) -> std::result::Result<bool, NavError> {
        if self.is_showing() {
            self.close_because("toggle");
            return Ok(false);
        }
        self.advance(dom, Direction::Forward)?;
        Ok(self.navigator.is_active())
    }

    /// Close the interaction and drop the candidate list.
    pub fn close(&mut self) {
        self.close_because("closed");
    }

    /// Snapshot of the session log and the stats database.
    pub fn export(&mut self) -> ExportDocument {
        ExportDocument::build(self.clock.wall_time(), &self.session_log, self.stats.snapshot())
    }

    /// Page is going away: close, stamp the end time, and flush stats now.
    pub fn end(&mut self) -> FlushOutcome {
        self.close_because("session_end");
        self.session_log.end(self.clock.wall_time());
        let outcome = self.stats.flush_now();
        self.log_flush(&outcome);
        let entry = self.entry(EventType::SessionEnd, Severity::Info);
        self.activity.record(entry);
        outcome
    }

    // ──────────────────────── internals ────────────────────────

    fn view<D: Dom<Node = N>>(&self, dom: &D) -> NavigatorView {
        let selected = match self.navigator.selected() {
            None => SelectedView::Nothing,
            Some(Candidate::Synthetic(_)) => SelectedView::Synthetic,
            Some(Candidate::Real(real)) => SelectedView::Real {
                focused: dom.active_element().as_ref() == Some(&real.node),
            },
        };
        NavigatorView {
            selected,
            overlay_visible: self.presenter.is_active(),
        }
    }

    fn refresh<D: Dom<Node = N>>(&mut self, dom: &D) {
        let was_active = self.navigator.is_active();
        let mut kept = self.navigator.refresh(dom);
        // The kept index can now point at the synthetic tail, whose element
        // is gone; that ends the selection.
        if kept.is_some() && !matches!(self.navigator.selected(), Some(Candidate::Real(_))) {
            self.navigator.reset();
            kept = None;
        }
        let pass = self.navigator.detector().last_stats();
        let entry = self
            .entry(EventType::DetectionPass, Severity::Info)
            .page(page_key(&dom.location()))
            .candidates(self.navigator.candidates().real_len())
            .details(serde_json::to_string(&pass).unwrap_or_default());
        self.activity.record(entry);

        if kept.is_some() {
            self.redraw_selected(dom);
        } else if was_active {
            self.clear_highlight();
            self.cancel_selection_tasks();
            let entry = self
                .entry(EventType::NavigationReset, Severity::Info)
                .details("selection left the list");
            self.activity.record(entry);
        }
    }

    /// Follow the selected element after a refresh moved it.
    fn redraw_selected<D: Dom<Node = N>>(&mut self, dom: &D) {
        if self.highlight.is_none() {
            return;
        }
        let Some(Candidate::Real(real)) = self.navigator.selected() else {
            return;
        };
        let rect = dom.bounding_rect(&real.node).unwrap_or(real.rect);
        let request = HighlightRequest {
            target_rect: rect,
            anchor_point: self.anchor_for(dom),
            color_token: self.color.clone(),
        };
        self.presenter.show(&request);
        self.highlight = Some(request);
    }

    fn record_shown<D: Dom<Node = N>>(&mut self, dom: &D) {
        let page = page_key(&dom.location());
        let list = self.navigator.detector().last_list();
        for real in list.real() {
            self.stats.record_shown(&page, &real.element_key);
        }
    }

    fn after_landing<D: Dom>(&mut self, dom: &D, landing: &Landing) {
        match landing {
            Landing::Real {
                index,
                rect,
                element_key,
                ..
            } => {
                let request = HighlightRequest {
                    target_rect: *rect,
                    anchor_point: self.anchor_for(dom),
                    color_token: self.color.clone(),
                };
                self.presenter.show(&request);
                self.highlight = Some(request);

                let now = self.clock.now();
                self.tasks
                    .post_select
                    .schedule(now, ms(self.timing.post_select_refresh_ms));
                if let Some(idle) = self.timing.auto_close_ms {
                    self.tasks.auto_close.schedule(now, ms(idle));
                }

                let mut entry = self
                    .entry(EventType::SelectionMoved, Severity::Info)
                    .page(page_key(&dom.location()))
                    .element(element_key.clone())
                    .index(*index);
                if let Some(Candidate::Real(real)) = self.navigator.selected() {
                    entry = entry.score(real.score);
                }
                self.activity.record(entry);
            }
            Landing::Synthetic {
                index,
                label,
                action_error,
                ..
            } => {
                self.clear_highlight();
                self.cancel_selection_tasks();
                let mut entry = self
                    .entry(EventType::SyntheticAction, Severity::Info)
                    .page(page_key(&dom.location()))
                    .element(label.clone())
                    .index(*index);
                if let Some(error) = action_error {
                    entry.severity = Severity::Warning;
                    entry = entry.ok(false).details(error.clone());
                }
                self.activity.record(entry);
            }
        }
    }

    fn accept<D: Dom<Node = N>>(&mut self, dom: &D) {
        let Some(Candidate::Real(real)) = self.navigator.selected() else {
            return;
        };
        let label = real.text.clone();
        let key = real.element_key.clone();
        let location = dom.location();
        let page = page_key(&location);

        self.stats.record_clicked(&page, &key);
        self.stats.record_selection_made(&page);
        self.session_log
            .record_accepted(self.clock.wall_time(), &label, &location);

        let mut entry = self
            .entry(EventType::SuggestionAccepted, Severity::Info)
            .page(page)
            .element(key)
            .ok(true);
        if let Some(index) = self.navigator.current_index() {
            entry = entry.index(index);
        }
        self.activity.record(entry);
        self.close_because("accepted");
    }

    fn close_because(&mut self, reason: &str) {
        let was_showing = self.is_showing();
        self.navigator.reset();
        self.clear_highlight();
        self.cancel_selection_tasks();
        if was_showing {
            let entry = self
                .entry(EventType::NavigationReset, Severity::Info)
                .details(reason);
            self.activity.record(entry);
        }
    }

    fn clear_highlight(&mut self) {
        self.presenter.clear();
        self.highlight = None;
    }

    fn cancel_selection_tasks(&mut self) {
        self.tasks.post_select.cancel();
        self.tasks.auto_close.cancel();
    }

    fn anchor_for<D: Dom>(&self, dom: &D) -> Point {
        self.anchor.unwrap_or_else(|| dom.viewport().center())
    }

    fn log_nav_error<D: Dom>(&mut self, dom: &D, error: &NavError) {
        let mut entry = self
            .entry(EventType::FocusError, Severity::Warning)
            .page(page_key(&dom.location()));
        entry = match error {
            NavError::Focus { index, source } => entry.index(*index).error(source),
            other => entry.ok(false).details(other.to_string()),
        };
        self.activity.record(entry);
    }

    fn log_flush(&mut self, outcome: &FlushOutcome) {
        let entry = match outcome {
            FlushOutcome::Written { pages } => self
                .entry(EventType::StatsFlushed, Severity::Info)
                .ok(true)
                .details(format!("{pages} pages")),
            FlushOutcome::Failed { details } => self
                .entry(EventType::StorageError, Severity::Warning)
                .ok(false)
                .details(details.clone()),
        };
        self.activity.record(entry);
    }

    fn entry(&self, event: EventType, severity: Severity) -> LogEntry {
        LogEntry::new(event, severity, self.clock.wall_time())
    }

    #[cfg(test)]
    pub(crate) fn navigator_mut(&mut self) -> &mut Navigator<N> {
        &mut self.navigator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Viewport;
    use crate::dom::snapshot::{NodeId, PageSnapshot, SnapshotElement};
    use crate::keys::KeyAction;
    use crate::logger::MemoryLog;
    use crate::navigator::schedule::ManualClock;
    use crate::presenter::RecordingPresenter;
    use crate::stats::backend::MemoryStore;

    struct Harness {
        session: NavigatorSession<NodeId>,
        clock: ManualClock,
        store: MemoryStore,
        log: MemoryLog,
    }

    fn harness_with(cfg: &Config) -> Harness {
        let clock = ManualClock::default();
        let store = MemoryStore::new();
        let log = MemoryLog::new();
        let session = NavigatorSession::new(
            cfg,
            SessionParts {
                store: Arc::new(store.clone()),
                clock: Arc::new(clock.clone()),
                presenter: Box::new(RecordingPresenter::new()),
                activity: Box::new(log.clone()),
            },
        )
        .unwrap();
        Harness {
            session,
            clock,
            store,
            log,
        }
    }

    fn harness() -> Harness {
        harness_with(&Config::default())
    }

    fn page() -> PageSnapshot {
        PageSnapshot::new("https://mail.example.com/mail/u/0", Viewport::default())
            .with(SnapshotElement::new("button").text("Archive").rect(0.0, 10.0, 40.0, 30.0))
            .with(SnapshotElement::new("button").text("Compose").rect(0.0, 100.0, 120.0, 40.0))
    }

    fn count(log: &MemoryLog, event: EventType) -> usize {
        log.events().iter().filter(|e| **e == event).count()
    }

    #[test]
    fn filter_keeps_button_like_insertions_and_layout_attributes() {
        let f = MutationFilter::new("smartnav-");
        let added = |el: AddedElement| MutationRecord::ChildList { added: vec![el] };
        assert!(f.is_relevant(&added(AddedElement::new("BUTTON"))));
        assert!(f.is_relevant(&added(AddedElement::new("div").role("button"))));
        assert!(f.is_relevant(&added(AddedElement::new("div").class("T-I t-i-atl"))));
        assert!(!f.is_relevant(&added(AddedElement::new("span").class("label"))));
        assert!(!f.is_relevant(&added(
            AddedElement::new("button").id("smartnav-highlight")
        )));

        let attr = |name: &str, id: Option<&str>| MutationRecord::Attribute {
            name: name.to_string(),
            target_id: id.map(String::from),
        };
        assert!(f.is_relevant(&attr("class", None)));
        assert!(f.is_relevant(&attr("style", Some("toolbar"))));
        assert!(!f.is_relevant(&attr("aria-expanded", None)));
        assert!(!f.is_relevant(&attr("style", Some("smartnav-chord"))));
    }

    #[test]
    fn mutations_only_arm_a_debounced_refresh() {
        let mut h = harness();
        let p = page();
        let record = MutationRecord::Attribute {
            name: "class".to_string(),
            target_id: None,
        };
        for _ in 0..3 {
            assert!(h.session.on_mutations(std::slice::from_ref(&record)));
            h.clock.advance_ms(200);
            h.session.tick(&p);
        }
        assert_eq!(count(&h.log, EventType::DetectionPass), 0);
        h.clock.advance_ms(300);
        h.session.tick(&p);
        assert_eq!(count(&h.log, EventType::DetectionPass), 1);
        assert!(!h.session.has_pending_refresh());
    }

    #[test]
    fn overlay_mutations_do_not_arm_anything() {
        let mut h = harness();
        let armed = h.session.on_mutations(&[MutationRecord::ChildList {
            added: vec![AddedElement::new("div").id("smartnav-chord").class("button")],
        }]);
        assert!(!armed);
        assert!(!h.session.has_pending_refresh());
    }

    #[test]
    fn initial_detection_runs_after_the_settle_delay() {
        let mut h = harness();
        let p = page();
        h.session.start();
        h.clock.advance_ms(999);
        h.session.tick(&p);
        assert_eq!(count(&h.log, EventType::DetectionPass), 0);
        h.clock.advance_ms(1);
        h.session.tick(&p);
        assert_eq!(count(&h.log, EventType::DetectionPass), 1);
        assert_eq!(h.session.navigator().candidates().real_len(), 2);
        assert!(!h.session.navigator().is_active());
    }

    #[test]
    fn landing_shows_highlight_anchored_at_pointer() {
        let mut h = harness();
        let mut p = page();
        h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        let first = h.session.highlight().unwrap().clone();
        assert_eq!(first.anchor_point, Viewport::default().center());
        assert_eq!(first.target_rect.width, 120.0);
        assert_eq!(first.color_token, ColorToken::default());

        h.session.set_pointer(Point { x: 3.0, y: 4.0 });
        h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        let second = h.session.highlight().unwrap();
        assert_eq!(second.anchor_point, Point { x: 3.0, y: 4.0 });
        assert_eq!(second.target_rect.width, 40.0);
        assert_eq!(count(&h.log, EventType::SelectionMoved), 2);
    }

    #[test]
    fn accepting_records_click_after_shown_and_closes() {
        let mut h = harness();
        let mut p = page();
        let d = h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        assert!(d.prevent_default);
        h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        h.session.handle_key(&mut p, &KeyEvent::shifted("Tab"));

        let d = h.session.handle_key(&mut p, &KeyEvent::key("Enter"));
        assert_eq!(d, KeyDisposition::handled(KeyAction::Confirm, false));
        assert!(!h.session.is_showing());
        assert!(h.session.highlight().is_none());

        let page = "mail.example.com/mail";
        let stats = h.session.stats_mut();
        // One fresh pass: each candidate counted as shown once.
        assert_eq!(
            stats.button_stats(page, "Compose").map(|b| (b.shown, b.clicked)),
            Some((1, 1))
        );
        assert_eq!(stats.button_stats(page, "Archive").map(|b| b.shown), Some(1));
        assert_eq!(stats.click_rate(page, "Compose"), Some(100.0));
        assert_eq!(h.session.session_log().tab_presses(), 3);
        assert_eq!(h.session.session_log().accepted()[0].suggestion_name, "Compose");
    }

    #[test]
    fn click_confirm_clicks_and_intercepts() {
        let mut h = harness();
        let mut p = page();
        h.session.handle_key(&mut p, &KeyEvent::key("d"));
        p.take_effects();
        let d = h.session.handle_key(&mut p, &KeyEvent::key("w"));
        assert!(d.prevent_default);
        assert!(p.effects().contains(&crate::dom::snapshot::Effect::Clicked { node: NodeId(1) }));
        assert_eq!(count(&h.log, EventType::SuggestionAccepted), 1);
    }

    #[test]
    fn empty_page_passes_tab_through_with_a_message() {
        let mut h = harness();
        let mut p = PageSnapshot::new("https://example.com/", Viewport::default());
        let d = h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        assert!(!d.prevent_default);
        assert_eq!(d.message.as_deref(), Some("no buttons detected on this page"));
        assert_eq!(count(&h.log, EventType::NoCandidates), 1);
        assert!(h.session.toggle(&mut p).is_err());
    }

    #[test]
    fn synthetic_confirm_runs_the_entry_and_clears() {
        let mut h = harness();
        let mut p = page();
        h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        // Park on the tail without landing, as a host mid-transition would.
        h.session.navigator_mut().park_on(2);
        let d = h.session.handle_key(&mut p, &KeyEvent::key("Enter"));
        assert!(d.prevent_default);
        assert!(!h.session.is_showing());
        assert_eq!(count(&h.log, EventType::SyntheticAction), 1);
    }

    #[test]
    fn escape_closes_only_when_showing() {
        let mut h = harness();
        let mut p = page();
        let d = h.session.handle_key(&mut p, &KeyEvent::key("Escape"));
        assert_eq!(d, KeyDisposition::passthrough());
        h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        let d = h.session.handle_key(&mut p, &KeyEvent::key("Escape"));
        assert!(d.prevent_default);
        assert!(!h.session.is_showing());
        assert_eq!(count(&h.log, EventType::NavigationReset), 1);
    }

    #[test]
    fn toggle_opens_then_closes() {
        let mut h = harness();
        let mut p = page();
        assert!(h.session.toggle(&mut p).unwrap());
        assert_eq!(h.session.navigator().current_index(), Some(0));
        assert!(!h.session.toggle(&mut p).unwrap());
        assert!(!h.session.is_showing());
    }

    #[test]
    fn auto_close_fires_after_inactivity() {
        let mut cfg = Config::default();
        cfg.navigator.auto_close_ms = Some(2_000);
        let mut h = harness_with(&cfg);
        let mut p = page();
        h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        h.clock.advance_ms(1_500);
        h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        h.clock.advance_ms(1_500);
        h.session.tick(&p);
        assert!(h.session.is_showing());
        h.clock.advance_ms(500);
        h.session.tick(&p);
        assert!(!h.session.is_showing());
    }

    #[test]
    fn post_select_refresh_drops_a_vanished_selection() {
        let mut h = harness();
        let mut p = page();
        h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        for id in 0..2 {
            p.element_mut(NodeId(id)).unwrap().detached = true;
        }
        h.clock.advance_ms(300);
        h.session.tick(&p);
        assert!(!h.session.navigator().is_active());
        assert!(h.session.highlight().is_none());
        assert_eq!(count(&h.log, EventType::NavigationReset), 1);
    }

    #[test]
    fn refresh_onto_the_synthetic_tail_clears_the_highlight() {
        let mut h = harness();
        let mut p = page();
        h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        assert_eq!(h.session.navigator().current_index(), Some(1));
        // Archive is the second candidate; once it vanishes, index 1 is `other`.
        p.element_mut(NodeId(0)).unwrap().detached = true;
        h.clock.advance_ms(300);
        h.session.tick(&p);
        assert!(!h.session.navigator().is_active());
        assert!(h.session.highlight().is_none());
        assert!(!h.session.is_showing());
        assert_eq!(count(&h.log, EventType::NavigationReset), 1);
    }

    #[test]
    fn debug_output_names_the_current_index() {
        let mut h = harness();
        let mut p = page();
        h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        let rendered = format!("{:?}", h.session);
        assert!(rendered.contains("current: Some(0)"), "{rendered}");
    }

    #[test]
    fn stats_flush_once_after_the_burst() {
        let mut h = harness();
        let mut p = page();
        h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        h.session.handle_key(&mut p, &KeyEvent::key("Enter"));
        assert!(h.store.get("tabtabgo_stats").unwrap().is_none());
        h.clock.advance_ms(500);
        h.session.tick(&p);
        let saved = h.store.get("tabtabgo_stats").unwrap().unwrap();
        assert_eq!(saved["mail.example.com/mail"]["totalSelections"], 1);
        assert_eq!(count(&h.log, EventType::StatsFlushed), 1);
    }

    #[test]
    fn color_choice_persists_and_redraws() {
        let mut h = harness();
        let mut p = page();
        h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        let pink: ColorToken = "#ec4899".parse().unwrap();
        h.session.set_color(pink.clone()).unwrap();
        assert_eq!(h.session.highlight().unwrap().color_token, pink);
        assert_eq!(
            h.store.get("smarttabColor").unwrap(),
            Some(serde_json::Value::String("#ec4899".to_string()))
        );
    }

    #[test]
    fn end_flushes_and_stamps_the_session() {
        let mut h = harness();
        let mut p = page();
        h.session.handle_key(&mut p, &KeyEvent::key("Tab"));
        h.clock.advance_ms(60_000);
        assert_eq!(h.session.end(), FlushOutcome::Written { pages: 1 });
        let doc = h.session.export();
        assert!(doc.session_log.session.end_time.is_some());
        assert_eq!(doc.button_stats["mail.example.com/mail"].buttons.len(), 2);
        assert_eq!(h.log.events().last(), Some(&EventType::SessionEnd));
    }
}
