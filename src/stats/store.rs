//! Usage counters with a lazily loaded cache and a debounced flush.
//!
//! Layout of the persisted blob (one value under the stats storage key):
//!
//! ```json
//! { "mail.example.com/mail": { "totalSelections": 4,
//!                              "Compose": { "shown": 9, "clicked": 3 } } }
//! ```
//!
//! Every write lands in the cache at once and re-arms one flush task, so a
//! burst of events costs one storage write after the burst goes quiet.
//! Storage failures never reach the caller: a failed load starts from an
//! empty database, a failed flush drops that write.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::config::StatsConfig;
use crate::navigator::schedule::{Clock, ScheduledTask};
use crate::stats::backend::KeyValueStore;

/// Counters for one element label on one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonStats {
    #[serde(default)]
    pub shown: u64,
    #[serde(default)]
    pub clicked: u64,
}

/// Counters for one page: per-element entries plus the page-wide selection total.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageStats {
    #[serde(rename = "totalSelections", default)]
    pub total_selections: u64,
    #[serde(flatten)]
    pub buttons: BTreeMap<String, ButtonStats>,
}

/// Whole statistics database, keyed by page key.
pub type StatsDb = BTreeMap<String, PageStats>;

/// What a flush did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    Written { pages: usize },
    /// The write was dropped; counters stay in the cache.
    Failed { details: String },
}

/// How the cache was initialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { pages: usize },
    Missing,
    /// Unreadable or malformed; started empty.
    Failed { details: String },
}

/// Stats recorder over a [`KeyValueStore`].
pub struct StatsRecorder {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    storage_key: String,
    debounce: Duration,
    cache: Option<StatsDb>,
    load_outcome: Option<LoadOutcome>,
    flush: ScheduledTask,
}

impl std::fmt::Debug for StatsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsRecorder")
            .field("storage_key", &self.storage_key)
            .field("debounce", &self.debounce)
            .field("loaded", &self.cache.is_some())
            .field("flush", &self.flush)
            .finish_non_exhaustive()
    }
}

impl StatsRecorder {
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: &StatsConfig) -> Self {
        Self {
            store,
            clock,
            storage_key: config.storage_key.clone(),
            debounce: Duration::from_millis(config.flush_debounce_ms),
            cache: None,
            load_outcome: None,
            flush: ScheduledTask::idle(),
        }
    }

    /// Load the persisted database once. Later calls are no-ops.
    pub fn ensure_loaded(&mut self) -> &LoadOutcome {
        if self.cache.is_none() {
            let (db, outcome) = self.load();
            self.cache = Some(db);
            self.load_outcome = Some(outcome);
        }
        self.load_outcome.get_or_insert(LoadOutcome::Missing)
    }

    fn load(&self) -> (StatsDb, LoadOutcome) {
        match self.store.get(&self.storage_key) {
            Ok(None) => (StatsDb::new(), LoadOutcome::Missing),
            Ok(Some(value)) if !value.is_object() => (
                StatsDb::new(),
                LoadOutcome::Failed {
                    details: format!("expected an object, found {value}"),
                },
            ),
            Ok(Some(value)) => match serde_json::from_value::<StatsDb>(value) {
                Ok(db) => {
                    let pages = db.len();
                    (db, LoadOutcome::Loaded { pages })
                }
                Err(e) => (
                    StatsDb::new(),
                    LoadOutcome::Failed {
                        details: e.to_string(),
                    },
                ),
            },
            Err(e) => (
                StatsDb::new(),
                LoadOutcome::Failed {
                    details: e.to_string(),
                },
            ),
        }
    }

    fn db(&mut self) -> &mut StatsDb {
        self.ensure_loaded();
        self.cache.get_or_insert_with(StatsDb::new)
    }

    fn entry(&mut self, page: &str, element: &str) -> &mut ButtonStats {
        self.db()
            .entry(page.to_string())
            .or_default()
            .buttons
            .entry(element.to_string())
            .or_default()
    }

    fn schedule_flush(&mut self) {
        self.flush.schedule(self.clock.now(), self.debounce);
    }

    /// The element was offered as a candidate.
    pub fn record_shown(&mut self, page: &str, element: &str) {
        let entry = self.entry(page, element);
        entry.shown = entry.shown.saturating_add(1);
        self.schedule_flush();
    }

    /// The element was the one the user accepted.
    pub fn record_clicked(&mut self, page: &str, element: &str) {
        let entry = self.entry(page, element);
        entry.clicked = entry.clicked.saturating_add(1);
        self.schedule_flush();
    }

    /// Any confirmed selection on the page.
    pub fn record_selection_made(&mut self, page: &str) {
        let stats = self.db().entry(page.to_string()).or_default();
        stats.total_selections = stats.total_selections.saturating_add(1);
        self.schedule_flush();
    }

    /// Share of the page's confirmed selections that went to this element,
    /// in percent, two significant digits, at most 100. `None` until the page
    /// has a selection.
    pub fn click_rate(&mut self, page: &str, element: &str) -> Option<f64> {
        let stats = self.db().get(page)?;
        if stats.total_selections == 0 {
            return None;
        }
        let clicked = stats.buttons.get(element).map_or(0, |b| b.clicked);
        Some(click_rate_percent(clicked, stats.total_selections))
    }

    /// Clicks recorded for the element, or `None` if it was never recorded.
    pub fn click_count(&mut self, page: &str, element: &str) -> Option<u64> {
        self.button_stats(page, element).map(|b| b.clicked)
    }

    pub fn button_stats(&mut self, page: &str, element: &str) -> Option<ButtonStats> {
        self.db().get(page)?.buttons.get(element).copied()
    }

    /// Counters for one page; empty when nothing was recorded.
    pub fn stats_for_page(&mut self, page: &str) -> PageStats {
        self.db().get(page).cloned().unwrap_or_default()
    }

    /// Copy of the whole database.
    pub fn snapshot(&mut self) -> StatsDb {
        self.db().clone()
    }

    #[must_use]
    pub const fn has_pending_flush(&self) -> bool {
        self.flush.is_pending()
    }

    /// Flush when the debounce window has passed.
    pub fn tick(&mut self) -> Option<FlushOutcome> {
        if self.flush.fire_if_due(self.clock.now()) {
            Some(self.write())
        } else {
            None
        }
    }

    /// Write immediately, cancelling any pending flush.
    pub fn flush_now(&mut self) -> FlushOutcome {
        self.flush.cancel();
        self.write()
    }

    fn write(&mut self) -> FlushOutcome {
        let db = self.db();
        let pages = db.len();
        let value = match serde_json::to_value(&*db) {
            Ok(value) => value,
            Err(e) => {
                return FlushOutcome::Failed {
                    details: e.to_string(),
                };
            }
        };
        match self.store.set(&self.storage_key, value) {
            Ok(()) => FlushOutcome::Written { pages },
            Err(e) => FlushOutcome::Failed {
                details: e.to_string(),
            },
        }
    }
}

/// `clicked / total * 100`, rounded to two significant digits, capped at 100.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn click_rate_percent(clicked: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let raw = clicked as f64 / total as f64 * 100.0;
    round_significant(raw, 2).min(100.0)
}

#[allow(clippy::cast_possible_truncation)]
fn round_significant(value: f64, digits: i32) -> f64 {
    if value == 0.0 || !value.is_finite() {
        return value;
    }
    let magnitude = value.abs().log10().floor() as i32;
    let factor = 10f64.powi(digits - 1 - magnitude);
    (value * factor).round() / factor
}
