//! Per-session activity: key presses and accepted suggestions.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One confirmed selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedSuggestion {
    pub timestamp: DateTime<Utc>,
    pub suggestion_name: String,
    pub url: String,
}

/// Session totals as exported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_tab_presses: u64,
    pub total_suggestions_accepted: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionLog {
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    tab_presses: u64,
    accepted: Vec<AcceptedSuggestion>,
}

impl SessionLog {
    #[must_use]
    pub const fn started_at(start_time: DateTime<Utc>) -> Self {
        Self {
            start_time,
            end_time: None,
            tab_presses: 0,
            accepted: Vec::new(),
        }
    }

    /// Count a navigation key press (forward or backward).
    pub fn record_tab_press(&mut self) {
        self.tab_presses = self.tab_presses.saturating_add(1);
    }

    pub fn record_accepted(&mut self, timestamp: DateTime<Utc>, name: &str, url: &str) {
        self.accepted.push(AcceptedSuggestion {
            timestamp,
            suggestion_name: name.to_string(),
            url: url.to_string(),
        });
    }

    /// Close the session. A second call keeps the first end time.
    pub fn end(&mut self, at: DateTime<Utc>) {
        self.end_time.get_or_insert(at);
    }

    #[must_use]
    pub fn accepted(&self) -> &[AcceptedSuggestion] {
        &self.accepted
    }

    #[must_use]
    pub const fn tab_presses(&self) -> u64 {
        self.tab_presses
    }

    #[must_use]
    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            start_time: self.start_time,
            end_time: self.end_time,
            total_tab_presses: self.tab_presses,
            total_suggestions_accepted: self.accepted.len() as u64,
        }
    }
}
