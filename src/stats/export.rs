//! One-way JSON export of the session log and the stats database.

#![allow(missing_docs)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::core::errors::{Result, SmartNavError};
use crate::stats::session_log::{AcceptedSuggestion, SessionLog, SessionSummary};
use crate::stats::store::StatsDb;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub exported_at: DateTime<Utc>,
    pub session_log: SessionLogSection,
    pub button_stats: StatsDb,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLogSection {
    pub session: SessionSummary,
    pub accepted_suggestions: Vec<AcceptedSuggestion>,
}

impl ExportDocument {
    #[must_use]
    pub fn build(exported_at: DateTime<Utc>, session: &SessionLog, stats: StatsDb) -> Self {
        Self {
            exported_at,
            session_log: SessionLogSection {
                session: session.summary(),
                accepted_suggestions: session.accepted().to_vec(),
            },
            button_stats: stats,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write into `dir` under [`Self::file_name`], creating `dir` if needed.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir).map_err(|source| SmartNavError::io(dir, source))?;
        let path = dir.join(self.file_name());
        fs::write(&path, self.to_json_pretty()?).map_err(|source| SmartNavError::io(&path, source))?;
        Ok(path)
    }

    /// `smartnav-export-<timestamp>.json`, with `:` replaced so the name is
    /// valid on every filesystem.
    #[must_use]
    pub fn file_name(&self) -> String {
        let stamp = self
            .exported_at
            .to_rfc3339_opts(SecondsFormat::Secs, true)
            .replace(':', "-");
        format!("smartnav-export-{stamp}.json")
    }
}
