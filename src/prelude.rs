//! Convenience re-exports for library consumers.
//!
//! ```rust,no_run
//! use smartnav::prelude::*;
//! ```

// Core
pub use crate::core::config::Config;
pub use crate::core::errors::{Result, SmartNavError};

// Host abstraction
pub use crate::dom::snapshot::{NodeId, PageSnapshot, SnapshotElement};
pub use crate::dom::{Dom, NodeQuery, Point, Rect, Viewport};

// Detection and navigation
pub use crate::detector::Detector;
pub use crate::detector::candidate::{Candidate, RankedCandidateList, SyntheticAction, SyntheticEntry};
pub use crate::navigator::schedule::{Clock, ManualClock, SystemClock};
pub use crate::navigator::session::{MutationFilter, MutationRecord, NavigatorSession, SessionParts};
pub use crate::navigator::{Direction, Landing, NavError, Navigator};

// Keys
pub use crate::keys::{KeyAction, KeyBindings, KeyDisposition, KeyEvent, KeyRouter};

// Stats
pub use crate::stats::backend::{FileStore, KeyValueStore, MemoryStore};
pub use crate::stats::store::{FlushOutcome, StatsRecorder};

// Presentation and logging
pub use crate::logger::{ActivityLog, JsonlWriter, MemoryLog};
pub use crate::presenter::{ColorToken, HighlightRequest, Presenter, RecordingPresenter};
