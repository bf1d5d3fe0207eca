//! Usage statistics: counters, storage backends, session log, export.

pub mod backend;
pub mod export;
pub mod session_log;
pub mod store;
