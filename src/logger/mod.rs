//! Activity logging: JSONL append-only file with graceful degradation, or an
//! in-memory buffer for tests and short-lived hosts.

pub mod jsonl;

use std::sync::Arc;

use parking_lot::Mutex;

pub use jsonl::{EventType, JsonlConfig, JsonlWriter, LogEntry, Severity};

/// Sink for activity events. Recording never fails.
pub trait ActivityLog {
    /// Append one event.
    fn record(&mut self, entry: LogEntry);
}

impl ActivityLog for JsonlWriter {
    fn record(&mut self, entry: LogEntry) {
        self.write_entry(&entry);
    }
}

/// Keeps entries in memory. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    entries: Arc<Mutex<Vec<LogEntry>>>,
}

impl MemoryLog {
    /// Empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far.
    #[must_use]
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().clone()
    }

    /// Event types in recording order.
    #[must_use]
    pub fn events(&self) -> Vec<EventType> {
        self.entries.lock().iter().map(|e| e.event).collect()
    }
}

impl ActivityLog for MemoryLog {
    fn record(&mut self, entry: LogEntry) {
        self.entries.lock().push(entry);
    }
}

/// Drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLog;

impl ActivityLog for NullLog {
    fn record(&mut self, _entry: LogEntry) {}
}

impl<L: ActivityLog + ?Sized> ActivityLog for Box<L> {
    fn record(&mut self, entry: LogEntry) {
        (**self).record(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    #[test]
    fn memory_log_clones_share_entries() {
        let log = MemoryLog::new();
        let mut sink: Box<dyn ActivityLog> = Box::new(log.clone());
        sink.record(LogEntry::new(
            EventType::SessionStart,
            Severity::Info,
            DateTime::<Utc>::UNIX_EPOCH,
        ));
        assert_eq!(log.events(), vec![EventType::SessionStart]);
    }
}
