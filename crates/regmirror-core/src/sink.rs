//! Event sinks.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::event::{EventSeverity, SyncEvent};

/// Receiver of pipeline events.
///
/// Implementations must be cheap and must not fail; a sink that cannot
/// deliver an event drops it.
pub trait EventSink: Send + Sync + Debug {
    /// Handles one event.
    fn emit(&self, event: &SyncEvent);

    /// Returns the sink name for identification.
    fn name(&self) -> &'static str;
}

/// Shared handle to a sink.
pub type SharedSink = Arc<dyn EventSink>;

/// Sink that forwards events to `tracing` at a level matching their severity.
#[derive(Debug, Default)]
pub struct TracingSink;

impl TracingSink {
    /// Creates a new tracing sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Creates a shared tracing sink.
    #[must_use]
    pub fn shared() -> SharedSink {
        Arc::new(Self)
    }
}

impl EventSink for TracingSink {
    fn emit(&self, event: &SyncEvent) {
        match event.severity() {
            EventSeverity::Debug => debug!(target: "regmirror::events", "{event}"),
            EventSeverity::Info => info!(target: "regmirror::events", "{event}"),
            EventSeverity::Warning => warn!(target: "regmirror::events", "{event}"),
            EventSeverity::Error => error!(target: "regmirror::events", "{event}"),
        }
    }

    fn name(&self) -> &'static str {
        "tracing"
    }
}

/// Sink that discards every event.
#[derive(Debug, Default)]
pub struct NoopSink;

impl NoopSink {
    /// Creates a shared no-op sink.
    #[must_use]
    pub fn shared() -> SharedSink {
        Arc::new(Self)
    }
}

impl EventSink for NoopSink {
    fn emit(&self, _event: &SyncEvent) {}

    fn name(&self) -> &'static str {
        "noop"
    }
}

/// In-memory sink for testing.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<SyncEvent>>,
}

impl MemorySink {
    /// Creates a new in-memory sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events.lock().clone()
    }

    /// Returns the recorded events matching a predicate.
    pub fn filter(&self, predicate: impl Fn(&SyncEvent) -> bool) -> Vec<SyncEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| predicate(e))
            .cloned()
            .collect()
    }

    /// Clears all recorded events.
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: &SyncEvent) {
        self.events.lock().push(event.clone());
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished() -> SyncEvent {
        SyncEvent::SyncFinished {
            total: 1,
            succeeded: 1,
            failed: 0,
        }
    }

    #[test]
    fn test_memory_sink_records_events() {
        let sink = MemorySink::new();
        sink.emit(&finished());
        sink.emit(&SyncEvent::NoMatchingTags {
            repository: "redis".to_string(),
        });

        assert_eq!(sink.events().len(), 2);
        let warnings = sink.filter(|e| e.severity() == EventSeverity::Warning);
        assert_eq!(warnings.len(), 1);

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_tracing_and_noop_sinks_accept_events() {
        let tracing_sink = TracingSink::new();
        tracing_sink.emit(&finished());
        assert_eq!(tracing_sink.name(), "tracing");

        let noop = NoopSink;
        noop.emit(&finished());
        assert_eq!(noop.name(), "noop");
    }
}
