//! Human-readable progress output.

use std::sync::Arc;

use regmirror_core::{EventSeverity, EventSink, SharedSink, SyncEvent, TracingSink};

/// Prints pipeline events to stdout and forwards them to `tracing`.
#[derive(Debug)]
pub struct ConsoleSink {
    verbose: bool,
    tracing: TracingSink,
}

impl ConsoleSink {
    /// Creates a shared console sink; `verbose` also prints debug events.
    pub fn shared(verbose: bool) -> SharedSink {
        Arc::new(Self {
            verbose,
            tracing: TracingSink::new(),
        })
    }
}

fn icon(event: &SyncEvent) -> &'static str {
    match event {
        SyncEvent::ResolutionStarted { .. } => "🔍",
        SyncEvent::SyncStarted { .. } => "🚀",
        SyncEvent::VersionChecked { updatable: true, .. } => "🔄",
        SyncEvent::VersionChecked { .. } | SyncEvent::TaskSucceeded { .. } => "✅",
        SyncEvent::TaskSkipped { .. } => "⏭️ ",
        SyncEvent::ManifestSaved { .. } => "💾",
        SyncEvent::SyncFinished { failed: 0, .. } => "📊",
        SyncEvent::TaskStarted { .. } | SyncEvent::RetryScheduled { .. } => "  ",
        SyncEvent::TaskFailed { .. } | SyncEvent::TaskAborted { .. } => "❌",
        _ => "⚠️ ",
    }
}

impl EventSink for ConsoleSink {
    fn emit(&self, event: &SyncEvent) {
        self.tracing.emit(event);

        if event.severity() == EventSeverity::Debug && !self.verbose {
            return;
        }
        println!("{} {event}", icon(event));
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_icons() {
        let failed = SyncEvent::TaskFailed {
            source: "a:1".to_string(),
            target: "b:1".to_string(),
            attempts: 3,
            error: "boom".to_string(),
        };
        assert_eq!(icon(&failed), "❌");

        let finished = SyncEvent::SyncFinished {
            total: 2,
            succeeded: 1,
            failed: 1,
        };
        assert_eq!(icon(&finished), "⚠️ ");
    }
}
