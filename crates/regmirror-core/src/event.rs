//! Structured pipeline events.
//!
//! Every observable step of resolution and mirroring is described by a
//! [`SyncEvent`]. Events are handed to an [`EventSink`](crate::EventSink);
//! the core never prints anything itself.

use std::fmt;

use serde::Serialize;

/// Severity of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EventSeverity {
    /// Diagnostic detail.
    Debug,

    /// Normal progress.
    #[default]
    Info,

    /// Soft failure or degraded outcome.
    Warning,

    /// Task or run failure.
    Error,
}

/// Why a task succeeded without copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The source already lives under the destination namespace.
    AlreadyMirrored,

    /// Source and target digests are identical.
    Unchanged,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyMirrored => write!(f, "source already in destination namespace"),
            Self::Unchanged => write!(f, "target digest matches source"),
        }
    }
}

/// An event emitted by the resolution or mirroring pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    /// Version resolution is starting for a batch of queries.
    ResolutionStarted {
        /// Number of queries.
        queries: usize,
        /// Worker count (1 = serial).
        workers: usize,
    },

    /// An entry was checked against its resolved winner.
    VersionChecked {
        /// Repository name.
        repository: String,
        /// Currently pinned tag.
        current: String,
        /// Resolved winner.
        latest: String,
        /// Whether the winner differs from the pinned tag.
        updatable: bool,
    },

    /// No tag survived filtering for a repository.
    NoMatchingTags {
        /// Repository name.
        repository: String,
    },

    /// An enabled entry could not be checked.
    EntrySkipped {
        /// Source reference of the entry.
        source: String,
        /// Why it was skipped.
        reason: String,
    },

    /// The manifest file was written.
    ManifestSaved {
        /// Manifest path.
        path: String,
        /// Number of entries rewritten.
        updated: usize,
    },

    /// Mirroring is starting.
    SyncStarted {
        /// Number of tasks.
        tasks: usize,
        /// Worker count (1 = serial).
        workers: usize,
    },

    /// A task started processing.
    TaskStarted {
        /// Source reference.
        source: String,
        /// Target reference.
        target: String,
    },

    /// A task succeeded without copying.
    TaskSkipped {
        /// Source reference.
        source: String,
        /// Target reference.
        target: String,
        /// Why no copy was needed.
        reason: SkipReason,
    },

    /// One copy attempt failed.
    CopyAttemptFailed {
        /// Source reference.
        source: String,
        /// 1-based attempt number.
        attempt: u32,
        /// Attempt budget.
        max_attempts: u32,
        /// Whether the failure looked like registry rate limiting.
        rate_limited: bool,
        /// Error text.
        message: String,
    },

    /// A retry was scheduled after a failed attempt.
    RetryScheduled {
        /// Source reference.
        source: String,
        /// 1-based number of the attempt about to run.
        attempt: u32,
        /// Backoff delay in milliseconds.
        delay_ms: u64,
    },

    /// A task finished successfully.
    TaskSucceeded {
        /// Source reference.
        source: String,
        /// Target reference.
        target: String,
        /// Attempts used.
        attempts: u32,
    },

    /// A task exhausted its retries.
    TaskFailed {
        /// Source reference.
        source: String,
        /// Target reference.
        target: String,
        /// Attempts used.
        attempts: u32,
        /// Last error.
        error: String,
    },

    /// A task aborted unexpectedly inside its worker.
    TaskAborted {
        /// Source reference.
        source: String,
        /// Abort message.
        message: String,
    },

    /// Mirroring finished.
    SyncFinished {
        /// Tasks attempted.
        total: usize,
        /// Successful tasks.
        succeeded: usize,
        /// Failed tasks.
        failed: usize,
    },
}

impl SyncEvent {
    /// Returns the event severity.
    #[must_use]
    pub const fn severity(&self) -> EventSeverity {
        match self {
            Self::TaskStarted { .. } | Self::RetryScheduled { .. } => EventSeverity::Debug,
            Self::NoMatchingTags { .. }
            | Self::EntrySkipped { .. }
            | Self::CopyAttemptFailed { .. } => EventSeverity::Warning,
            Self::TaskFailed { .. } | Self::TaskAborted { .. } => EventSeverity::Error,
            Self::SyncFinished { failed, .. } if *failed > 0 => EventSeverity::Warning,
            _ => EventSeverity::Info,
        }
    }
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResolutionStarted { queries, workers } => {
                write!(f, "checking {queries} image(s) with {workers} worker(s)")
            }
            Self::VersionChecked {
                repository,
                current,
                latest,
                updatable,
            } => {
                if *updatable {
                    write!(f, "{repository}: {current} -> {latest}")
                } else {
                    write!(f, "{repository}: {current} is up to date")
                }
            }
            Self::NoMatchingTags { repository } => {
                write!(f, "{repository}: no tag matches the configured patterns")
            }
            Self::EntrySkipped { source, reason } => write!(f, "{source}: skipped ({reason})"),
            Self::ManifestSaved { path, updated } => {
                write!(f, "manifest saved to {path} ({updated} update(s))")
            }
            Self::SyncStarted { tasks, workers } => {
                write!(f, "mirroring {tasks} image(s) with {workers} worker(s)")
            }
            Self::TaskStarted { source, target } => write!(f, "{source} -> {target}"),
            Self::TaskSkipped {
                source, reason, ..
            } => write!(f, "{source}: nothing to copy ({reason})"),
            Self::CopyAttemptFailed {
                source,
                attempt,
                max_attempts,
                rate_limited,
                message,
            } => {
                let kind = if *rate_limited { "rate limited" } else { "failed" };
                write!(f, "{source}: attempt {attempt}/{max_attempts} {kind}: {message}")
            }
            Self::RetryScheduled {
                source,
                attempt,
                delay_ms,
            } => write!(f, "{source}: retrying (attempt {attempt}) in {delay_ms} ms"),
            Self::TaskSucceeded {
                source,
                target,
                attempts,
            } => write!(f, "{source} -> {target} mirrored after {attempts} attempt(s)"),
            Self::TaskFailed {
                source,
                attempts,
                error,
                ..
            } => write!(f, "{source}: failed after {attempts} attempt(s): {error}"),
            Self::TaskAborted { source, message } => write!(f, "{source}: aborted: {message}"),
            Self::SyncFinished {
                total,
                succeeded,
                failed,
            } => write!(f, "total {total}, succeeded {succeeded}, failed {failed}"),
        }
    }
}
