//! Configuration types for resolution and mirroring.

use std::ops::Range;
use std::time::Duration;

use crate::error::{Result, SyncError};

/// Configuration for the mirror executor and scheduler.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Destination registry host.
    pub registry: String,

    /// Destination namespace owner.
    pub owner: String,

    /// Copy attempts per task.
    pub max_retries: u32,

    /// Base delay before the second attempt; doubles per attempt.
    pub retry_delay: Duration,

    /// Upper bound on one copy invocation.
    pub copy_timeout: Duration,

    /// Skip the copy when source and target digests match.
    pub skip_unchanged: bool,

    /// Concurrent copy workers.
    pub workers: usize,

    /// Run tasks concurrently; `false` runs them one at a time.
    pub concurrency: bool,

    /// Random delay before each submission after the first.
    pub stagger: Option<Range<Duration>>,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            registry: "ghcr.io".to_string(),
            owner: String::new(),
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
            copy_timeout: Duration::from_secs(300),
            skip_unchanged: true,
            workers: 3,
            concurrency: true,
            stagger: Some(Duration::from_millis(500)..Duration::from_millis(1500)),
        }
    }
}

impl MirrorConfig {
    /// Creates a configuration builder.
    pub fn builder() -> MirrorConfigBuilder {
        MirrorConfigBuilder::default()
    }

    /// Returns the number of workers actually used.
    pub fn effective_workers(&self) -> usize {
        if self.concurrency {
            self.workers.max(1)
        } else {
            1
        }
    }

    /// Checks the configuration before any work is scheduled.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] for an empty registry or owner,
    /// a zero attempt budget, or zero workers.
    pub fn validate(&self) -> Result<()> {
        let reason = if self.registry.trim().is_empty() {
            "registry must not be empty"
        } else if self.owner.trim().is_empty() {
            "owner must not be empty"
        } else if self.max_retries == 0 {
            "max_retries must be at least 1"
        } else if self.workers == 0 {
            "workers must be at least 1"
        } else {
            return Ok(());
        };
        Err(SyncError::InvalidConfig {
            reason: reason.to_string(),
        })
    }

    /// Returns `registry/owner/`, the prefix of every mirrored reference.
    pub fn destination_prefix(&self) -> String {
        format!("{}/{}/", self.registry, self.owner)
    }
}

/// Builder for `MirrorConfig`.
#[derive(Debug, Default)]
pub struct MirrorConfigBuilder {
    registry: Option<String>,
    owner: Option<String>,
    max_retries: Option<u32>,
    retry_delay: Option<Duration>,
    copy_timeout: Option<Duration>,
    skip_unchanged: Option<bool>,
    workers: Option<usize>,
    concurrency: Option<bool>,
    stagger: Option<Option<Range<Duration>>>,
}

impl MirrorConfigBuilder {
    /// Sets the destination registry host.
    pub fn registry(mut self, registry: impl Into<String>) -> Self {
        self.registry = Some(registry.into());
        self
    }

    /// Sets the destination owner.
    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Sets the copy attempt budget.
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    /// Sets the base retry delay.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = Some(delay);
        self
    }

    /// Sets the per-copy timeout.
    pub fn copy_timeout(mut self, timeout: Duration) -> Self {
        self.copy_timeout = Some(timeout);
        self
    }

    /// Enables or disables skip-if-unchanged.
    pub fn skip_unchanged(mut self, enabled: bool) -> Self {
        self.skip_unchanged = Some(enabled);
        self
    }

    /// Sets the worker count.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }

    /// Enables or disables concurrent execution.
    pub fn concurrency(mut self, enabled: bool) -> Self {
        self.concurrency = Some(enabled);
        self
    }

    /// Sets the submission stagger range, or disables it with `None`.
    pub fn stagger(mut self, stagger: Option<Range<Duration>>) -> Self {
        self.stagger = Some(stagger);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> MirrorConfig {
        let defaults = MirrorConfig::default();
        MirrorConfig {
            registry: self.registry.unwrap_or(defaults.registry),
            owner: self.owner.unwrap_or(defaults.owner),
            max_retries: self.max_retries.unwrap_or(defaults.max_retries),
            retry_delay: self.retry_delay.unwrap_or(defaults.retry_delay),
            copy_timeout: self.copy_timeout.unwrap_or(defaults.copy_timeout),
            skip_unchanged: self.skip_unchanged.unwrap_or(defaults.skip_unchanged),
            workers: self.workers.unwrap_or(defaults.workers),
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            stagger: self.stagger.unwrap_or(defaults.stagger),
        }
    }
}

/// Configuration for concurrent version resolution.
#[derive(Debug, Clone)]
pub struct ResolveConfig {
    /// Concurrent lookups.
    pub workers: usize,

    /// Resolve concurrently; `false` resolves one query at a time.
    pub concurrency: bool,
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            workers: 5,
            concurrency: true,
        }
    }
}

impl ResolveConfig {
    /// Sets the worker count.
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Enables or disables concurrent resolution.
    pub const fn with_concurrency(mut self, enabled: bool) -> Self {
        self.concurrency = enabled;
        self
    }

    /// Returns the number of workers actually used.
    pub fn effective_workers(&self) -> usize {
        if self.concurrency {
            self.workers.max(1)
        } else {
            1
        }
    }
}
