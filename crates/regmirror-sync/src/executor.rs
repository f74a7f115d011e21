//! Mirror executor.
//!
//! Mirrors one [`SyncTask`] at a time through a [`RegistryTool`], with
//! retry and backoff, skip-if-unchanged, and a shared outcome tally.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use rand::Rng;
use regmirror_core::{
    target_repository, SharedSink, SkipReason, SyncEvent, SyncRecord, SyncReport, SyncTask,
};
use tracing::{debug, warn};

use crate::config::MirrorConfig;
use crate::error::{Result, SyncError};
use crate::tool::RegistryTool;

/// Success and failure counters plus the success records, kept together so
/// they always agree.
#[derive(Debug, Default)]
struct Tally {
    success: usize,
    fail: usize,
    records: Vec<SyncRecord>,
}

/// Source and target of one task.
#[derive(Debug, Clone)]
struct Endpoints {
    source: String,
    target: String,
    repository: String,
}

/// Mirrors tasks and accumulates their outcomes.
///
/// The executor is shared between workers; every outcome goes through one
/// mutex.
pub struct MirrorExecutor {
    config: MirrorConfig,
    tool: Arc<dyn RegistryTool>,
    sink: SharedSink,
    tally: Mutex<Tally>,
}

impl std::fmt::Debug for MirrorExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MirrorExecutor")
            .field("config", &self.config)
            .field("tool", &self.tool.name())
            .field("sink", &self.sink.name())
            .finish_non_exhaustive()
    }
}

impl MirrorExecutor {
    /// Creates an executor.
    pub fn new(config: MirrorConfig, tool: Arc<dyn RegistryTool>, sink: SharedSink) -> Self {
        Self {
            config,
            tool,
            sink,
            tally: Mutex::new(Tally::default()),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Mirrors one task and records its outcome.
    ///
    /// Returns true on success. Failures are tallied, never returned.
    pub async fn sync_one(&self, task: &SyncTask) -> bool {
        let endpoints = self.endpoints(task);
        self.sink.emit(&SyncEvent::TaskStarted {
            source: endpoints.source.clone(),
            target: endpoints.target.clone(),
        });

        if endpoints.source == endpoints.target {
            self.sink.emit(&SyncEvent::TaskSkipped {
                source: endpoints.source.clone(),
                target: endpoints.target.clone(),
                reason: SkipReason::AlreadyMirrored,
            });
            self.record_success(task, &endpoints, None);
            return true;
        }

        let source_digest = if self.config.skip_unchanged {
            let source_digest = self.tool.digest(&endpoints.source).await;
            if let Some(ref digest) = source_digest {
                let target_digest = self.tool.digest(&endpoints.target).await;
                if target_digest.as_ref() == Some(digest) {
                    self.sink.emit(&SyncEvent::TaskSkipped {
                        source: endpoints.source.clone(),
                        target: endpoints.target.clone(),
                        reason: SkipReason::Unchanged,
                    });
                    self.record_success(task, &endpoints, source_digest);
                    return true;
                }
            }
            source_digest
        } else {
            None
        };

        match self.copy_with_retry(&endpoints).await {
            Ok(attempts) => {
                self.sink.emit(&SyncEvent::TaskSucceeded {
                    source: endpoints.source.clone(),
                    target: endpoints.target.clone(),
                    attempts,
                });
                self.record_success(task, &endpoints, source_digest);
                true
            }
            Err((attempts, e)) => {
                self.sink.emit(&SyncEvent::TaskFailed {
                    source: endpoints.source.clone(),
                    target: endpoints.target.clone(),
                    attempts,
                    error: e.to_string(),
                });
                self.tally.lock().fail += 1;
                false
            }
        }
    }

    /// Counts a unit that died before reporting an outcome.
    pub fn record_abort(&self, task: &SyncTask, message: &str) {
        self.sink.emit(&SyncEvent::TaskAborted {
            source: task.source(),
            message: message.to_string(),
        });
        self.tally.lock().fail += 1;
    }

    /// Returns `(success, fail)` so far.
    pub fn counts(&self) -> (usize, usize) {
        let tally = self.tally.lock();
        (tally.success, tally.fail)
    }

    /// Snapshots the outcomes into a report.
    pub fn report(&self) -> SyncReport {
        let tally = self.tally.lock();
        SyncReport::new(
            &self.config.registry,
            &self.config.owner,
            tally.success,
            tally.fail,
            tally.records.clone(),
        )
    }

    fn endpoints(&self, task: &SyncTask) -> Endpoints {
        let source = task.source();
        let repository = target_repository(&task.image_name);

        // Images already under registry/owner/ are their own target.
        if task.image_name.starts_with(&self.config.destination_prefix()) {
            return Endpoints {
                target: source.clone(),
                source,
                repository,
            };
        }

        Endpoints {
            target: format!(
                "{}{repository}:{}",
                self.config.destination_prefix(),
                task.version
            ),
            source,
            repository,
        }
    }

    /// Runs the copy until it succeeds or the attempt budget runs out.
    /// Every failure kind draws on the same budget. Returns the attempts used.
    async fn copy_with_retry(
        &self,
        endpoints: &Endpoints,
    ) -> std::result::Result<u32, (u32, SyncError)> {
        let max_attempts = self.config.max_retries.max(1);
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = self.backoff(attempt);
                self.sink.emit(&SyncEvent::RetryScheduled {
                    source: endpoints.source.clone(),
                    attempt: attempt + 1,
                    delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                });
                tokio::time::sleep(delay).await;
            }
            attempt += 1;

            let err = match self.copy_once(endpoints).await {
                Ok(()) => return Ok(attempt),
                Err(e) => e,
            };

            let rate_limited = err.is_rate_limited();
            if rate_limited {
                warn!(source = %endpoints.source, attempt, "Registry rate limit hit");
            }
            self.sink.emit(&SyncEvent::CopyAttemptFailed {
                source: endpoints.source.clone(),
                attempt,
                max_attempts,
                rate_limited,
                message: err.to_string(),
            });

            if attempt >= max_attempts {
                return Err((attempt, err));
            }
        }
    }

    async fn copy_once(&self, endpoints: &Endpoints) -> Result<()> {
        debug!(source = %endpoints.source, target = %endpoints.target, "Copying");
        match tokio::time::timeout(
            self.config.copy_timeout,
            self.tool.copy(&endpoints.source, &endpoints.target),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(SyncError::CopyTimeout {
                source_ref: endpoints.source.clone(),
                timeout_secs: self.config.copy_timeout.as_secs(),
            }),
        }
    }

    /// Delay before the given 0-based attempt: `retry_delay * 2^(attempt-1)`
    /// plus up to half of that again.
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let base = self.config.retry_delay.saturating_mul(1_u32 << exponent);
        let half_ms = u64::try_from(base.as_millis() / 2).unwrap_or(u64::MAX);
        let jitter = if half_ms == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..half_ms)
        };
        base + Duration::from_millis(jitter)
    }

    fn record_success(&self, task: &SyncTask, endpoints: &Endpoints, digest: Option<String>) {
        let record = SyncRecord {
            name: task.image_name.clone(),
            source: endpoints.source.clone(),
            target: endpoints.target.clone(),
            version: task.version.clone(),
            description: task.description.clone(),
            repository: endpoints.repository.clone(),
            synced_at: Utc::now().to_rfc3339(),
            digest,
            created_at: None,
        };

        let mut tally = self.tally.lock();
        tally.success += 1;
        tally.records.push(record);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted registry tool for executor and scheduler tests.

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::error::{Result, SyncError};
    use crate::tool::RegistryTool;

    /// Copy behaviour of the mock.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum CopyMode {
        Succeed,
        Fail,
        RateLimited,
        Hang,
        SpawnFail,
    }

    #[derive(Debug)]
    pub struct MockTool {
        pub mode: CopyMode,
        pub digests: HashMap<String, String>,
        pub copies: AtomicUsize,
        pub copied: Mutex<Vec<(String, String)>>,
    }

    impl MockTool {
        pub fn new(mode: CopyMode) -> Self {
            Self {
                mode,
                digests: HashMap::new(),
                copies: AtomicUsize::new(0),
                copied: Mutex::new(Vec::new()),
            }
        }

        pub fn with_digest(mut self, reference: &str, digest: &str) -> Self {
            self.digests.insert(reference.to_string(), digest.to_string());
            self
        }

        pub fn copies(&self) -> usize {
            self.copies.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RegistryTool for MockTool {
        async fn copy(&self, source: &str, target: &str) -> Result<()> {
            self.copies.fetch_add(1, Ordering::SeqCst);
            self.copied
                .lock()
                .push((source.to_string(), target.to_string()));

            let stderr = match self.mode {
                CopyMode::Succeed => return Ok(()),
                CopyMode::Hang => {
                    tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                    return Ok(());
                }
                CopyMode::SpawnFail => {
                    return Err(SyncError::ToolSpawn {
                        program: "regctl".into(),
                        source: std::io::Error::other("text file busy"),
                    });
                }
                CopyMode::Fail => "manifest unknown",
                CopyMode::RateLimited => "toomanyrequests: pull rate limit",
            };
            Err(SyncError::CopyFailed {
                source_ref: source.to_string(),
                target: target.to_string(),
                exit_code: Some(1),
                stderr: stderr.to_string(),
            })
        }

        async fn digest(&self, reference: &str) -> Option<String> {
            self.digests.get(reference).cloned()
        }

        fn name(&self) -> &'static str {
            "mock"
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use regmirror_core::MemorySink;

    use super::testing::{CopyMode, MockTool};
    use super::*;

    fn config() -> MirrorConfig {
        MirrorConfig::builder()
            .registry("ghcr.io")
            .owner("acme")
            .retry_delay(Duration::from_secs(2))
            .build()
    }

    fn executor(
        tool: MockTool,
        config: MirrorConfig,
    ) -> (MirrorExecutor, Arc<MockTool>, Arc<MemorySink>) {
        let tool = Arc::new(tool);
        let sink = Arc::new(MemorySink::new());
        let exec = MirrorExecutor::new(config, tool.clone(), sink.clone());
        (exec, tool, sink)
    }

    fn task() -> SyncTask {
        SyncTask::new("library/nginx", "1.25.3", "Web server")
    }

    #[tokio::test]
    async fn test_successful_copy_records_target() {
        let (exec, tool, _) = executor(MockTool::new(CopyMode::Succeed), config());

        assert!(exec.sync_one(&task()).await);

        let copied = tool.copied.lock().clone();
        assert_eq!(
            copied,
            [(
                "library/nginx:1.25.3".to_string(),
                "ghcr.io/acme/library__nginx:1.25.3".to_string()
            )]
        );

        let report = exec.report();
        assert_eq!((report.success_count, report.fail_count), (1, 0));
        let record = &report.images[0];
        assert_eq!(record.repository, "library__nginx");
        assert_eq!(record.description, "Web server");
        assert_eq!(record.digest, None);
    }

    #[tokio::test]
    async fn test_equal_digests_skip_copy() {
        let tool = MockTool::new(CopyMode::Succeed)
            .with_digest("library/nginx:1.25.3", "sha256:aaa")
            .with_digest("ghcr.io/acme/library__nginx:1.25.3", "sha256:aaa");
        let (exec, tool, sink) = executor(tool, config());

        assert!(exec.sync_one(&task()).await);

        assert_eq!(tool.copies(), 0);
        assert_eq!(exec.report().images[0].digest.as_deref(), Some("sha256:aaa"));
        assert_eq!(
            sink.filter(|e| matches!(
                e,
                SyncEvent::TaskSkipped { reason: SkipReason::Unchanged, .. }
            ))
            .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_differing_or_missing_digest_copies() {
        let tool = MockTool::new(CopyMode::Succeed)
            .with_digest("library/nginx:1.25.3", "sha256:new")
            .with_digest("ghcr.io/acme/library__nginx:1.25.3", "sha256:old");
        let (exec, tool, _) = executor(tool, config());
        assert!(exec.sync_one(&task()).await);
        assert_eq!(tool.copies(), 1);
        assert_eq!(exec.report().images[0].digest.as_deref(), Some("sha256:new"));

        let tool =
            MockTool::new(CopyMode::Succeed).with_digest("library/nginx:1.25.3", "sha256:new");
        let (exec, tool, _) = executor(tool, config());
        assert!(exec.sync_one(&task()).await);
        assert_eq!(tool.copies(), 1);
    }

    #[tokio::test]
    async fn test_skip_unchanged_disabled_always_copies() {
        let tool = MockTool::new(CopyMode::Succeed)
            .with_digest("library/nginx:1.25.3", "sha256:aaa")
            .with_digest("ghcr.io/acme/library__nginx:1.25.3", "sha256:aaa");
        let config = MirrorConfig::builder()
            .owner("acme")
            .skip_unchanged(false)
            .build();
        let (exec, tool, _) = executor(tool, config);

        assert!(exec.sync_one(&task()).await);
        assert_eq!(tool.copies(), 1);
    }

    #[tokio::test]
    async fn test_origin_shortcut() {
        let (exec, tool, _) = executor(MockTool::new(CopyMode::Fail), config());
        let task = SyncTask::new("ghcr.io/acme/tools", "1.0", "");

        assert!(exec.sync_one(&task).await);

        assert_eq!(tool.copies(), 0);
        let record = &exec.report().images[0];
        assert_eq!(record.source, "ghcr.io/acme/tools:1.0");
        assert_eq!(record.target, record.source);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_budget_and_increasing_delays() {
        let (exec, tool, sink) = executor(MockTool::new(CopyMode::Fail), config());

        assert!(!exec.sync_one(&task()).await);

        assert_eq!(tool.copies(), 3);
        let delays: Vec<u64> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                SyncEvent::RetryScheduled { delay_ms, .. } => Some(delay_ms),
                _ => None,
            })
            .collect();
        assert_eq!(delays.len(), 2);
        assert!(delays[0] >= 2_000 && delays[0] < 3_000);
        assert!(delays[1] >= 4_000 && delays[1] < 6_000);
        assert!(delays[0] < delays[1]);

        let report = exec.report();
        assert_eq!((report.success_count, report.fail_count), (0, 1));
        assert!(report.images.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_uses_same_budget() {
        let (exec, tool, sink) = executor(MockTool::new(CopyMode::RateLimited), config());

        assert!(!exec.sync_one(&task()).await);

        assert_eq!(tool.copies(), 3);
        let limited =
            sink.filter(|e| matches!(e, SyncEvent::CopyAttemptFailed { rate_limited: true, .. }));
        assert_eq!(limited.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_failure_uses_same_budget() {
        let config = MirrorConfig::builder().owner("acme").max_retries(3).build();
        let (exec, tool, sink) = executor(MockTool::new(CopyMode::SpawnFail), config);

        assert!(!exec.sync_one(&task()).await);

        assert_eq!(tool.copies(), 3);
        let retries = sink.filter(|e| matches!(e, SyncEvent::RetryScheduled { .. }));
        assert_eq!(retries.len(), 2);
        assert_eq!(exec.counts(), (0, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_attempt() {
        let config = MirrorConfig::builder()
            .owner("acme")
            .max_retries(2)
            .copy_timeout(Duration::from_secs(5))
            .build();
        let (exec, tool, sink) = executor(MockTool::new(CopyMode::Hang), config);

        assert!(!exec.sync_one(&task()).await);

        assert_eq!(tool.copies(), 2);
        let failed = sink.filter(|e| matches!(e, SyncEvent::TaskFailed { .. }));
        assert!(matches!(
            &failed[0],
            SyncEvent::TaskFailed { attempts: 2, error, .. } if error.contains("timed out")
        ));
    }

    #[test]
    fn test_backoff_zero_delay() {
        let config = MirrorConfig::builder()
            .owner("acme")
            .retry_delay(Duration::ZERO)
            .build();
        let (exec, _, _) = executor(MockTool::new(CopyMode::Succeed), config);
        assert_eq!(exec.backoff(1), Duration::ZERO);
        assert_eq!(exec.backoff(5), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_abort_counts_failure() {
        let (exec, _, sink) = executor(MockTool::new(CopyMode::Succeed), config());
        exec.record_abort(&task(), "boom");

        assert_eq!(exec.counts(), (0, 1));
        assert_eq!(sink.filter(|e| matches!(e, SyncEvent::TaskAborted { .. })).len(), 1);
    }
}
