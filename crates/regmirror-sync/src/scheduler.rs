//! Mirror scheduler.
//!
//! Expands manifest entries into [`SyncTask`]s and runs them through a
//! shared [`MirrorExecutor`] under a worker bound.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use regmirror_core::{Manifest, SharedSink, SyncEvent, SyncReport, SyncTask};
use tokio::sync::Semaphore;
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

use crate::executor::MirrorExecutor;
use crate::resolve::ResolutionScheduler;

/// Plans and runs mirror work.
#[derive(Debug)]
pub struct MirrorScheduler {
    executor: Arc<MirrorExecutor>,
    resolver: Option<ResolutionScheduler>,
    sink: SharedSink,
}

impl MirrorScheduler {
    /// Creates a scheduler over an executor.
    pub fn new(executor: MirrorExecutor, sink: SharedSink) -> Self {
        Self {
            executor: Arc::new(executor),
            resolver: None,
            sink,
        }
    }

    /// Sets the resolver used to expand `sync_all_matching` entries.
    pub fn with_resolution(mut self, resolver: ResolutionScheduler) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Returns the executor.
    pub fn executor(&self) -> &MirrorExecutor {
        &self.executor
    }

    /// Expands the enabled manifest entries into tasks, in manifest order.
    ///
    /// A `sync_all_matching` entry yields one task per matching tag; any
    /// other entry yields its pinned tag.
    pub async fn plan(&self, manifest: &Manifest) -> Vec<SyncTask> {
        let queries: Vec<_> = manifest
            .enabled()
            .filter(|e| e.sync_all_matching)
            .filter_map(regmirror_core::ImageEntry::resolution_query)
            .collect();

        let resolutions = match (&self.resolver, queries.is_empty()) {
            (Some(resolver), false) => Some(resolver.resolve_all(queries).await),
            (None, false) => {
                warn!("No resolver configured, sync_all_matching entries are skipped");
                None
            }
            _ => None,
        };

        let mut tasks = Vec::new();
        for entry in manifest.enabled() {
            let image_name = entry.image_name();

            if !entry.sync_all_matching {
                tasks.push(SyncTask::new(
                    image_name,
                    entry.pinned_tag(),
                    entry.description.clone(),
                ));
                continue;
            }

            let Some(query) = entry.resolution_query() else {
                self.sink.emit(&SyncEvent::EntrySkipped {
                    source: entry.source.clone(),
                    reason: "sync_all_matching without tag_pattern".to_string(),
                });
                continue;
            };

            match resolutions.as_ref().and_then(|r| r.get(&query)) {
                Some(Ok(resolution)) if !resolution.is_empty() => {
                    debug!(
                        image = %image_name,
                        versions = resolution.len(),
                        "Expanding all matching tags"
                    );
                    tasks.extend(resolution.tags().iter().map(|tag| {
                        SyncTask::new(image_name.clone(), tag.clone(), entry.description.clone())
                    }));
                }
                Some(Ok(_)) => self.sink.emit(&SyncEvent::NoMatchingTags {
                    repository: image_name,
                }),
                Some(Err(e)) => self.sink.emit(&SyncEvent::EntrySkipped {
                    source: entry.source.clone(),
                    reason: e.to_string(),
                }),
                None => self.sink.emit(&SyncEvent::EntrySkipped {
                    source: entry.source.clone(),
                    reason: "versions could not be resolved".to_string(),
                }),
            }
        }

        tasks
    }

    /// Runs every task and returns the aggregate report.
    ///
    /// Each task runs in its own spawned unit; a unit that panics is counted
    /// as a failure. Records appear in completion order.
    pub async fn run(&self, tasks: Vec<SyncTask>) -> SyncReport {
        let run_id = Uuid::now_v7();
        let span = info_span!("mirror_run", %run_id);
        self.run_inner(tasks).instrument(span).await
    }

    async fn run_inner(&self, tasks: Vec<SyncTask>) -> SyncReport {
        let config = self.executor.config();
        let workers = config.effective_workers();
        let concurrent = config.concurrency && workers > 1;

        self.sink.emit(&SyncEvent::SyncStarted {
            tasks: tasks.len(),
            workers,
        });

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut pending = Vec::with_capacity(tasks.len());

        for (index, task) in tasks.into_iter().enumerate() {
            if concurrent && index > 0 {
                if let Some(delay) = self.stagger_delay() {
                    tokio::time::sleep(delay).await;
                }
            }

            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let executor = Arc::clone(&self.executor);
            let job = task.clone();
            let handle = tokio::spawn(async move {
                let _permit = permit;
                executor.sync_one(&job).await
            });

            if concurrent {
                pending.push((task, handle));
            } else if let Err(e) = handle.await {
                self.executor.record_abort(&task, &e.to_string());
            }
        }

        let (tasks, handles): (Vec<_>, Vec<_>) = pending.into_iter().unzip();
        let joined = futures::future::join_all(handles).await;
        for (task, outcome) in tasks.iter().zip(joined) {
            if let Err(e) = outcome {
                self.executor.record_abort(task, &e.to_string());
            }
        }

        let report = self.executor.report();
        self.sink.emit(&SyncEvent::SyncFinished {
            total: report.total_count,
            succeeded: report.success_count,
            failed: report.fail_count,
        });
        report
    }

    fn stagger_delay(&self) -> Option<Duration> {
        let range = self.executor.config().stagger.clone()?;
        if range.is_empty() {
            return None;
        }
        Some(rand::thread_rng().gen_range(range))
    }
}
