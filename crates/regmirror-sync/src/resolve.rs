//! Concurrent version resolution and manifest updates.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use regmirror_core::{ManifestStore, ResolutionQuery, SharedSink, SyncEvent};
use regmirror_registry::{RegistryError, Resolution, TagSource, VersionResolver};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::config::ResolveConfig;
use crate::error::Result;

/// Outcome of one resolution query.
pub type ResolutionOutcome = std::result::Result<Resolution, RegistryError>;

/// Resolution results, one slot per query.
#[derive(Debug, Default)]
pub struct Resolutions {
    results: BTreeMap<ResolutionQuery, ResolutionOutcome>,
}

impl Resolutions {
    /// Returns the outcome for `query`.
    ///
    /// `None` means the query was never resolved or its worker died.
    pub fn get(&self, query: &ResolutionQuery) -> Option<&ResolutionOutcome> {
        self.results.get(query)
    }

    /// Returns the first successful resolution for `repository`.
    pub fn for_repository(&self, repository: &str) -> Option<&Resolution> {
        self.results
            .iter()
            .filter(|(query, _)| query.repository == repository)
            .find_map(|(_, outcome)| outcome.as_ref().ok())
    }

    /// Iterates over all outcomes in query order.
    pub fn iter(&self) -> impl Iterator<Item = (&ResolutionQuery, &ResolutionOutcome)> {
        self.results.iter()
    }

    /// Returns the number of resolved queries.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if nothing was resolved.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Resolves batches of queries against a tag source under a worker bound.
#[derive(Clone)]
pub struct ResolutionScheduler {
    source: Arc<dyn TagSource>,
    config: ResolveConfig,
    sink: SharedSink,
}

impl std::fmt::Debug for ResolutionScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionScheduler")
            .field("source", &self.source.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ResolutionScheduler {
    /// Creates a scheduler.
    pub fn new(source: Arc<dyn TagSource>, config: ResolveConfig, sink: SharedSink) -> Self {
        Self {
            source,
            config,
            sink,
        }
    }

    /// Resolves every distinct query.
    ///
    /// Each query is resolved independently; a failing or panicking query
    /// affects only its own slot.
    pub async fn resolve_all(
        &self,
        queries: impl IntoIterator<Item = ResolutionQuery>,
    ) -> Resolutions {
        let queries: BTreeSet<ResolutionQuery> = queries.into_iter().collect();
        if queries.is_empty() {
            return Resolutions::default();
        }

        let workers = self.config.effective_workers();
        self.sink.emit(&SyncEvent::ResolutionStarted {
            queries: queries.len(),
            workers,
        });

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut handles = Vec::with_capacity(queries.len());

        for query in queries {
            let semaphore = Arc::clone(&semaphore);
            let source = Arc::clone(&self.source);
            let job = query.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                resolve_one(source.as_ref(), &job).await
            });
            handles.push((query, handle));
        }

        let (queries, handles): (Vec<_>, Vec<_>) = handles.into_iter().unzip();
        let joined = futures::future::join_all(handles).await;

        let mut results = BTreeMap::new();
        for (query, outcome) in queries.into_iter().zip(joined) {
            match outcome {
                Ok(outcome) => {
                    results.insert(query, outcome);
                }
                Err(e) => error!(query = %query, error = %e, "Resolution worker aborted"),
            }
        }

        debug!(resolved = results.len(), "Resolution finished");
        Resolutions { results }
    }
}

async fn resolve_one(source: &dyn TagSource, query: &ResolutionQuery) -> ResolutionOutcome {
    let tags = source.list_tags(&query.repository).await;
    VersionResolver::new().resolve_query(tags.iter().map(|t| t.name.as_str()), query)
}

/// A version change found by the updater.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionChange {
    /// Image name.
    pub repository: String,

    /// Tag pinned before the update.
    pub from: String,

    /// Newest matching tag.
    pub to: String,
}

/// Counts from one manifest update run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Entries with a newer matching tag.
    pub updated: usize,

    /// Entries already at the newest matching tag.
    pub unchanged: usize,

    /// Entries that could not be checked.
    pub failed: usize,

    /// The changes found, in manifest order.
    pub changes: Vec<VersionChange>,

    /// Whether the manifest file was rewritten.
    pub saved: bool,
}

/// Moves pinned tags in a manifest to the newest matching tag.
#[derive(Debug)]
pub struct ManifestUpdater {
    scheduler: ResolutionScheduler,
    sink: SharedSink,
}

impl ManifestUpdater {
    /// Creates an updater over a resolution scheduler.
    pub fn new(scheduler: ResolutionScheduler, sink: SharedSink) -> Self {
        Self { scheduler, sink }
    }

    /// Loads the manifest at `path` and updates it.
    ///
    /// A missing file is treated as an empty manifest, so nothing is checked
    /// and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing manifest cannot be loaded or saved.
    pub async fn update_path(&self, path: &Path, dry_run: bool) -> Result<UpdateSummary> {
        let mut store = ManifestStore::open_or_default(path)?;
        self.update(&mut store, dry_run).await
    }

    /// Checks every enabled entry and applies the newer tags.
    ///
    /// In dry-run mode changes are only reported. Otherwise the manifest is
    /// saved once, and only when at least one entry changed.
    ///
    /// # Errors
    ///
    /// Returns an error if saving the manifest fails.
    pub async fn update(&self, store: &mut ManifestStore, dry_run: bool) -> Result<UpdateSummary> {
        let mut summary = UpdateSummary::default();

        let queries: Vec<ResolutionQuery> = store
            .manifest()
            .enabled()
            .filter_map(regmirror_core::ImageEntry::resolution_query)
            .collect();
        let resolutions = self.scheduler.resolve_all(queries).await;

        for entry in store.manifest_mut().images.iter_mut().filter(|e| e.enabled) {
            let Some(query) = entry.resolution_query() else {
                self.sink.emit(&SyncEvent::EntrySkipped {
                    source: entry.source.clone(),
                    reason: "no tag_pattern".to_string(),
                });
                summary.failed += 1;
                continue;
            };

            let resolution = match resolutions.get(&query) {
                Some(Ok(resolution)) => resolution,
                Some(Err(e)) => {
                    self.sink.emit(&SyncEvent::EntrySkipped {
                        source: entry.source.clone(),
                        reason: e.to_string(),
                    });
                    summary.failed += 1;
                    continue;
                }
                None => {
                    summary.failed += 1;
                    continue;
                }
            };

            let Some(latest) = resolution.latest() else {
                self.sink.emit(&SyncEvent::NoMatchingTags {
                    repository: query.repository.clone(),
                });
                summary.failed += 1;
                continue;
            };

            let current = entry.pinned_tag();
            let updatable = current != latest;
            self.sink.emit(&SyncEvent::VersionChecked {
                repository: query.repository.clone(),
                current: current.clone(),
                latest: latest.to_string(),
                updatable,
            });

            if !updatable {
                summary.unchanged += 1;
                continue;
            }

            summary.updated += 1;
            summary.changes.push(VersionChange {
                repository: query.repository.clone(),
                from: current,
                to: latest.to_string(),
            });
            if !dry_run {
                entry.set_tag(latest);
            }
        }

        if dry_run {
            info!(updated = summary.updated, "Dry run, manifest not written");
        } else if summary.updated > 0 {
            store.manifest_mut().touch();
            store.save()?;
            summary.saved = true;
            self.sink.emit(&SyncEvent::ManifestSaved {
                path: store.path().display().to_string(),
                updated: summary.updated,
            });
        } else {
            debug!("Manifest unchanged");
        }

        if summary.failed > 0 {
            warn!(failed = summary.failed, "Some entries could not be checked");
        }
        Ok(summary)
    }
}
