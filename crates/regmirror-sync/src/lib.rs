//! Regmirror Sync
//!
//! Resolution and mirroring pipeline for regmirror.
//!
//! # Overview
//!
//! - **Resolution**: resolves tag patterns for many images concurrently and
//!   moves pinned manifest tags forward
//! - **Mirroring**: copies each (image, tag) pair to the destination
//!   registry with retry, backoff and skip-if-unchanged
//! - **Scheduling**: bounded worker pools with per-unit panic isolation
//! - **Inventory**: reports what the destination registry already holds
//!
//! # Architecture
//!
//! ```text
//!  manifest ──► ResolutionScheduler ──► ManifestUpdater ──► manifest
//!                      │
//!                      ▼
//!               MirrorScheduler ──► MirrorExecutor ──► RegistryTool (regctl)
//!                      │
//!                      ▼
//!                 SyncReport (images.json)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use regmirror_sync::{Mirror, MirrorConfig, Regctl, ResolveConfig};
//!
//! let mirror = Mirror::new(
//!     Arc::new(DockerHubTagSource::new(TransportConfig::default())?),
//!     Arc::new(Regctl::default()),
//!     MirrorConfig::builder().owner("acme").build(),
//!     ResolveConfig::default(),
//!     TracingSink::shared(),
//! )?;
//!
//! let mut store = ManifestStore::open("images-manifest.yml")?;
//! mirror.update(&mut store, false).await?;
//! let report = mirror.sync(store.manifest()).await;
//! report.write_to_file(Path::new("images.json"))?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::significant_drop_tightening)]

pub mod config;
pub mod error;
pub mod executor;
pub mod inventory;
pub mod resolve;
pub mod scheduler;
pub mod tool;

use std::path::Path;
use std::sync::Arc;

use regmirror_core::{Manifest, ManifestStore, SharedSink, SyncReport};
use regmirror_registry::TagSource;

pub use config::{MirrorConfig, MirrorConfigBuilder, ResolveConfig};
pub use error::{Result, SyncError};
pub use executor::MirrorExecutor;
pub use inventory::Inventory;
pub use resolve::{
    ManifestUpdater, ResolutionOutcome, ResolutionScheduler, Resolutions, UpdateSummary,
    VersionChange,
};
pub use scheduler::MirrorScheduler;
pub use tool::{Regctl, RegistryTool};

/// The resolution and mirroring pipeline.
///
/// One `Mirror` performs one sync run: the executor's tally is not reset
/// between calls to [`Mirror::sync`].
#[derive(Debug)]
pub struct Mirror {
    updater: ManifestUpdater,
    scheduler: MirrorScheduler,
}

impl Mirror {
    /// Creates a pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if the mirror configuration is
    /// invalid.
    pub fn new(
        source: Arc<dyn TagSource>,
        tool: Arc<dyn RegistryTool>,
        mirror_config: MirrorConfig,
        resolve_config: ResolveConfig,
        sink: SharedSink,
    ) -> Result<Self> {
        mirror_config.validate()?;

        let resolver = ResolutionScheduler::new(source, resolve_config, Arc::clone(&sink));
        let executor = MirrorExecutor::new(mirror_config, tool, Arc::clone(&sink));

        Ok(Self {
            updater: ManifestUpdater::new(resolver.clone(), Arc::clone(&sink)),
            scheduler: MirrorScheduler::new(executor, sink).with_resolution(resolver),
        })
    }

    /// Moves pinned tags to the newest matching tags.
    pub async fn update(&self, store: &mut ManifestStore, dry_run: bool) -> Result<UpdateSummary> {
        self.updater.update(store, dry_run).await
    }

    /// Like [`Mirror::update`], loading the manifest from `path`; a missing
    /// file is an empty manifest.
    pub async fn update_path(&self, path: &Path, dry_run: bool) -> Result<UpdateSummary> {
        self.updater.update_path(path, dry_run).await
    }

    /// Mirrors every enabled entry of `manifest`.
    pub async fn sync(&self, manifest: &Manifest) -> SyncReport {
        let tasks = self.scheduler.plan(manifest).await;
        tracing::info!(tasks = tasks.len(), "Mirror plan ready");
        self.scheduler.run(tasks).await
    }
}
