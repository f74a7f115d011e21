//! Run command implementation: update, then sync.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use regmirror_core::SharedSink;
use regmirror_sync::{ManifestUpdater, ResolveConfig};
use tracing::warn;

use super::args::{open_manifest, resolution_scheduler, CopyArgs, TargetArgs};
use super::sync::{mirror_manifest, SyncArgs};
use super::update::print_summary;

/// Arguments for the run command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub copy: CopyArgs,

    /// Report version changes without writing the manifest
    #[arg(long)]
    pub dry_run: bool,

    /// Sync even if the update step fails
    #[arg(long)]
    pub continue_on_error: bool,

    /// Concurrent version lookups
    #[arg(long, env = "REGMIRROR_MAX_WORKERS", default_value = "5")]
    pub max_workers: usize,

    /// Concurrent copies
    #[arg(long, env = "REGMIRROR_MAX_WORKERS_SYNC", default_value = "3")]
    pub max_workers_sync: usize,

    /// Process images one at a time
    #[arg(long)]
    pub no_concurrency: bool,
}

impl RunArgs {
    fn resolve_config(&self) -> ResolveConfig {
        ResolveConfig::default()
            .with_workers(self.max_workers)
            .with_concurrency(!self.no_concurrency)
    }

    fn sync_args(&self) -> SyncArgs {
        SyncArgs {
            target: self.target.clone(),
            copy: self.copy.clone(),
            max_workers: self.max_workers_sync,
            no_concurrency: self.no_concurrency,
        }
    }
}

/// Runs the run command.
pub async fn execute(manifest: &Path, args: &RunArgs, sink: SharedSink) -> Result<bool> {
    let mut store = open_manifest(manifest)?;

    println!("📄 Step 1/2: updating {}", manifest.display());
    let scheduler = resolution_scheduler(args.resolve_config(), Arc::clone(&sink))?;
    let updater = ManifestUpdater::new(scheduler, Arc::clone(&sink));

    match updater.update(&mut store, args.dry_run).await {
        Ok(summary) => print_summary(&summary, args.dry_run),
        Err(e) if args.continue_on_error => {
            warn!(error = %e, "Update failed, continuing with sync");
            println!("⚠️  Update failed: {e}");
        }
        Err(e) => return Err(e).context("Failed to update manifest"),
    }

    println!("\n🚀 Step 2/2: syncing");
    mirror_manifest(store.manifest(), &args.sync_args(), args.resolve_config(), sink).await
}
