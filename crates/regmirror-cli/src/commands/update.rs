//! Update command implementation.
//!
//! Checks every enabled manifest entry against Docker Hub and moves its
//! pinned tag to the newest matching version.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use regmirror_core::SharedSink;
use regmirror_sync::{ManifestUpdater, ResolveConfig, UpdateSummary};
use tracing::info;

use super::args::{open_manifest, resolution_scheduler};

/// Arguments for the update command.
#[derive(Args, Debug, Clone)]
pub struct UpdateArgs {
    /// Report changes without writing the manifest
    #[arg(long)]
    pub dry_run: bool,

    /// Concurrent version lookups
    #[arg(long, env = "REGMIRROR_MAX_WORKERS", default_value = "5")]
    pub max_workers: usize,

    /// Check images one at a time
    #[arg(long)]
    pub no_concurrency: bool,
}

impl UpdateArgs {
    /// Resolution settings.
    pub fn resolve_config(&self) -> ResolveConfig {
        ResolveConfig::default()
            .with_workers(self.max_workers)
            .with_concurrency(!self.no_concurrency)
    }
}

/// Runs the update command.
pub async fn execute(manifest: &Path, args: &UpdateArgs, sink: SharedSink) -> Result<bool> {
    println!("📄 Updating {}", manifest.display());
    if args.dry_run {
        println!("⚠️  DRY RUN - the manifest will not be written");
    }

    let mut store = open_manifest(manifest)?;

    let scheduler = resolution_scheduler(args.resolve_config(), std::sync::Arc::clone(&sink))?;
    let updater = ManifestUpdater::new(scheduler, sink);

    let summary = updater
        .update(&mut store, args.dry_run)
        .await
        .context("Failed to update manifest")?;

    print_summary(&summary, args.dry_run);
    Ok(true)
}

pub(crate) fn print_summary(summary: &UpdateSummary, dry_run: bool) {
    info!(
        updated = summary.updated,
        unchanged = summary.unchanged,
        failed = summary.failed,
        "Update finished"
    );

    println!();
    println!("📊 Summary:");
    println!("   ✅ Up to date:  {}", summary.unchanged);
    println!("   🔄 Updatable:   {}", summary.updated);
    println!("   ❌ Not checked: {}", summary.failed);

    for change in &summary.changes {
        println!("      {}: {} -> {}", change.repository, change.from, change.to);
    }

    if summary.updated == 0 {
        println!("\n✓ All images are up to date");
    } else if dry_run {
        println!("\nℹ️  Dry run: {} image(s) could be updated", summary.updated);
    } else {
        println!("\n✓ Updated {} image(s)", summary.updated);
    }
}
