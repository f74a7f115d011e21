//! Sync command implementation.
//!
//! Mirrors every enabled manifest entry to the destination registry and
//! writes the outcome report.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use regmirror_core::{Manifest, SharedSink, SyncReport};
use regmirror_sync::{MirrorConfig, ResolveConfig};

use super::args::{build_mirror, open_manifest, CopyArgs, TargetArgs};

/// Arguments for the sync command.
#[derive(Args, Debug, Clone)]
pub struct SyncArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    #[command(flatten)]
    pub copy: CopyArgs,

    /// Concurrent copies
    #[arg(long, env = "REGMIRROR_MAX_WORKERS_SYNC", default_value = "3")]
    pub max_workers: usize,

    /// Copy images one at a time
    #[arg(long)]
    pub no_concurrency: bool,
}

impl SyncArgs {
    /// Mirror settings.
    pub fn mirror_config(&self) -> Result<MirrorConfig> {
        self.copy
            .mirror_config(&self.target, self.max_workers, !self.no_concurrency)
    }
}

/// Runs the sync command.
pub async fn execute(manifest: &Path, args: &SyncArgs, sink: SharedSink) -> Result<bool> {
    let store = open_manifest(manifest)?;
    mirror_manifest(store.manifest(), args, ResolveConfig::default(), sink).await
}

/// Mirrors `manifest`, writes the report, and returns whether every task
/// succeeded.
pub(crate) async fn mirror_manifest(
    manifest: &Manifest,
    args: &SyncArgs,
    resolve_config: ResolveConfig,
    sink: SharedSink,
) -> Result<bool> {
    println!(
        "🚀 Mirroring to {}/{}",
        args.target.registry, args.target.owner
    );

    let mirror = build_mirror(args.mirror_config()?, resolve_config, &args.copy.regctl, sink)?;
    let report = mirror.sync(manifest).await;

    report
        .write_to_file(&args.target.output)
        .with_context(|| format!("Failed to write {}", args.target.output.display()))?;

    print_report(&report, &args.target.output);
    Ok(report.is_success())
}

pub(crate) fn print_report(report: &SyncReport, output: &Path) {
    println!();
    println!("📊 Summary:");
    println!("   Total:   {}", report.total_count);
    println!("   ✅ Success: {}", report.success_count);
    if report.fail_count > 0 {
        println!("   ❌ Failed:  {}", report.fail_count);
    }
    println!("\n📝 Report written to {}", output.display());
}
