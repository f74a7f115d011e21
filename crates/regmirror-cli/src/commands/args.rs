//! Argument groups shared by several commands.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use regmirror_core::{ManifestStore, SharedSink};
use regmirror_registry::{DockerHubTagSource, TransportConfig};
use regmirror_sync::{Mirror, MirrorConfig, Regctl, ResolutionScheduler, ResolveConfig};

/// Destination registry and report location.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Destination namespace owner
    #[arg(long, env = "REGMIRROR_OWNER")]
    pub owner: String,

    /// Destination registry
    #[arg(long, env = "REGMIRROR_REGISTRY", default_value = "ghcr.io")]
    pub registry: String,

    /// Report output path
    #[arg(short, long, env = "REGMIRROR_OUTPUT", default_value = "images.json")]
    pub output: PathBuf,
}

/// Copy behaviour.
#[derive(Args, Debug, Clone)]
pub struct CopyArgs {
    /// Copy attempts per image
    #[arg(long, env = "REGMIRROR_MAX_RETRIES", default_value = "3")]
    pub max_retries: u32,

    /// Base delay between attempts, in seconds; doubles per attempt
    #[arg(long, env = "REGMIRROR_RETRY_DELAY", default_value = "2.0")]
    pub retry_delay: f64,

    /// Timeout of one copy, in seconds
    #[arg(long, env = "REGMIRROR_COPY_TIMEOUT", default_value = "300")]
    pub copy_timeout: u64,

    /// Copy even when the destination digest already matches
    #[arg(long)]
    pub no_skip_unchanged: bool,

    /// Path of the regctl binary
    #[arg(long, env = "REGMIRROR_REGCTL", default_value = "regctl")]
    pub regctl: PathBuf,
}

impl CopyArgs {
    /// Builds the mirror configuration for `workers` copy workers.
    pub fn mirror_config(
        &self,
        target: &TargetArgs,
        workers: usize,
        concurrency: bool,
    ) -> Result<MirrorConfig> {
        let retry_delay = Duration::try_from_secs_f64(self.retry_delay)
            .with_context(|| format!("Invalid --retry-delay {}", self.retry_delay))?;

        Ok(MirrorConfig::builder()
            .registry(&target.registry)
            .owner(&target.owner)
            .max_retries(self.max_retries)
            .retry_delay(retry_delay)
            .copy_timeout(Duration::from_secs(self.copy_timeout))
            .skip_unchanged(!self.no_skip_unchanged)
            .workers(workers)
            .concurrency(concurrency)
            .build())
    }
}

/// Loads the manifest, treating a missing file as fatal.
pub fn open_manifest(path: &Path) -> Result<ManifestStore> {
    ManifestStore::open(path).with_context(|| format!("Failed to load {}", path.display()))
}

fn docker_hub() -> Result<DockerHubTagSource> {
    DockerHubTagSource::new(TransportConfig::default())
        .context("Failed to create Docker Hub client")
}

/// Creates a resolution scheduler over Docker Hub.
pub fn resolution_scheduler(
    config: ResolveConfig,
    sink: SharedSink,
) -> Result<ResolutionScheduler> {
    Ok(ResolutionScheduler::new(Arc::new(docker_hub()?), config, sink))
}

/// Assembles the pipeline over Docker Hub and regctl.
pub fn build_mirror(
    mirror_config: MirrorConfig,
    resolve_config: ResolveConfig,
    regctl: &Path,
    sink: SharedSink,
) -> Result<Mirror> {
    Mirror::new(
        Arc::new(docker_hub()?),
        Arc::new(Regctl::new(regctl)),
        mirror_config,
        resolve_config,
        sink,
    )
    .context("Invalid mirror configuration")
}
