//! Inventory command implementation.
//!
//! Rebuilds the report from what the destination registry already holds,
//! without copying anything.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use regmirror_core::SharedSink;
use regmirror_registry::{OciTagSource, RegistryAuth, TransportConfig};
use regmirror_sync::Inventory;

use super::args::{open_manifest, TargetArgs};
use super::sync::print_report;

/// Arguments for the inventory command.
#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Bearer token for the destination registry
    #[arg(long, env = "REGMIRROR_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Username for basic authentication
    #[arg(long)]
    pub username: Option<String>,

    /// Password for basic authentication
    #[arg(long, env = "REGMIRROR_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,
}

/// Runs the inventory command.
pub async fn execute(manifest: &Path, args: &InventoryArgs, sink: SharedSink) -> Result<bool> {
    let store = open_manifest(manifest)?;
    let auth = determine_auth(args)?;

    println!(
        "🔎 Reading {}/{}",
        args.target.registry, args.target.owner
    );

    let source = OciTagSource::new(&args.target.registry, auth, TransportConfig::default())
        .with_context(|| format!("Failed to create client for {}", args.target.registry))?;

    let inventory = Inventory::new(
        Arc::new(source),
        &args.target.registry,
        &args.target.owner,
        sink,
    );
    let report = inventory.build(store.manifest()).await;

    report
        .write_to_file(&args.target.output)
        .with_context(|| format!("Failed to write {}", args.target.output.display()))?;

    print_report(&report, &args.target.output);
    Ok(true)
}

fn determine_auth(args: &InventoryArgs) -> Result<RegistryAuth> {
    if let Some(ref token) = args.token {
        return Ok(RegistryAuth::bearer(token));
    }

    if let (Some(username), Some(password)) = (&args.username, &args.password) {
        return Ok(RegistryAuth::basic(username, password));
    }

    if args.username.is_some() || args.password.is_some() {
        anyhow::bail!("Both --username and --password are required for basic authentication");
    }

    Ok(RegistryAuth::None)
}
