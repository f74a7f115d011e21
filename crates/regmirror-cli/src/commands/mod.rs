//! CLI commands and argument parsing.

pub mod args;
pub mod inventory;
pub mod run;
pub mod sync;
pub mod update;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Regmirror - keep a container registry mirror in step with its sources
#[derive(Parser)]
#[command(name = "regmirror")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short = 'D', long, global = true)]
    pub debug: bool,

    /// Manifest file
    #[arg(
        long,
        global = true,
        env = "REGMIRROR_MANIFEST",
        default_value = "images-manifest.yml"
    )]
    pub manifest: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Move pinned manifest tags to the newest matching versions
    Update(update::UpdateArgs),

    /// Mirror the manifest's images to the destination registry
    Sync(sync::SyncArgs),

    /// Update the manifest, then mirror
    Run(run::RunArgs),

    /// Build the report from images already in the destination registry
    Inventory(inventory::InventoryArgs),

    /// Print version information
    Version,
}
