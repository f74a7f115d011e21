//! Regmirror CLI - keeps a container registry mirror in step with its sources.

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod console;

use commands::{Cli, Commands};
use console::ConsoleSink;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(cli.debug).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let outcome = tokio::select! {
        outcome = dispatch(cli) => outcome,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("\n⚠️  Interrupted");
            return ExitCode::from(1);
        }
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(1)
        }
    }
}

/// Log filter used when `RUST_LOG` is unset. Events already go to stdout
/// through the console sink, so their log copies only show with `--debug`.
const fn default_filter(debug: bool) -> &'static str {
    if debug {
        "regmirror=debug"
    } else {
        "regmirror=info,regmirror::events=off"
    }
}

async fn dispatch(cli: Cli) -> Result<bool> {
    let sink = ConsoleSink::shared(cli.debug);
    let manifest = cli.manifest.as_path();

    match cli.command {
        Commands::Update(args) => commands::update::execute(manifest, &args, sink).await,
        Commands::Sync(args) => commands::sync::execute(manifest, &args, sink).await,
        Commands::Run(args) => commands::run::execute(manifest, &args, sink).await,
        Commands::Inventory(args) => commands::inventory::execute(manifest, &args, sink).await,
        Commands::Version => {
            println!("regmirror {}", env!("CARGO_PKG_VERSION"));
            Ok(true)
        }
    }
}
