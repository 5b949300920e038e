//! CLI entry point and command dispatch.

pub mod args;
pub mod commands;

use anyhow::Result;
use clap::Parser;

use args::{Cli, Commands};

/// Parse arguments, set up logging, and dispatch. Returns the process
/// exit code.
pub async fn run() -> Result<i32> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Scan(scan_args) => commands::scan::run(&cli, scan_args).await,
        Commands::Serve => commands::serve::run(&cli).await,
        Commands::Impact(impact_args) => commands::impact::run(&cli, impact_args).await,
        Commands::InstallCrd => commands::crd::run().await,
        Commands::Version => {
            let info = trustwatch::BUILD_INFO;
            println!("trustwatch {} (commit {}, built {})", info.version, info.commit, info.date);
            Ok(0)
        }
    }
}
