//! Corral - application platform control plane
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use corral::cli::commands;
use corral::cli::{Cli, Commands};
use corral::config::{Config, ConfigManager};
use corral::error::CorralResult;
use corral::store::create_store;
use corral::ControlPlane;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: u8, config: &Config) {
    // 0 = warn, 1 = info, 2+ = debug
    let filter = match verbose {
        0 => EnvFilter::new("corral=warn"),
        1 => EnvFilter::new("corral=info"),
        _ => EnvFilter::new("corral=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.with_target(false).without_time().init();
    }
}

async fn run() -> CorralResult<()> {
    let cli = Cli::parse();

    let manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = manager.load().await?;
    init_logging(cli.verbose, &config);
    debug!("Loaded configuration from {}", manager.path().display());

    // Config edits work on the file as written, without CLI overrides
    if let Commands::Config(args) = cli.command {
        return commands::config(args, &manager, &config).await;
    }

    let mut config = config;
    if let Some(backend) = cli.store {
        config.store.backend = backend;
    }
    let namespace = cli
        .namespace
        .clone()
        .unwrap_or_else(|| config.general.namespace.clone());

    let store = create_store(&config)?;
    debug!("Using {} store", store.backend_name());
    let plane = ControlPlane::new(store, &config)?;

    match cli.command {
        Commands::Config(_) => unreachable!("Config handled above"),
        Commands::Serve(args) => commands::serve(args, plane, &config).await,
        Commands::App(args) => commands::app(args, &plane, &namespace).await,
        Commands::Service(args) => commands::service(args, &plane, &namespace).await,
        Commands::Cache(args) => commands::cache(args, &plane).await,
    }
}
