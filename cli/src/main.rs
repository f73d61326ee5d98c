//! # relpack Main Entry Point
//!
//! File: cli/src/main.rs
//!
//! ## Overview
//!
//! This file serves as the main entry point for the relpack CLI application.
//! It handles:
//! - Command-line argument parsing using Clap
//! - Setting up the logging system based on verbosity flags
//! - Routing execution to appropriate command handlers
//!
//! ## Examples
//!
//! ```bash
//! # Stage today's release with two images
//! relpack pack repo/app:v2 repo/worker:v2
//!
//! # Show which release directory would be promoted, with debug logging
//! relpack -vv latest
//! ```
//!
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

mod commands; // Command handlers (pack, latest, archive, serve)
mod common; // Shared utilities (archive codec, docker, fs)
mod core; // Configuration, errors and the staging pipeline

/// Defines the top-level command-line arguments structure using Clap's derive macros.
#[derive(Parser, Debug)]
#[command(
    name = "relpack",
    about = "📦 relpack: Release bundle stager",
    long_about = "Promotes the newest release directory to today's label, pulls a fresh\n\
                  image set into it and repackages the images as images.tar.gz.",
    propagate_version = true,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

/// Enum defining all available top-level commands.
#[derive(Parser, Debug)]
enum Commands {
    /// Stage today's release with a fresh set of images.
    #[command(alias = "p")]
    Pack(commands::pack::PackArgs),
    /// Print the newest release directory under the release root.
    Latest(commands::latest::LatestArgs),
    /// Create, extract or list .tar.gz archives.
    #[command(alias = "a")]
    Archive(commands::archive::ArchiveArgs),
    /// Serve the staging API over HTTP.
    Serve(commands::serve::ServeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    tracing::debug!("Parsed CLI arguments: {:?}", cli);

    let command_result = match cli.command {
        Commands::Pack(args) => commands::pack::handle_pack(args).await,
        Commands::Latest(args) => commands::latest::handle_latest(args).await,
        Commands::Archive(args) => commands::archive::handle_archive(args).await,
        Commands::Serve(args) => commands::serve::handle_serve(args).await,
    };

    if let Err(e) = command_result {
        tracing::error!("Command execution failed: {:?}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}
