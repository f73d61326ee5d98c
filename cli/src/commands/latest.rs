//! # relpack Latest Command (`relpack latest`)
//!
//! File: cli/src/commands/latest.rs
//!
//! Prints the release directory a staging session would copy from: the most
//! recently modified subdirectory of the release root.
use crate::common::fs::newest::newest_subdirectory;
use crate::core::config;
use crate::core::error::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::debug;

#[derive(Parser, Debug)]
pub struct LatestArgs {
    /// Release root to inspect. Defaults to `release.root` from the configuration.
    #[arg(long)]
    pub root: Option<PathBuf>,
}

pub async fn handle_latest(args: LatestArgs) -> Result<()> {
    let root = match args.root {
        Some(root) => root,
        None => config::load_config()?.release.root_path(),
    };
    debug!("Selecting newest release under {}", root.display());
    let newest = newest_subdirectory(&root)?;
    println!("{}", newest.display());
    Ok(())
}
