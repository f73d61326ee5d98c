//! # relpack Pack Command (`relpack pack`)
//!
//! File: cli/src/commands/pack.rs
//!
//! ## Overview
//!
//! Runs one staging session from the command line: promote the newest release
//! directory to today's label, pull the given images through the Docker daemon
//! and repackage them as the release archive.
//!
//! ```bash
//! relpack pack repo/app:v2 repo/worker:v2
//! relpack pack repo/app:v2 --root /srv/releases --label 2024-01-03-hotfix
//! relpack pack repo/app:v2 --reuse-archive
//! ```
//!
//! On success the archive path is printed to stdout, so the command composes
//! with shell pipelines.
//!
use crate::common::docker::DockerImagePuller;
use crate::core::config::{self, Config};
use crate::core::error::Result;
use crate::core::staging::{StagedRelease, Stager, StagingRequest};
use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{info, warn};

/// # Pack Arguments (`PackArgs`)
#[derive(Parser, Debug)]
#[command(about = "Stage today's release with a fresh set of images")]
pub struct PackArgs {
    /// Image references to pull into the release (e.g. "repo/app:v2").
    #[arg(required = true, num_args = 1..)]
    pub images: Vec<String>,

    /// Release root. Overrides `release.root` from the configuration.
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Destination label to use instead of today's date.
    #[arg(long)]
    pub label: Option<String>,

    /// Unpack the promoted release's archive and keep its images alongside the new pulls.
    #[arg(long)]
    pub reuse_archive: bool,
}

/// # Handle Pack Command (`handle_pack`)
///
/// Loads the layered configuration, applies the command-line overrides and
/// runs the staging session on a blocking worker thread.
pub async fn handle_pack(args: PackArgs) -> Result<()> {
    let mut cfg = config::load_config()?;
    apply_overrides(&mut cfg, &args);
    config::validate_config(&cfg).context("Invalid configuration after command-line overrides")?;

    let puller = Arc::new(DockerImagePuller::new(Handle::current(), &cfg.registry));
    let stager = Stager::new(cfg.release, puller);
    let mut request = StagingRequest::new(args.images);
    if let Some(label) = args.label {
        request = request.with_label(label);
    }

    let staged = tokio::task::spawn_blocking(move || stager.stage(&request))
        .await
        .context("Staging task failed to complete")??;
    report(&staged);
    Ok(())
}

fn apply_overrides(cfg: &mut Config, args: &PackArgs) {
    if let Some(root) = &args.root {
        cfg.release.root = shellexpand::tilde(&root.to_string_lossy()).into_owned();
    }
    if args.reuse_archive {
        cfg.release.reuse_existing_archive = Some(true);
    }
}

fn report(staged: &StagedRelease) {
    info!(
        "Release '{}' staged from {}",
        staged.label,
        staged.session.source.display()
    );
    if !staged.work_dir_removed {
        warn!(
            "Working directory {} was left behind",
            staged.session.work_dir.display()
        );
    }
    println!("{}", staged.session.archive_path.display());
}
