//! # relpack Archive Command (`relpack archive`)
//!
//! File: cli/src/commands/archive.rs
//!
//! ## Overview
//!
//! Direct access to the archive codec the staging pipeline uses, for
//! inspecting or hand-building release archives. None of these subcommands
//! read the relpack configuration.
//!
//! ```bash
//! relpack archive create ./images images.tar.gz --level 9
//! relpack archive list images.tar.gz
//! relpack archive extract images.tar.gz ./images
//! ```
//!
use crate::common::archive::tar::{self, EntryKind, DEFAULT_COMPRESSION_LEVEL};
use crate::core::error::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

/// # Archive Command Group Arguments (`ArchiveArgs`)
#[derive(Parser, Debug)]
pub struct ArchiveArgs {
    #[command(subcommand)]
    command: ArchiveCommand,
}

#[derive(Subcommand, Debug)]
enum ArchiveCommand {
    /// Compress a file or directory into a gzipped tarball.
    Create(CreateArgs),
    /// Unpack a gzipped tarball into a directory.
    Extract(ExtractArgs),
    /// List the entries of a gzipped tarball.
    List(ListArgs),
}

#[derive(Parser, Debug)]
struct CreateArgs {
    /// File or directory to archive.
    source: PathBuf,
    /// Archive to create (overwritten if present).
    target: PathBuf,
    /// Gzip compression level (0-9).
    #[arg(long, short, default_value_t = DEFAULT_COMPRESSION_LEVEL,
          value_parser = clap::value_parser!(u32).range(0..=9))]
    level: u32,
}

#[derive(Parser, Debug)]
struct ExtractArgs {
    /// Archive to unpack.
    archive: PathBuf,
    /// Destination directory (created if missing).
    destination: PathBuf,
}

#[derive(Parser, Debug)]
struct ListArgs {
    /// Archive to inspect.
    archive: PathBuf,
}

/// # Handle Archive Command (`handle_archive`)
///
/// Dispatches to the selected archive subcommand and prints a one-line summary
/// (or the entry listing) to stdout.
pub async fn handle_archive(args: ArchiveArgs) -> Result<()> {
    match args.command {
        ArchiveCommand::Create(args) => {
            let summary = tar::compress_with_level(&args.source, &args.target, args.level)?;
            info!("Archive written to {}", args.target.display());
            println!(
                "{} ({} files, {} directories, {} bytes)",
                args.target.display(),
                summary.files,
                summary.directories,
                summary.bytes
            );
        }
        ArchiveCommand::Extract(args) => {
            let summary = tar::decompress(&args.archive, &args.destination)?;
            println!(
                "Extracted {} files and {} directories into {}",
                summary.files,
                summary.directories,
                args.destination.display()
            );
        }
        ArchiveCommand::List(args) => {
            for entry in tar::list_entries(&args.archive)? {
                let kind = match entry.kind {
                    EntryKind::File => "file",
                    EntryKind::Directory => "dir",
                    EntryKind::Other => "other",
                };
                println!(
                    "{:<5} {:>10} {:04o} {:>10} {}",
                    kind, entry.size, entry.mode, entry.modified, entry.name
                );
            }
        }
    }
    Ok(())
}
