//! # relpack Filesystem Copy Operations
//!
//! File: cli/src/common/fs/copy.rs
//!
//! ## Overview
//!
//! Recursive directory copying, used to promote the newest release directory
//! into today's destination.
//!
//! ## Architecture
//!
//! `copy_directory_contents` delegates to the `fs_extra` crate with
//! `content_only` set, so the *contents* of the source land directly in the
//! target (`root/2024-01-02/*` becomes `root/2024-01-03/*`) instead of a nested
//! `root/2024-01-03/2024-01-02/`. The target and any missing parents are
//! created; existing files are overwritten.
//!
//! The copy is not atomic. A failure leaves a partial target behind and the
//! caller decides whether to remove it.
//!
use crate::core::error::Result;
use std::path::Path;
use tracing::info;

/// Copies the contents of `source` into `target`, recursively.
///
/// # Arguments
///
/// * `source` - Directory to copy from. Must exist.
/// * `target` - Directory to copy into. Created if missing.
///
/// # Returns
///
/// * `Result<u64>` - Number of bytes copied.
///
/// # Errors
///
/// Returns an `Err` if the source is missing or not a directory, or if any
/// directory or file cannot be created or copied.
pub fn copy_directory_contents(source: &Path, target: &Path) -> Result<u64> {
    info!("Starting recursive copy from {:?} to {:?}", source, target);

    let mut options = fs_extra::dir::CopyOptions::new();
    options.overwrite = true;
    options.content_only = true;
    options.copy_inside = true;

    let copied = fs_extra::dir::copy(source, target, &options).map_err(|e| {
        anyhow::anyhow!(e).context(format!("Failed to copy dir {:?} to {:?}", source, target))
    })?;

    info!(
        "Finished recursive copy from {:?} to {:?} ({} bytes)",
        source, target, copied
    );
    Ok(copied)
}
