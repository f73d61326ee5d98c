//! # relpack Filesystem I/O Utilities
//!
//! File: cli/src/common/fs/io.rs
//!
//! ## Overview
//!
//! Basic create/remove helpers used by the staging pipeline. Removal helpers
//! are idempotent: a path that is already gone counts as removed, which is what
//! lets a second staging run clean up after the first without tripping over
//! missing files.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::fs::io;
//! use std::path::Path;
//!
//! # fn run_example() -> anyhow::Result<()> {
//! io::ensure_dir_exists(Path::new("/srv/releases/2024-01-03/images"))?;
//! io::remove_file_if_exists(Path::new("/srv/releases/2024-01-03/images.tar.gz"))?;
//! io::remove_dir_if_exists(Path::new("/srv/releases/2024-01-03/images"))?;
//! # Ok(())
//! # }
//! ```
//!
use crate::core::error::{RelpackError, Result};
use anyhow::Context;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, info};

/// Ensures that a directory exists at the specified path.
///
/// If the path does not exist, this function creates the directory,
/// including any necessary parent directories (similar to `mkdir -p`).
/// If the path already exists but is not a directory, an error
/// (`RelpackError::FileSystem`) is returned.
pub fn ensure_dir_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .with_context(|| format!("Failed to create directory {:?}", path))?;
        info!("Created directory: {:?}", path);
    } else if !path.is_dir() {
        anyhow::bail!(RelpackError::FileSystem(format!(
            "Path exists but is not a directory: {:?}",
            path
        )));
    } else {
        debug!("Directory already exists: {:?}", path);
    }
    Ok(())
}

/// Recursively removes a directory. Returns whether anything was removed.
pub fn remove_dir_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_dir_all(path) {
        Ok(()) => {
            info!("Removed directory: {:?}", path);
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("Directory already absent: {:?}", path);
            Ok(false)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to remove directory {:?}", path)),
    }
}

/// Removes a single file. Returns whether anything was removed.
pub fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            info!("Removed file: {:?}", path);
            Ok(true)
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("File already absent: {:?}", path);
            Ok(false)
        }
        Err(e) => Err(e).with_context(|| format!("Failed to remove file {:?}", path)),
    }
}
