//! # relpack Newest Directory Selection
//!
//! File: cli/src/common/fs/newest.rs
//!
//! ## Overview
//!
//! Release directories are promoted by recency: the next bundle always starts
//! from whichever sibling directory under the release root was modified last.
//! This module implements that selection.
//!
//! ## Architecture
//!
//! - Only the immediate children of the root are considered (no recursion).
//! - Regular files are ignored, even when they are newer than every directory.
//!   Symlinks count when they point at a directory.
//! - The child with the greatest modification time wins. On an exact tie the
//!   lexically greatest name wins, so `2024-01-03` beats `2024-01-02`.
//!
use crate::core::error::{RelpackError, Result};
use anyhow::{anyhow, Context};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// # Newest Subdirectory (`newest_subdirectory`)
///
/// Returns the full path of the most recently modified directory directly
/// below `root`.
///
/// ## Errors
///
/// * `RelpackError::NoDirectoryFound` - `root` holds no directories.
/// * Any I/O error listing `root` or reading a child's metadata.
pub fn newest_subdirectory(root: &Path) -> Result<PathBuf> {
    let listing = fs::read_dir(root)
        .with_context(|| format!("Failed to list release root {}", root.display()))?;

    let mut newest = None;
    for child in listing {
        let child =
            child.with_context(|| format!("Failed to list release root {}", root.display()))?;
        let path = child.path();
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                debug!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };
        if !metadata.is_dir() {
            continue;
        }
        let modified = metadata
            .modified()
            .with_context(|| format!("Failed to read modification time of {}", path.display()))?;
        debug!("Candidate {} modified at {:?}", path.display(), modified);

        newest = match newest {
            Some((best_time, best_path)) if (best_time, &best_path) >= (modified, &path) => {
                Some((best_time, best_path))
            }
            _ => Some((modified, path)),
        };
    }

    let (_, path) = newest.ok_or_else(|| {
        anyhow!(RelpackError::NoDirectoryFound {
            root: root.to_path_buf(),
        })
    })?;
    info!("Newest release directory is {}", path.display());
    Ok(path)
}
