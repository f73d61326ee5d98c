//! # Destination Lock
//!
//! File: cli/src/core/staging/lock.rs
//!
//! One staging session per destination label at a time. The lock is an
//! exclusive advisory `flock` on `{root}/.{label}.lock`, so it also holds
//! across processes (a `relpack pack` run next to a `relpack serve`
//! instance). Acquisition never waits: a second session for the same label
//! fails fast with `RelpackError::StagingInProgress`.
//!
//! The lock file exists only while a session holds it. Release unlinks the
//! file before unlocking, so a finished session (successful or not) leaves
//! the root as it found it. Because of that, a session that opened the file
//! just before it was unlinked could end up locking an orphaned inode; after
//! locking, the path is re-checked against the open handle and acquisition
//! retries on a mismatch.
use crate::core::error::{RelpackError, Result};
use anyhow::{anyhow, Context};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Attempts before giving up on a lock file that keeps being replaced.
const MAX_ACQUIRE_ATTEMPTS: usize = 8;

/// Held for the whole duration of one staging session; released on drop.
#[derive(Debug)]
pub struct DestinationLock {
    lock_file: File,
    path: PathBuf,
}

impl DestinationLock {
    pub fn lock_path(root: &Path, label: &str) -> PathBuf {
        root.join(format!(".{}.lock", label))
    }

    pub fn acquire(root: &Path, label: &str) -> Result<Self> {
        let path = Self::lock_path(root, label);
        for attempt in 1..=MAX_ACQUIRE_ATTEMPTS {
            let file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(false)
                .open(&path)
                .with_context(|| format!("Failed to open lock file {}", path.display()))?;

            match file.try_lock_exclusive() {
                Ok(()) => {}
                Err(e) if e.kind() == fs2::lock_contended_error().kind() => {
                    return Err(anyhow!(RelpackError::StagingInProgress {
                        label: label.to_string(),
                    }));
                }
                Err(e) => {
                    return Err(e).with_context(|| format!("Failed to lock {}", path.display()));
                }
            }

            if is_same_file(&file, &path)? {
                debug!("Acquired staging lock {}", path.display());
                return Ok(Self {
                    lock_file: file,
                    path,
                });
            }
            debug!(
                "Lock file {} was released during acquisition (attempt {})",
                path.display(),
                attempt
            );
        }
        Err(anyhow!(RelpackError::StagingInProgress {
            label: label.to_string(),
        }))
    }
}

/// True when `path` still names the file behind `file`.
#[cfg(unix)]
fn is_same_file(file: &File, path: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let held = file
        .metadata()
        .with_context(|| format!("Failed to stat lock file {}", path.display()))?;
    match fs::metadata(path) {
        Ok(current) => Ok(current.dev() == held.dev() && current.ino() == held.ino()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to stat lock file {}", path.display())),
    }
}

/// Open files cannot be unlinked on this platform, so the path cannot change underneath us.
#[cfg(not(unix))]
fn is_same_file(_file: &File, _path: &Path) -> Result<bool> {
    Ok(true)
}

impl Drop for DestinationLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                warn!("Failed to remove lock file {}: {}", self.path.display(), e);
            }
        }
        let _ = FileExt::unlock(&self.lock_file);
        debug!("Released staging lock {}", self.path.display());
    }
}
