//! # Rollback Guard
//!
//! File: cli/src/core/staging/rollback.rs
//!
//! A staging session registers its destination directory for deletion before
//! writing anything into it, and disarms the registration only once the
//! archive is complete. Every other exit path (an early `?` return, a panic
//! unwinding through the session) drops the armed guard, which removes the
//! destination. A failed removal is logged; the original error is what the
//! caller sees.
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

#[derive(Debug)]
pub struct Rollback {
    path: PathBuf,
    armed: bool,
}

impl Rollback {
    pub fn register(path: &Path) -> Self {
        debug!("Registered {} for rollback", path.display());
        Self {
            path: path.to_path_buf(),
            armed: true,
        }
    }

    /// Keeps the directory: the session succeeded.
    pub fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for Rollback {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => warn!("Rolled back staging directory {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Nothing to roll back at {}", self.path.display());
            }
            Err(e) => error!(
                "Rollback failed to remove {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}
