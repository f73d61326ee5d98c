//! # relpack Filesystem Utilities (`common::fs`)
//!
//! File: cli/src/common/fs/mod.rs
//!
//! ## Overview
//!
//! This module groups the filesystem helpers the staging pipeline is built on:
//! selecting the newest release directory, copying it, and creating or removing
//! paths idempotently.
//!
//! ## Architecture
//!
//! - **`copy`**: Recursive copy of a directory's contents via `fs_extra`.
//! - **`io`**: `ensure_dir_exists` and the idempotent `remove_*_if_exists` helpers.
//! - **`newest`**: `newest_subdirectory`, the "latest wins" release selector.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::fs::{copy, io, newest};
//! use std::path::Path;
//!
//! # fn run_example() -> anyhow::Result<()> {
//! let root = Path::new("/srv/releases");
//! let latest = newest::newest_subdirectory(root)?;
//! let today = root.join("2024-01-03");
//! io::remove_dir_if_exists(&today)?;
//! copy::copy_directory_contents(&latest, &today)?;
//! # Ok(())
//! # }
//! ```
//!

/// Recursive directory copy (`copy_directory_contents`).
pub mod copy;
/// Create/remove helpers (`ensure_dir_exists`, `remove_dir_if_exists`, `remove_file_if_exists`).
pub mod io;
/// Most-recent-directory selection (`newest_subdirectory`).
pub mod newest;
