//! # relpack Archive Utilities Module (`common::archive`)
//!
//! File: cli/src/common/archive/mod.rs
//!
//! ## Overview
//!
//! This module groups the archive codec used by the staging pipeline:
//! directory (or single file) to `.tar.gz` and back again.
//!
//! ## Architecture
//!
//! - **`tar`**: Builds and unpacks tar streams entry by entry (`compress`, `decompress`, `list_entries`).
//! - **`compression`**: The gzip layer underneath, always streamed through buffered file handles.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::archive;
//! use std::path::Path;
//!
//! # fn run() -> anyhow::Result<()> {
//! let summary = archive::tar::compress(Path::new("release/images"), Path::new("release/images.tar.gz"))?;
//! archive::tar::decompress(Path::new("release/images.tar.gz"), Path::new("/tmp/unpacked"))?;
//! # Ok(())
//! # }
//! ```
//!

pub mod compression;
pub mod tar;
