//! # relpack Common Utilities (`common`)
//!
//! File: cli/src/common/mod.rs
//!
//! ## Overview
//!
//! Shared building blocks used by the staging pipeline and the command
//! handlers. Nothing in here knows about release directories or labels;
//! that lives in `core::staging`.
//!
//! - **`archive`**: gzip-compressed tar codec (`compress`, `decompress`, `list_entries`).
//! - **`docker`**: Image pull and export through the Docker daemon.
//! - **`fs`**: Directory copy, existence helpers and newest-subdirectory selection.
//!

/// Utilities for handling archive files (`.tar.gz`).
pub mod archive;
/// Image pull and export through the Docker daemon.
pub mod docker;
/// Utilities for filesystem operations.
pub mod fs;
