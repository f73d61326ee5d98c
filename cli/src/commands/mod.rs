//! # relpack Command Modules
//!
//! File: cli/src/commands/mod.rs
//!
//! ## Overview
//!
//! This module aggregates the top-level commands of the relpack CLI. Each
//! command defines its own argument struct and an async handler that
//! `main.rs` dispatches to.
//!
//! ## Command Groups
//!
//! - `archive`: Create, extract and list `.tar.gz` archives directly.
//! - `latest`: Print the newest release directory under the root.
//! - `pack`: Run one staging session for a list of images.
//! - `serve`: HTTP front-end that runs staging sessions on request.
//!

/// Command group for the archive codec. Includes subcommands `create`, `extract`, `list`.
pub mod archive;
/// Prints the newest release directory.
pub mod latest;
/// Runs a staging session from the command line.
pub mod pack;
/// HTTP server that exposes staging sessions.
pub mod serve;
