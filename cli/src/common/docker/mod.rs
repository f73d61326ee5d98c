//! # relpack Docker Module Interface
//!
//! File: cli/src/common/docker/mod.rs
//!
//! ## Overview
//!
//! Everything relpack needs from the Docker daemon, via the `bollard` crate.
//!
//! ## Architecture
//!
//! - **`connect`**: Establishes the connection to the Docker daemon.
//! - **`images`**: Pulls images from their registry and exports them as tarballs.
//! - **`puller`**: `DockerImagePuller`, the `ImagePuller` a staging session uses
//!   to fill its working directory.
//!

/// Handles establishing a connection to the local Docker daemon.
pub mod connect;
/// Image pull and export operations.
pub mod images;
/// Staging-facing image puller backed by the daemon.
pub mod puller;

pub use puller::DockerImagePuller;
