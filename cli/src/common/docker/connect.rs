//! # relpack Docker Connection Helper
//!
//! File: cli/src/common/docker/connect.rs
//!
//! ## Overview
//!
//! This internal utility module provides a single, standardized function,
//! `connect_docker`, responsible for establishing a connection to the local
//! Docker daemon using default settings provided by the `bollard` crate.
//! It centralizes connection logic and error handling for the other modules
//! within `common::docker`.
//!
//! ## Architecture
//!
//! - Calls `bollard::Docker::connect_with_local_defaults()` (honours `DOCKER_HOST`).
//! - Wraps connection errors in `RelpackError::DockerApi` with user-friendly context.
//!
use crate::core::error::{RelpackError, Result};
use anyhow::{anyhow, Context};
use bollard::Docker;
use tracing::instrument;

/// Establishes a connection to the local Docker daemon using default settings.
///
/// # Errors
///
/// Returns an `Err` wrapping `RelpackError::DockerApi` if the connection fails.
#[instrument]
pub async fn connect_docker() -> Result<Docker> {
    Docker::connect_with_local_defaults()
        .map_err(|e| anyhow!(RelpackError::DockerApi { source: e }))
        .context("Failed to connect to Docker daemon. Is it running and accessible?")
}
