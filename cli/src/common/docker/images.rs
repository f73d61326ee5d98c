//! # relpack Docker Image Operations
//!
//! File: cli/src/common/docker/images.rs
//!
//! ## Overview
//!
//! The two Docker Engine calls a staging session needs: pull an image from its
//! registry, then export it as a `docker save`-style tarball on disk.
//!
//! ## Architecture
//!
//! - **`pull_image`**: Drives the `create_image` progress stream to completion. An
//!   `error` message inside the stream (unknown manifest, denied access) fails the
//!   pull even though the HTTP call itself succeeded.
//! - **`export_image`**: Streams `export_image` chunks straight into a file, so
//!   image size never affects memory use.
//!
//! Both map failures to `RelpackError::ImagePull` when the registry or daemon
//! rejected the image, and to `RelpackError::DockerApi` for transport errors.
//!
use crate::core::error::{RelpackError, Result};
use anyhow::{anyhow, Context};
use bollard::{
    auth::DockerCredentials, image::CreateImageOptions, models::CreateImageInfo, Docker,
};
use futures_util::stream::StreamExt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{debug, error, info, instrument};

/// Pulls `image` into the daemon's local image store.
///
/// References without a tag or digest are pulled as `:latest`, the way the
/// Docker CLI does it, rather than pulling every tag of the repository.
///
/// # Errors
///
/// * `RelpackError::ImagePull` - The registry or daemon reported an error for this image.
/// * `RelpackError::DockerApi` - Communication with the daemon failed.
#[instrument(skip(docker, credentials), fields(image = %image))]
pub async fn pull_image(
    docker: &Docker,
    image: &str,
    credentials: Option<DockerCredentials>,
) -> Result<()> {
    info!("Pulling image '{}'...", image);
    let options = Some(CreateImageOptions {
        from_image: image.to_string(),
        tag: if has_tag_or_digest(image) {
            String::new()
        } else {
            "latest".to_string()
        },
        ..Default::default()
    });

    let mut progress_stream = Box::pin(docker.create_image(options, None, credentials));
    while let Some(progress) = progress_stream.next().await {
        match progress {
            Ok(CreateImageInfo {
                error: Some(message),
                ..
            }) => {
                error!("Pull of '{}' failed: {}", image, message);
                return Err(anyhow!(RelpackError::ImagePull {
                    image: image.to_string(),
                    message,
                }));
            }
            Ok(CreateImageInfo {
                status: Some(status),
                progress,
                ..
            }) => {
                debug!("{}: {} {}", image, status, progress.unwrap_or_default());
            }
            Ok(_) => {}
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code,
                message,
            }) => {
                error!(
                    "Daemon rejected pull of '{}' ({}): {}",
                    image, status_code, message
                );
                return Err(anyhow!(RelpackError::ImagePull {
                    image: image.to_string(),
                    message: format!("{} (HTTP {})", message, status_code),
                }));
            }
            Err(e) => {
                return Err(anyhow!(RelpackError::DockerApi { source: e }))
                    .context(format!("Failed to pull image '{}'", image));
            }
        }
    }

    info!("Pulled image '{}'", image);
    Ok(())
}

/// Exports `image` from the local store into the tarball at `target`.
///
/// # Returns
///
/// * `Result<u64>` - Number of bytes written.
#[instrument(skip(docker, target), fields(image = %image))]
pub async fn export_image(docker: &Docker, image: &str, target: &Path) -> Result<u64> {
    info!("Exporting image '{}' to {}", image, target.display());
    let file = File::create(target)
        .with_context(|| format!("Failed to create {}", target.display()))?;
    let mut writer = BufWriter::new(file);

    let mut written = 0u64;
    let mut export_stream = Box::pin(docker.export_image(image));
    while let Some(chunk) = export_stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code,
                message,
            }) => {
                return Err(anyhow!(RelpackError::ImagePull {
                    image: image.to_string(),
                    message: format!("export failed: {} (HTTP {})", message, status_code),
                }));
            }
            Err(e) => {
                return Err(anyhow!(RelpackError::DockerApi { source: e }))
                    .context(format!("Failed to export image '{}'", image));
            }
        };
        writer
            .write_all(&chunk)
            .with_context(|| format!("Failed to write {}", target.display()))?;
        written += chunk.len() as u64;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to flush {}", target.display()))?;

    info!("Exported '{}' ({} bytes)", image, written);
    Ok(written)
}

/// True when the last path segment carries a `:tag`, or the reference has a digest.
fn has_tag_or_digest(image: &str) -> bool {
    if image.contains('@') {
        return true;
    }
    image
        .rsplit('/')
        .next()
        .is_some_and(|last_segment| last_segment.contains(':'))
}
