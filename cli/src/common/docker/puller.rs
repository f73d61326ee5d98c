//! # relpack Docker Image Puller
//!
//! File: cli/src/common/docker/puller.rs
//!
//! `ImagePuller` backed by the local Docker daemon. For every reference it
//! pulls the image and exports it to `{destination}/{sanitized-ref}.tar`.
//!
//! The staging pipeline is synchronous, so `pull` drives the async bollard
//! calls through a captured `tokio::runtime::Handle`. It must be called from a
//! thread outside the runtime's async workers (`spawn_blocking` in practice).
use super::connect::connect_docker;
use super::images::{export_image, pull_image};
use crate::core::config::RegistryConfig;
use crate::core::error::{RelpackError, Result};
use crate::core::staging::ImagePuller;
use bollard::auth::DockerCredentials;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::runtime::Handle;
use tracing::{info, instrument};

pub struct DockerImagePuller {
    runtime: Handle,
    credentials: Option<DockerCredentials>,
}

impl DockerImagePuller {
    pub fn new(runtime: Handle, registry: &RegistryConfig) -> Self {
        Self {
            runtime,
            credentials: credentials_from(registry),
        }
    }

    async fn pull_all(&self, destination: &Path, images: &[String]) -> Result<Vec<PathBuf>> {
        let file_names = archive_file_names(images)?;
        let docker = connect_docker().await?;
        let mut exported = Vec::with_capacity(images.len());
        for (image, file_name) in images.iter().zip(file_names) {
            pull_image(&docker, image, self.credentials.clone()).await?;
            let target = destination.join(file_name);
            export_image(&docker, image, &target).await?;
            exported.push(target);
        }
        Ok(exported)
    }
}

impl ImagePuller for DockerImagePuller {
    #[instrument(skip(self, images), fields(destination = %destination.display(), count = images.len()))]
    fn pull(&self, destination: &Path, images: &[String]) -> Result<()> {
        let exported = self.runtime.block_on(self.pull_all(destination, images))?;
        info!("Exported {} image tarball(s)", exported.len());
        Ok(())
    }
}

/// File name an image reference is exported under: path, tag and digest
/// separators become `_`, e.g. `repo/app:v2` -> `repo_app_v2.tar`.
pub fn archive_file_name(image: &str) -> String {
    format!("{}.tar", image.trim().replace(['/', ':', '@'], "_"))
}

/// File names for a whole image set, in request order.
///
/// # Errors
///
/// `RelpackError::Validation` if two references (or the same reference twice)
/// would be exported to the same file.
pub fn archive_file_names(images: &[String]) -> Result<Vec<String>> {
    let mut claimed: HashMap<String, &str> = HashMap::with_capacity(images.len());
    let mut names = Vec::with_capacity(images.len());
    for image in images {
        let name = archive_file_name(image);
        if let Some(previous) = claimed.insert(name.clone(), image) {
            anyhow::bail!(RelpackError::Validation(format!(
                "Images '{}' and '{}' would both be exported as '{}'",
                previous, image, name
            )));
        }
        names.push(name);
    }
    Ok(names)
}

/// Registry credentials for pulls, if both username and password are configured.
pub fn credentials_from(registry: &RegistryConfig) -> Option<DockerCredentials> {
    if !registry.has_credentials() {
        return None;
    }
    Some(DockerCredentials {
        username: registry.username.clone(),
        password: registry.password.clone(),
        serveraddress: registry.server_address.clone(),
        ..Default::default()
    })
}
