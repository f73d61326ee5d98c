//! # relpack Error Types
//!
//! File: cli/src/core/error.rs
//!
//! ## Overview
//!
//! This module defines the error types used throughout relpack. Every failure
//! of a staging session falls into one of a handful of categories, and callers
//! (the CLI and the HTTP API) need to tell them apart: an empty image list is
//! the client's fault, a failed image pull is the registry's, a broken archive
//! is the data's.
//!
//! ## Architecture
//!
//! The error system consists of two main components:
//! - `RelpackError`: A custom error enum using `thiserror` for the specific categories
//! - `Result<T>`: A type alias for `anyhow::Result<T>` for flexible error handling
//!
//! Errors are usually created as `RelpackError` values wrapped in `anyhow::Error`
//! and then decorated with `.context(...)` as they travel up. `find_relpack_error`
//! walks the context chain to recover the original category.
//!
//! ## Examples
//!
//! ```rust
//! // Return a specific error type
//! if images.is_empty() {
//!     anyhow::bail!(RelpackError::Validation("no images requested".into()));
//! }
//!
//! // Classify an error that has been wrapped with context
//! match find_relpack_error(&err) {
//!     Some(RelpackError::NoDirectoryFound { root }) => println!("nothing under {}", root.display()),
//!     _ => return Err(err),
//! }
//! ```
//!
use std::path::PathBuf;
use thiserror::Error;

/// Custom error type for the relpack application.
#[derive(Error, Debug)]
pub enum RelpackError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("No directory found in {}", root.display())]
    NoDirectoryFound { root: PathBuf },

    #[error("Filesystem error: {0}")]
    FileSystem(String),

    #[error("Archive decoding failed: {0}")]
    Archive(String),

    #[error("Archive entry '{name}' escapes the destination directory.")]
    InvalidArchiveEntry { name: String },

    #[error("Failed to pull image '{image}': {message}")]
    ImagePull { image: String, message: String },

    #[error("Docker API interaction failed: {source}")]
    DockerApi {
        #[from]
        source: bollard::errors::Error,
    },

    #[error("A staging session for '{label}' is already in progress.")]
    StagingInProgress { label: String },
}

/// Type alias for Result using anyhow::Error for broad compatibility.
pub type Result<T> = anyhow::Result<T>;

/// Finds the first `RelpackError` in an error's context chain.
pub fn find_relpack_error(err: &anyhow::Error) -> Option<&RelpackError> {
    err.chain().find_map(|cause| cause.downcast_ref::<RelpackError>())
}
