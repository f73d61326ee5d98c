//! # relpack Staging Server (`relpack serve`)
//!
//! File: cli/src/commands/serve/mod.rs
//!
//! ## Overview
//!
//! Exposes staging sessions over HTTP so a CI job can request a release
//! bundle without shell access to the release host.
//!
//! ```bash
//! relpack serve --host 0.0.0.0 --port 8000
//! curl -X POST localhost:8000/api/v1/pack/images \
//!      -H 'content-type: application/json' \
//!      -d '{"images":["repo/app:v2"]}'
//! ```
//!
//! ## Architecture
//!
//! - `mod.rs`: Argument parsing and configuration merging.
//! - `server_logic.rs`: Router, handlers, error-to-status mapping, graceful shutdown.
//!
use crate::common::docker::DockerImagePuller;
use crate::core::config;
use crate::core::error::Result;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::info;

/// Router, request handlers and shutdown handling.
pub mod server_logic;

/// # Serve Command Arguments (`ServeArgs`)
///
/// Every flag overrides the matching `[server]` / `[release]` configuration value.
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to bind to (e.g. 0.0.0.0 for all interfaces).
    #[arg(long)]
    pub host: Option<IpAddr>,

    /// Port to listen on.
    #[arg(long, short)]
    pub port: Option<u16>,

    /// Release root. Overrides `release.root` from the configuration.
    #[arg(long)]
    pub root: Option<PathBuf>,
}

/// # Handle Serve Command (`handle_serve`)
///
/// Resolves the effective configuration and runs the server until Ctrl+C or
/// SIGTERM.
pub async fn handle_serve(args: ServeArgs) -> Result<()> {
    info!("Handling serve command with args: {:?}", args);
    let mut cfg = config::load_config()?;
    if let Some(root) = &args.root {
        cfg.release.root = shellexpand::tilde(&root.to_string_lossy()).into_owned();
        config::validate_config(&cfg)?;
    }
    let addr = SocketAddr::new(
        args.host.unwrap_or(cfg.server.host),
        args.port.unwrap_or(cfg.server.port),
    );

    let state = server_logic::AppState {
        release: cfg.release,
        puller: Arc::new(DockerImagePuller::new(Handle::current(), &cfg.registry)),
    };
    server_logic::run_server(addr, state).await
}
