//! # relpack Core Infrastructure
//!
//! File: cli/src/core/mod.rs
//!
//! ## Overview
//!
//! This module aggregates the core components of relpack: configuration,
//! error management, and the staging orchestrator that drives one release
//! bundle from "newest directory" to "fresh `images.tar.gz`".
//!
//! ## Architecture
//!
//! - `config`: Configuration loading, merging, and validation
//! - `error`: Error types and error handling utilities
//! - `staging`: The staging pipeline (selection, promotion, pull, compression, cleanup)
//!
//! ## Usage
//!
//! ```rust
//! use crate::core::config; // For loading configuration
//! use crate::core::error::{RelpackError, Result}; // For error handling
//! use crate::core::staging::{Stager, StagingRequest}; // For running a session
//! ```
//!
pub mod config;
pub mod error;
pub mod staging;
