//! # relpack Configuration System
//!
//! File: cli/src/core/config.rs
//!
//! ## Overview
//!
//! This module implements the configuration system for relpack, handling loading,
//! merging, validation, and access to configuration data. It combines defaults,
//! user settings, and project-specific overrides.
//!
//! ## Architecture
//!
//! Configuration sources (in order of precedence):
//! 1. Command-line flags (applied by the command handlers)
//! 2. Project-specific `.relpack.toml` in current directory or ancestors
//! 3. User-specific `config.toml` in the platform config directory
//! 4. Default values defined in the code
//!
//! ## Examples
//!
//! ```toml
//! [release]
//! root = "~/releases"
//! label_format = "%Y-%m-%d"
//! reuse_existing_archive = false
//!
//! [registry]
//! server_address = "harbor.example.com"
//! username = "robot$publisher"
//! password = "secret"
//!
//! [server]
//! host = "0.0.0.0"
//! port = 8000
//! ```
//!
//! ```rust
//! let cfg = config::load_config()?;
//! let root = cfg.release.root_path();
//! let label = cfg.release.today_label()?;
//! ```
//!
use crate::core::error::{RelpackError, Result};
use anyhow::{anyhow, Context};
use directories::ProjectDirs;
use serde::Deserialize;
use std::fmt::Write as _;
use std::net::{IpAddr, Ipv4Addr};
use std::{
    fs,
    path::{Component, Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Represents the main configuration structure, loaded from TOML files.
#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub release: ReleaseConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Where release directories live and how a staging session lays them out.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ReleaseConfig {
    /// Root directory holding the dated release directories (can use ~).
    #[serde(default = "default_release_root")]
    pub root: String,
    /// chrono format string producing today's destination label.
    #[serde(default = "default_label_format")]
    pub label_format: String,
    /// Name of the working image subdirectory inside a release directory.
    #[serde(default = "default_images_dir")]
    pub images_dir: String,
    /// File name of the image archive inside a release directory.
    #[serde(default = "default_archive_name")]
    pub archive_name: String,
    /// Unpack the promoted archive into the working directory before pulling.
    /// Unset means off; an explicit value in a closer layer wins.
    #[serde(default)]
    pub reuse_existing_archive: Option<bool>,
    /// Gzip level (0-9) used when repackaging.
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,
}

/// Credentials for the image registry. All fields are optional.
#[derive(Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    pub server_address: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Bind address for `relpack serve`.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: IpAddr,
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ReleaseConfig {
    fn default() -> Self {
        Self {
            root: default_release_root(),
            label_format: default_label_format(),
            images_dir: default_images_dir(),
            archive_name: default_archive_name(),
            reuse_existing_archive: None,
            compression_level: default_compression_level(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_server_port(),
        }
    }
}

impl ReleaseConfig {
    /// Whether the promoted archive is unpacked before pulling.
    pub fn reuses_existing_archive(&self) -> bool {
        self.reuse_existing_archive.unwrap_or(false)
    }

    /// The configured root as a path.
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(&self.root)
    }

    /// Renders today's label with `label_format` in local time.
    pub fn today_label(&self) -> Result<String> {
        let mut label = String::new();
        write!(label, "{}", chrono::Local::now().format(&self.label_format)).map_err(|_| {
            anyhow!(RelpackError::Config(format!(
                "Invalid label format '{}'.",
                self.label_format
            )))
        })?;
        validate_label(&label)?;
        Ok(label)
    }
}

impl RegistryConfig {
    /// True when both a username and a password are configured.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

/// Checks that a release label names exactly one directory below the root.
pub fn validate_label(label: &str) -> Result<()> {
    if !is_single_component(label) {
        anyhow::bail!(RelpackError::Validation(format!(
            "Release label '{}' must be a single directory name.",
            label
        )));
    }
    Ok(())
}

fn is_single_component(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !name.contains(['/', '\\'])
}

fn default_release_root() -> String {
    "~/releases".to_string()
}
fn default_label_format() -> String {
    "%Y-%m-%d".to_string()
}
fn default_images_dir() -> String {
    "images".to_string()
}
fn default_archive_name() -> String {
    "images.tar.gz".to_string()
}
fn default_compression_level() -> u32 {
    6
}
fn default_server_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}
fn default_server_port() -> u16 {
    8000
}

const PROJECT_CONFIG_FILENAME: &str = ".relpack.toml";

pub fn load_config() -> Result<Config> {
    let user_config = load_user_config()?;
    let project_config = load_project_config()?;
    let mut merged_config = merge_configs(user_config.unwrap_or_default(), project_config);
    expand_config_paths(&mut merged_config);
    validate_config(&merged_config).context("Configuration validation failed")?;
    debug!("Final loaded configuration: {:?}", redacted(&merged_config));
    Ok(merged_config)
}

fn load_user_config() -> Result<Option<Config>> {
    if let Some(proj_dirs) = ProjectDirs::from("com", "relpack", "relpack") {
        let config_path = proj_dirs.config_dir().join("config.toml");
        if config_path.exists() {
            info!("Loading user configuration from: {}", config_path.display());
            load_config_from_path(&config_path).map(Some)
        } else {
            debug!(
                "User configuration file not found at {}",
                config_path.display()
            );
            Ok(None)
        }
    } else {
        warn!("Could not determine user config directory.");
        Ok(None)
    }
}

fn load_project_config() -> Result<Option<Config>> {
    if let Some(project_config_path) = find_project_config_path()? {
        info!(
            "Loading project configuration from: {}",
            project_config_path.display()
        );
        load_config_from_path(&project_config_path).map(Some)
    } else {
        debug!("No project configuration file (.relpack.toml) found in current directory or ancestors.");
        Ok(None)
    }
}

fn find_project_config_path() -> Result<Option<PathBuf>> {
    let current_dir = std::env::current_dir().context("Failed to get current directory")?;
    let mut path: &Path = &current_dir;
    loop {
        let project_config = path.join(PROJECT_CONFIG_FILENAME);
        if project_config.is_file() {
            return Ok(Some(project_config));
        }
        if path.join(".git").is_dir() {
            debug!(
                "Found .git directory at {}, stopping project config search.",
                path.display()
            );
            return Ok(None);
        }
        match path.parent() {
            Some(parent) => path = parent,
            None => break,
        }
    }
    Ok(None)
}

fn load_config_from_path(path: &Path) -> Result<Config> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse TOML from file: {}", path.display()))
}

/// Project values win wherever they differ from the built-in defaults.
fn merge_configs(user: Config, project: Option<Config>) -> Config {
    let project_cfg = match project {
        Some(p) => p,
        None => return user,
    };
    let defaults = ReleaseConfig::default();
    let pick = |project: String, user: String, default: &str| {
        if project != default {
            project
        } else {
            user
        }
    };

    let mut merged = Config::default();
    merged.release.root = pick(project_cfg.release.root, user.release.root, &defaults.root);
    merged.release.label_format = pick(
        project_cfg.release.label_format,
        user.release.label_format,
        &defaults.label_format,
    );
    merged.release.images_dir = pick(
        project_cfg.release.images_dir,
        user.release.images_dir,
        &defaults.images_dir,
    );
    merged.release.archive_name = pick(
        project_cfg.release.archive_name,
        user.release.archive_name,
        &defaults.archive_name,
    );
    merged.release.reuse_existing_archive = project_cfg
        .release
        .reuse_existing_archive
        .or(user.release.reuse_existing_archive);
    merged.release.compression_level =
        if project_cfg.release.compression_level != defaults.compression_level {
            project_cfg.release.compression_level
        } else {
            user.release.compression_level
        };

    merged.registry = RegistryConfig {
        server_address: project_cfg
            .registry
            .server_address
            .or(user.registry.server_address),
        username: project_cfg.registry.username.or(user.registry.username),
        password: project_cfg.registry.password.or(user.registry.password),
    };

    let server_defaults = ServerConfig::default();
    merged.server.host = if project_cfg.server.host != server_defaults.host {
        project_cfg.server.host
    } else {
        user.server.host
    };
    merged.server.port = if project_cfg.server.port != server_defaults.port {
        project_cfg.server.port
    } else {
        user.server.port
    };
    merged
}

fn expand_config_paths(config: &mut Config) {
    config.release.root = shellexpand::tilde(&config.release.root).into_owned();
    debug!("Expanded release root: {}", config.release.root);
}

pub fn validate_config(config: &Config) -> Result<()> {
    info!("Validating final configuration...");
    let release = &config.release;
    let root = release.root_path();
    if !root.exists() {
        warn!("Configured release root '{}' does not exist.", root.display());
    } else if !root.is_dir() {
        return Err(anyhow!(RelpackError::Config(format!(
            "Configured release root '{}' exists but is not a directory.",
            root.display()
        ))));
    }
    if release.compression_level > 9 {
        return Err(anyhow!(RelpackError::Config(format!(
            "Compression level {} is out of range (0-9).",
            release.compression_level
        ))));
    }
    for (key, value) in [
        ("images_dir", &release.images_dir),
        ("archive_name", &release.archive_name),
    ] {
        if !is_single_component(value) {
            return Err(anyhow!(RelpackError::Config(format!(
                "release.{} '{}' must be a plain file name.",
                key, value
            ))));
        }
    }
    if release.images_dir == release.archive_name {
        return Err(anyhow!(RelpackError::Config(
            "release.images_dir and release.archive_name must differ.".to_string()
        )));
    }
    release
        .today_label()
        .map_err(|e| anyhow!(RelpackError::Config(format!("{:#}", e))))?;
    if config.registry.username.is_some() != config.registry.password.is_some() {
        return Err(anyhow!(RelpackError::Config(
            "registry.username and registry.password must be set together.".to_string()
        )));
    }
    info!("Configuration validation successful.");
    Ok(())
}

/// Copy of the config that is safe to log.
fn redacted(config: &Config) -> Config {
    let mut copy = config.clone();
    if copy.registry.password.is_some() {
        copy.registry.password = Some("***".to_string());
    }
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_deserialize_basic_toml() {
        let toml_content = r#"
            [release]
            root = "~/bundles"
            reuse_existing_archive = true

            [registry]
            server_address = "harbor.example.com"
            username = "robot"
            password = "secret"

            [server]
            host = "0.0.0.0"
            port = 9100
        "#;

        let config: Config = toml::from_str(toml_content).expect("Failed to parse TOML");

        assert_eq!(config.release.root, "~/bundles"); // Not yet expanded
        assert_eq!(config.release.label_format, "%Y-%m-%d"); // Default
        assert_eq!(config.release.images_dir, "images");
        assert_eq!(config.release.archive_name, "images.tar.gz");
        assert_eq!(config.release.reuse_existing_archive, Some(true));
        assert!(config.release.reuses_existing_archive());
        assert_eq!(config.release.compression_level, 6);
        assert_eq!(
            config.registry.server_address.as_deref(),
            Some("harbor.example.com")
        );
        assert!(config.registry.has_credentials());
        assert_eq!(config.server.host.to_string(), "0.0.0.0");
        assert_eq!(config.server.port, 9100);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result: std::result::Result<Config, _> = toml::from_str("[release]\nrooot = \"/x\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_path_expansion() {
        let mut config = Config {
            release: ReleaseConfig {
                root: "~/rel_test".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        expand_config_paths(&mut config);
        assert!(!config.release.root.starts_with('~'));
        assert!(config.release.root.ends_with("rel_test"));
    }

    #[test]
    fn test_merge_prefers_project_values() {
        let user = Config {
            release: ReleaseConfig {
                root: "/user/root".into(),
                compression_level: 9,
                ..Default::default()
            },
            registry: RegistryConfig {
                server_address: Some("user.example.com".into()),
                username: Some("u".into()),
                password: Some("p".into()),
            },
            ..Default::default()
        };
        let project = Config {
            release: ReleaseConfig {
                root: "/project/root".into(),
                ..Default::default()
            },
            registry: RegistryConfig {
                server_address: Some("project.example.com".into()),
                ..Default::default()
            },
            ..Default::default()
        };

        let merged = merge_configs(user, Some(project));
        assert_eq!(merged.release.root, "/project/root");
        assert_eq!(merged.release.compression_level, 9); // project kept the default
        assert_eq!(
            merged.registry.server_address.as_deref(),
            Some("project.example.com")
        );
        assert_eq!(merged.registry.username.as_deref(), Some("u"));
    }

    #[test]
    fn test_project_can_turn_off_archive_reuse() {
        let user: Config =
            toml::from_str("[release]\nreuse_existing_archive = true\n").unwrap();
        let project: Config =
            toml::from_str("[release]\nreuse_existing_archive = false\n").unwrap();
        let merged = merge_configs(user.clone(), Some(project));
        assert!(!merged.release.reuses_existing_archive());

        let silent_project: Config = toml::from_str("[release]\nroot = \"/srv\"\n").unwrap();
        let merged = merge_configs(user, Some(silent_project));
        assert!(merged.release.reuses_existing_archive());
    }

    #[test]
    fn test_validate_config_valid() {
        let temp_dir = tempdir().unwrap();
        let config = Config {
            release: ReleaseConfig {
                root: temp_dir.path().to_string_lossy().to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_config_root_is_file() {
        let temp_dir = tempdir().unwrap();
        let file_path = temp_dir.path().join("not_a_dir");
        fs::write(&file_path, "").unwrap();

        let config = Config {
            release: ReleaseConfig {
                root: file_path.to_string_lossy().to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("is not a directory"));
    }

    #[test]
    fn test_validate_config_rejects_bad_values() {
        let bad_level = Config {
            release: ReleaseConfig {
                compression_level: 12,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&bad_level).is_err());

        let nested_dir = Config {
            release: ReleaseConfig {
                images_dir: "a/b".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&nested_dir).is_err());

        let half_credentials = Config {
            registry: RegistryConfig {
                username: Some("robot".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&half_credentials).is_err());

        let slashed_label = Config {
            release: ReleaseConfig {
                label_format: "%Y/%m/%d".into(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(validate_config(&slashed_label).is_err());
    }

    #[test]
    fn test_validate_label() {
        assert!(validate_label("2024-01-03").is_ok());
        assert!(validate_label("").is_err());
        assert!(validate_label("..").is_err());
        assert!(validate_label(".").is_err());
        assert!(validate_label("a/b").is_err());
    }

    #[test]
    fn test_redacted_hides_password() {
        let config = Config {
            registry: RegistryConfig {
                username: Some("robot".into()),
                password: Some("secret".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        assert_eq!(redacted(&config).registry.password.as_deref(), Some("***"));
    }
}
