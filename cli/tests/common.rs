//! # relpack CLI Integration Test Common Helpers
//!
//! File: cli/tests/common.rs
//!
//! Shared helpers for the integration test crates in `cli/tests/`.
//!

// Different test files use different helpers.
#![allow(dead_code)]

pub use assert_cmd::Command;
use std::fs::{self, File};
use std::path::Path;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// `relpack` binary with HOME and XDG_CONFIG_HOME pointed into `sandbox`, so
/// the developer's own user config never leaks into a test run.
pub fn relpack_cmd(sandbox: &Path) -> Command {
    let mut cmd = Command::cargo_bin("relpack").expect("Failed to find relpack binary for testing");
    cmd.current_dir(sandbox)
        .env("HOME", sandbox)
        .env("XDG_CONFIG_HOME", sandbox.join(".config"))
        .env_remove("RUST_LOG");
    cmd
}

pub fn set_mtime(path: &Path, secs: u64) {
    File::open(path)
        .unwrap()
        .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap();
}

/// `releases/2024-01-01` (older) and `releases/2024-01-02` (newer) inside a sandbox.
pub fn release_sandbox() -> TempDir {
    let sandbox = tempfile::tempdir().unwrap();
    let root = sandbox.path().join("releases");
    for (name, secs) in [("2024-01-01", 1_000), ("2024-01-02", 2_000)] {
        let dir = root.join(name);
        fs::create_dir_all(dir.join("images")).unwrap();
        fs::write(dir.join("README"), name).unwrap();
        set_mtime(&dir, secs);
    }
    sandbox
}
