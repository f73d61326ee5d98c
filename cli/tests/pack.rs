//! # relpack Pack Command Integration Tests
//!
//! File: cli/tests/pack.rs
//!
//! These cover the paths that fail before any image is pulled, so no Docker
//! daemon is needed. The full pipeline is covered by the staging unit tests.
//!

mod common;

use common::{relpack_cmd, release_sandbox};
use predicates::prelude::*;
use std::fs;

#[test]
fn test_pack_requires_images() {
    let sandbox = release_sandbox();
    relpack_cmd(sandbox.path())
        .args(["pack", "--root", "releases"])
        .assert()
        .failure();
}

#[test]
fn test_pack_blank_image_has_no_side_effects() {
    let sandbox = release_sandbox();
    relpack_cmd(sandbox.path())
        .args(["pack", "", "--root", "releases", "--label", "2024-01-03"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("must not be blank"));

    let entries: Vec<_> = fs::read_dir(sandbox.path().join("releases"))
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(entries.len(), 2);
}

#[test]
fn test_pack_rejects_path_label() {
    let sandbox = release_sandbox();
    relpack_cmd(sandbox.path())
        .args(["pack", "repo/app:v2", "--root", "releases", "--label", "../escape"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("single directory name"));
    assert!(!sandbox.path().join("escape").exists());
}

#[test]
fn test_pack_empty_root_reports_no_directory() {
    let sandbox = tempfile::tempdir().unwrap();
    fs::create_dir_all(sandbox.path().join("releases")).unwrap();

    relpack_cmd(sandbox.path())
        .args(["pack", "repo/app:v2", "--root", "releases", "--label", "2024-01-03"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No directory found in"));
    assert_eq!(fs::read_dir(sandbox.path().join("releases")).unwrap().count(), 0);
}
