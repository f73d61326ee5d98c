//! # relpack Staging Pipeline
//!
//! File: cli/src/core/staging/mod.rs
//!
//! ## Overview
//!
//! A staging session turns "the newest release directory under the root" plus
//! "a list of image references" into `{root}/{label}/images.tar.gz`. It is a
//! linear sequence of steps with compensating deletes. Nothing is retried, and
//! the first failure ends the session.
//!
//! ## Architecture
//!
//! ```text
//! validate request        empty or blank image list -> Validation, no side effects
//! lock {label}            second session for the label -> StagingInProgress
//! stage                   remove {root}/{label}, select newest sibling, copy it in
//! prepare archive target  drop stale images/ and images.tar.gz
//!                         (reuse policy: unpack images.tar.gz into images/ first)
//! pull                    ImagePuller fills images/
//! compress                images/ -> images.tar.gz
//! cleanup                 remove images/ (failure is logged, session still succeeds)
//! ```
//!
//! From the moment the destination is about to be created until compression
//! succeeds, a `Rollback` guard owns it: any failure in between removes the
//! whole destination before the error is returned.
//!
//! Sessions are synchronous and block the calling thread for the duration of
//! the copy, pull and compression. Async callers run them on
//! `tokio::task::spawn_blocking`.
//!
//! ## Usage
//!
//! ```rust
//! let stager = Stager::new(cfg.release.clone(), Arc::new(puller));
//! let staged = stager.stage(&StagingRequest::new(vec!["repo/app:v2".into()]))?;
//! println!("{}", staged.session.archive_path.display());
//! ```
//!
pub mod lock;
pub mod rollback;

use crate::common::archive::tar::{self as archive, ArchiveSummary};
use crate::common::fs::{copy, io, newest};
use crate::core::config::{validate_label, ReleaseConfig};
use crate::core::error::{RelpackError, Result};
use anyhow::Context;
use lock::DestinationLock;
use rollback::Rollback;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Fetches images and materializes them inside a directory.
///
/// Implementations decide the layout below `destination`. Any unreachable or
/// invalid image must fail the whole call.
pub trait ImagePuller: Send + Sync {
    fn pull(&self, destination: &Path, images: &[String]) -> Result<()>;
}

/// What a caller asks for: the images, and optionally an explicit label
/// instead of today's date.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingRequest {
    pub images: Vec<String>,
    pub label: Option<String>,
}

impl StagingRequest {
    pub fn new(images: Vec<String>) -> Self {
        Self {
            images,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Paths one session works with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingSession {
    /// Newest pre-existing release directory that was copied.
    pub source: PathBuf,
    /// `{root}/{label}`.
    pub destination: PathBuf,
    /// `{destination}/images`, present only while the session runs.
    pub work_dir: PathBuf,
    /// `{destination}/images.tar.gz`.
    pub archive_path: PathBuf,
}

/// Outcome of a successful session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRelease {
    pub label: String,
    pub session: StagingSession,
    pub summary: ArchiveSummary,
    /// False when the working directory could not be removed after compression.
    pub work_dir_removed: bool,
}

pub struct Stager {
    release: ReleaseConfig,
    puller: Arc<dyn ImagePuller>,
    /// Removes the working directory once the archive is written.
    remove_work_dir: fn(&Path) -> Result<bool>,
}

impl Stager {
    pub fn new(release: ReleaseConfig, puller: Arc<dyn ImagePuller>) -> Self {
        Self {
            release,
            puller,
            remove_work_dir: io::remove_dir_if_exists,
        }
    }

    /// # Stage Release (`stage`)
    ///
    /// Runs one complete staging session. See the module docs for the steps.
    ///
    /// ## Errors
    ///
    /// * `RelpackError::Validation` - no images, a blank image, or a bad label. Nothing is touched.
    /// * `RelpackError::StagingInProgress` - another session holds the label.
    /// * `RelpackError::NoDirectoryFound` - the root has no release directory to start from.
    /// * Copy, pull or compression failures, after the destination has been removed.
    pub fn stage(&self, request: &StagingRequest) -> Result<StagedRelease> {
        validate_images(&request.images)?;
        let label = match &request.label {
            Some(label) => {
                validate_label(label)?;
                label.clone()
            }
            None => self.release.today_label()?,
        };
        let root = self.release.root_path();
        info!(
            "Staging release '{}' under {} with {} image(s)",
            label,
            root.display(),
            request.images.len()
        );

        // Held until the session returns; the lock file goes with it.
        let _lock = DestinationLock::acquire(&root, &label)?;

        let destination = root.join(&label);
        io::remove_dir_if_exists(&destination)
            .context("Failed to clear previous staging directory")?;

        let source = newest::newest_subdirectory(&root)?;
        let session = StagingSession {
            source,
            work_dir: destination.join(&self.release.images_dir),
            archive_path: destination.join(&self.release.archive_name),
            destination,
        };

        let mut rollback = Rollback::register(&session.destination);

        copy::copy_directory_contents(&session.source, &session.destination).with_context(
            || {
                format!(
                    "Failed to promote {} to {}",
                    session.source.display(),
                    session.destination.display()
                )
            },
        )?;

        self.prepare_archive_target(&session)?;

        io::ensure_dir_exists(&session.work_dir)?;
        self.puller
            .pull(&session.work_dir, &request.images)
            .with_context(|| format!("Failed to pull images into {}", session.work_dir.display()))?;

        let summary = archive::compress_with_level(
            &session.work_dir,
            &session.archive_path,
            self.release.compression_level,
        )
        .with_context(|| format!("Failed to compress {}", session.work_dir.display()))?;
        rollback.disarm();

        let work_dir_removed = match (self.remove_work_dir)(&session.work_dir) {
            Ok(_) => true,
            Err(e) => {
                warn!(
                    "Archive is complete but {} could not be removed: {:#}",
                    session.work_dir.display(),
                    e
                );
                false
            }
        };

        info!(
            "Staged {} ({} files, {} bytes)",
            session.archive_path.display(),
            summary.files,
            summary.bytes
        );
        Ok(StagedRelease {
            label,
            session,
            summary,
            work_dir_removed,
        })
    }

    /// Clears leftovers of the promoted release so the pull starts clean.
    fn prepare_archive_target(&self, session: &StagingSession) -> Result<()> {
        io::remove_dir_if_exists(&session.work_dir)?;
        if !session.archive_path.exists() {
            return Ok(());
        }
        if self.release.reuses_existing_archive() {
            info!(
                "Reusing images from {}",
                session.archive_path.display()
            );
            archive::decompress(&session.archive_path, &session.work_dir).with_context(|| {
                format!("Failed to unpack {}", session.archive_path.display())
            })?;
        }
        io::remove_file_if_exists(&session.archive_path)?;
        Ok(())
    }
}

fn validate_images(images: &[String]) -> Result<()> {
    if images.is_empty() {
        anyhow::bail!(RelpackError::Validation("images is empty".to_string()));
    }
    if images.iter().any(|image| image.trim().is_empty()) {
        anyhow::bail!(RelpackError::Validation(
            "image references must not be blank".to_string()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::archive::tar::{compress, list_entries};
    use crate::core::error::find_relpack_error;
    use std::fs::{self, File};
    use std::sync::Mutex;
    use std::time::{Duration, SystemTime};
    use tempfile::{tempdir, TempDir};

    enum Behavior {
        /// Writes `<image>.tar` per image (slashes and colons replaced).
        Write,
        Fail,
        /// Writes images, then occupies the archive path with a directory.
        BlockArchive,
    }

    struct FakePuller {
        behavior: Behavior,
        calls: Mutex<Vec<(PathBuf, Vec<String>)>>,
    }

    impl FakePuller {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl ImagePuller for FakePuller {
        fn pull(&self, destination: &Path, images: &[String]) -> Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push((destination.to_path_buf(), images.to_vec()));
            if let Behavior::Fail = self.behavior {
                anyhow::bail!(RelpackError::ImagePull {
                    image: images[0].clone(),
                    message: "unauthorized".into(),
                });
            }
            for image in images {
                let name = image.replace(['/', ':'], "_");
                fs::write(destination.join(format!("{}.tar", name)), image)?;
            }
            if let Behavior::BlockArchive = self.behavior {
                let parent = destination.parent().unwrap();
                fs::create_dir_all(parent.join("images.tar.gz"))?;
            }
            Ok(())
        }
    }

    fn set_mtime(path: &Path, secs: u64) {
        File::open(path)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    /// root/2024-01-01 (older) and root/2024-01-02 (newer), each with images/app.tar.
    /// The newer one also carries a README and a stale images.tar.gz.
    fn release_root() -> TempDir {
        let root = tempdir().unwrap();
        for (name, secs) in [("2024-01-01", 1_000), ("2024-01-02", 2_000)] {
            let dir = root.path().join(name);
            fs::create_dir_all(dir.join("images")).unwrap();
            fs::write(dir.join("images/app.tar"), format!("app from {}", name)).unwrap();
            if name == "2024-01-02" {
                fs::write(dir.join("README"), "release notes").unwrap();
                fs::write(dir.join("images.tar.gz"), "stale archive").unwrap();
            }
            set_mtime(&dir, secs);
        }
        root
    }

    fn release_config(root: &Path) -> ReleaseConfig {
        ReleaseConfig {
            root: root.to_string_lossy().to_string(),
            ..Default::default()
        }
    }

    fn archive_names(archive_path: &Path) -> Vec<String> {
        list_entries(archive_path)
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect()
    }

    fn request() -> StagingRequest {
        StagingRequest::new(vec!["repo/app:v2".into()]).with_label("2024-01-03")
    }

    #[test]
    fn test_stages_newest_release() {
        let root = release_root();
        let puller = FakePuller::new(Behavior::Write);
        let stager = Stager::new(release_config(root.path()), puller.clone());

        let staged = stager.stage(&request()).unwrap();

        let destination = root.path().join("2024-01-03");
        assert_eq!(staged.label, "2024-01-03");
        assert_eq!(staged.session.source, root.path().join("2024-01-02"));
        assert_eq!(staged.session.destination, destination);
        assert_eq!(staged.session.archive_path, destination.join("images.tar.gz"));
        assert!(staged.work_dir_removed);
        assert_eq!(staged.summary.files, 1);

        assert!(destination.join("images.tar.gz").is_file());
        assert!(!destination.join("images").exists());
        assert_eq!(
            fs::read_to_string(destination.join("README")).unwrap(),
            "release notes"
        );
        assert_eq!(
            archive_names(&destination.join("images.tar.gz")),
            vec!["repo_app_v2.tar"]
        );

        let calls = puller.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, destination.join("images"));
        assert_eq!(calls[0].1, vec!["repo/app:v2".to_string()]);
    }

    #[test]
    fn test_empty_image_set_has_no_side_effects() {
        let root = release_root();
        let before: Vec<_> = fs::read_dir(root.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        let puller = FakePuller::new(Behavior::Write);
        let stager = Stager::new(release_config(root.path()), puller.clone());

        let err = stager
            .stage(&StagingRequest::new(Vec::new()).with_label("2024-01-03"))
            .unwrap_err();

        assert!(matches!(
            find_relpack_error(&err),
            Some(RelpackError::Validation(_))
        ));
        let after: Vec<_> = fs::read_dir(root.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(before.len(), after.len());
        assert!(!root.path().join("2024-01-03").exists());
        assert_eq!(puller.call_count(), 0);
    }

    #[test]
    fn test_blank_image_rejected() {
        let root = release_root();
        let stager = Stager::new(release_config(root.path()), FakePuller::new(Behavior::Write));
        let err = stager
            .stage(&StagingRequest::new(vec!["  ".into()]).with_label("2024-01-03"))
            .unwrap_err();
        assert!(matches!(
            find_relpack_error(&err),
            Some(RelpackError::Validation(_))
        ));
    }

    #[test]
    fn test_invalid_label_rejected() {
        let root = release_root();
        let stager = Stager::new(release_config(root.path()), FakePuller::new(Behavior::Write));
        let err = stager
            .stage(&StagingRequest::new(vec!["repo/app:v2".into()]).with_label("../escape"))
            .unwrap_err();
        assert!(matches!(
            find_relpack_error(&err),
            Some(RelpackError::Validation(_))
        ));
    }

    #[test]
    fn test_pull_failure_removes_destination() {
        let root = release_root();
        let stager = Stager::new(release_config(root.path()), FakePuller::new(Behavior::Fail));

        let err = stager.stage(&request()).unwrap_err();

        assert!(matches!(
            find_relpack_error(&err),
            Some(RelpackError::ImagePull { .. })
        ));
        assert!(!root.path().join("2024-01-03").exists());
        assert!(root.path().join("2024-01-02/images.tar.gz").exists());
    }

    #[test]
    fn test_compression_failure_removes_destination() {
        let root = release_root();
        let stager = Stager::new(
            release_config(root.path()),
            FakePuller::new(Behavior::BlockArchive),
        );

        assert!(stager.stage(&request()).is_err());
        assert!(!root.path().join("2024-01-03").exists());
    }

    #[test]
    fn test_second_run_replaces_first() {
        let root = release_root();
        let stager = Stager::new(release_config(root.path()), FakePuller::new(Behavior::Write));

        stager.stage(&request()).unwrap();
        let second = StagingRequest::new(vec!["repo/web:v3".into()]).with_label("2024-01-03");
        let staged = stager.stage(&second).unwrap();

        assert_eq!(staged.session.source, root.path().join("2024-01-02"));
        assert_eq!(
            archive_names(&staged.session.archive_path),
            vec!["repo_web_v3.tar"]
        );
        assert!(!staged.session.work_dir.exists());
    }

    #[test]
    fn test_concurrent_session_rejected() {
        let root = release_root();
        let stager = Stager::new(release_config(root.path()), FakePuller::new(Behavior::Write));
        let _held = DestinationLock::acquire(root.path(), "2024-01-03").unwrap();

        let err = stager.stage(&request()).unwrap_err();

        assert!(matches!(
            find_relpack_error(&err),
            Some(RelpackError::StagingInProgress { .. })
        ));
        assert!(!root.path().join("2024-01-03").exists());
    }

    fn root_entries(root: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(root)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_no_release_directory_leaves_root_untouched() {
        let root = tempdir().unwrap();
        fs::write(root.path().join("notes.txt"), "not a release").unwrap();
        let stager = Stager::new(release_config(root.path()), FakePuller::new(Behavior::Write));

        let err = stager.stage(&request()).unwrap_err();

        assert!(matches!(
            find_relpack_error(&err),
            Some(RelpackError::NoDirectoryFound { .. })
        ));
        assert_eq!(root_entries(root.path()), vec!["notes.txt"]);
    }

    #[test]
    fn test_sessions_leave_no_lock_files() {
        let root = release_root();
        let stager = Stager::new(release_config(root.path()), FakePuller::new(Behavior::Write));
        for label in ["2024-01-03", "2024-01-04"] {
            let request = StagingRequest::new(vec!["repo/app:v2".into()]).with_label(label);
            stager.stage(&request).unwrap();
        }
        let failing = Stager::new(release_config(root.path()), FakePuller::new(Behavior::Fail));
        assert!(failing.stage(&request().with_label("2024-01-05")).is_err());

        assert_eq!(
            root_entries(root.path()),
            vec!["2024-01-01", "2024-01-02", "2024-01-03", "2024-01-04"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_copy_failure_removes_destination() {
        let root = release_root();
        let newest = root.path().join("2024-01-02");
        std::os::unix::fs::symlink(newest.join("missing-target"), newest.join("dangling"))
            .unwrap();
        set_mtime(&newest, 2_000);
        let puller = FakePuller::new(Behavior::Write);
        let stager = Stager::new(release_config(root.path()), puller.clone());

        let err = stager.stage(&request()).unwrap_err();

        assert!(format!("{:#}", err).contains("Failed to promote"));
        assert!(!root.path().join("2024-01-03").exists());
        assert_eq!(puller.call_count(), 0);
    }

    #[test]
    fn test_cleanup_failure_keeps_archive() {
        let root = release_root();
        let mut stager =
            Stager::new(release_config(root.path()), FakePuller::new(Behavior::Write));
        stager.remove_work_dir = |path| Err(anyhow::anyhow!("{} is busy", path.display()));

        let staged = stager.stage(&request()).unwrap();

        assert!(!staged.work_dir_removed);
        assert!(staged.session.archive_path.is_file());
        assert!(staged.session.work_dir.is_dir());
        assert_eq!(
            archive_names(&staged.session.archive_path),
            vec!["repo_app_v2.tar"]
        );
    }

    #[test]
    fn test_reuse_policy_keeps_previous_images() {
        let root = release_root();
        let previous = root.path().join("2024-01-02");
        let old_images = root.path().join("old-images");
        fs::create_dir_all(&old_images).unwrap();
        fs::write(old_images.join("base_os_v1.tar"), "base").unwrap();
        compress(&old_images, &previous.join("images.tar.gz")).unwrap();
        fs::remove_dir_all(&old_images).unwrap();
        set_mtime(&previous, 2_000);

        let config = ReleaseConfig {
            reuse_existing_archive: Some(true),
            ..release_config(root.path())
        };
        let stager = Stager::new(config, FakePuller::new(Behavior::Write));
        let staged = stager.stage(&request()).unwrap();

        assert_eq!(
            archive_names(&staged.session.archive_path),
            vec!["base_os_v1.tar", "repo_app_v2.tar"]
        );
    }

    #[test]
    fn test_reuse_policy_rejects_corrupt_archive() {
        let root = release_root();
        let config = ReleaseConfig {
            reuse_existing_archive: Some(true),
            ..release_config(root.path())
        };
        let puller = FakePuller::new(Behavior::Write);
        let stager = Stager::new(config, puller.clone());

        let err = stager.stage(&request()).unwrap_err();

        assert!(matches!(
            find_relpack_error(&err),
            Some(RelpackError::Archive(_))
        ));
        assert!(!root.path().join("2024-01-03").exists());
        assert_eq!(puller.call_count(), 0);
    }
}
