//! # relpack TAR Archive Operations (`common::archive::tar`)
//!
//! File: cli/src/common/archive/tar.rs
//!
//! ## Overview
//!
//! This module turns a directory (or a lone file) into a gzipped tarball on disk
//! and unpacks such tarballs again. It is the codec behind `images.tar.gz`: the
//! staging pipeline compresses the working `images/` directory with it, and the
//! archive-reuse policy unpacks a promoted archive with it.
//!
//! ## Architecture
//!
//! The module leverages the `tar` crate for the archive structure, `flate2`
//! (through `compression`) for gzip, and `walkdir` for a sorted recursive walk.
//!
//! - **Compression** walks the source in lexical order and emits one entry per
//!   node. Entry names are paths relative to the source root, without a leading
//!   separator; a lone file is stored under its base name. File contents are
//!   streamed, and a file that shrinks while being read is an error so that a
//!   header never declares more bytes than were written.
//! - **Decompression** reads entries until end of stream. Directory entries are
//!   created idempotently, regular files are written with their recorded
//!   permission bits and modification time. Parent directories are created
//!   before every file, whether or not the archive carried a directory entry.
//!   Leading separators are ignored and `..` components are rejected, so every
//!   entry lands inside the destination root.
//! - A partially written target is left on disk when compression fails; the
//!   caller owns cleanup.
//!
//! ## Usage
//!
//! ```rust
//! use crate::common::archive::tar;
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let summary = tar::compress(Path::new("release/images"), Path::new("release/images.tar.gz"))?;
//! println!("{} files, {} bytes", summary.files, summary.bytes);
//!
//! for entry in tar::list_entries(Path::new("release/images.tar.gz"))? {
//!     println!("{} ({} bytes)", entry.name, entry.size);
//! }
//! # Ok(())
//! # }
//! ```
//!
use super::compression::{finish_gzip, gzip_reader, gzip_writer};
use crate::core::error::{RelpackError, Result};
use anyhow::{anyhow, Context};
use std::fs::{self, File, Metadata};
use std::io::{self, Read, Write};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Gzip level used when the caller does not pick one.
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

/// Counts of what went into (or came out of) an archive.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveSummary {
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
}

/// Entry types the codec distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    /// Links, devices and other types, which are listed but never extracted.
    Other,
}

/// Header fields of one record inside a tar stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path as stored in the archive.
    pub name: String,
    pub kind: EntryKind,
    pub size: u64,
    /// Permission bits (`0o7777` mask).
    pub mode: u32,
    /// Modification time in seconds since the Unix epoch.
    pub modified: u64,
}

/// # Compress Path (`compress`)
///
/// Archives `source` into a gzipped tarball at `target` using the default
/// compression level. See `compress_with_level`.
pub fn compress(source: &Path, target: &Path) -> Result<ArchiveSummary> {
    compress_with_level(source, target, DEFAULT_COMPRESSION_LEVEL)
}

/// # Compress Path With Level (`compress_with_level`)
///
/// Creates (or truncates) `target` and writes a gzipped tar stream holding
/// `source`.
///
/// ## Arguments
///
/// * `source` - A regular file or a directory. Must exist.
/// * `target` - Archive path. Its parent directory must exist.
/// * `level` - Gzip level, 0-9.
///
/// ## Returns
///
/// * `Result<ArchiveSummary>` - Number of files, directories and payload bytes written.
///
/// ## Errors
///
/// Returns an `Err` if:
/// - `source` does not exist, cannot be read, or is neither a file nor a directory.
/// - `target` cannot be created.
/// - A file changes size while it is being archived.
/// - Finishing the tar or gzip stream fails.
///
/// The partially written `target` is not removed on error.
pub fn compress_with_level(source: &Path, target: &Path, level: u32) -> Result<ArchiveSummary> {
    let metadata = fs::metadata(source)
        .with_context(|| format!("Failed to read archive source {}", source.display()))?;
    if !metadata.is_dir() && !metadata.is_file() {
        anyhow::bail!(RelpackError::FileSystem(format!(
            "Archive source {} is neither a regular file nor a directory",
            source.display()
        )));
    }

    info!(
        "Compressing {} into {} (level {})",
        source.display(),
        target.display(),
        level
    );
    let mut builder = Builder::new(gzip_writer(target, level)?);

    let summary = if metadata.is_dir() {
        append_tree(&mut builder, source, target)?
    } else {
        let name = source.file_name().ok_or_else(|| {
            anyhow!(RelpackError::FileSystem(format!(
                "Archive source {} has no file name",
                source.display()
            )))
        })?;
        let bytes = append_file(&mut builder, source, Path::new(name), &metadata)?;
        ArchiveSummary {
            files: 1,
            directories: 0,
            bytes,
        }
    };

    let encoder = builder
        .into_inner()
        .context("Failed to finalize tar archive structure")?;
    finish_gzip(encoder)?;

    info!(
        "Wrote {} ({} files, {} directories, {} bytes)",
        target.display(),
        summary.files,
        summary.directories,
        summary.bytes
    );
    Ok(summary)
}

/// Appends every descendant of `root` in sorted walk order.
fn append_tree<W: Write>(
    builder: &mut Builder<W>,
    root: &Path,
    target: &Path,
) -> Result<ArchiveSummary> {
    let mut summary = ArchiveSummary::default();
    // Compared after resolving `..` and symlinks, so the archive being written
    // is skipped however either path was spelled.
    let canonical_root = fs::canonicalize(root)
        .with_context(|| format!("Failed to resolve archive source {}", root.display()))?;
    let canonical_target = fs::canonicalize(target)
        .with_context(|| format!("Failed to resolve archive target {}", target.display()))?;

    for node in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let node = node.with_context(|| format!("Failed to walk {}", root.display()))?;
        let path = node.path();
        let relative = path
            .strip_prefix(root)
            .with_context(|| format!("{} is outside {}", path.display(), root.display()))?;
        if canonical_root.join(relative) == canonical_target {
            debug!("Skipping {}: it is the archive being written", path.display());
            continue;
        }
        let metadata = node
            .metadata()
            .with_context(|| format!("Failed to read metadata for {}", path.display()))?;

        if metadata.is_dir() {
            let mut header = Header::new_gnu();
            header.set_metadata(&metadata);
            header.set_size(0);
            builder
                .append_data(&mut header, relative, io::empty())
                .with_context(|| format!("Failed to add directory {} to archive", path.display()))?;
            debug!("Archived directory {}", relative.display());
            summary.directories += 1;
        } else if metadata.is_file() {
            summary.bytes += append_file(builder, path, relative, &metadata)?;
            summary.files += 1;
        } else {
            warn!(
                "Skipping {}: not a regular file or directory",
                path.display()
            );
        }
    }
    Ok(summary)
}

/// Appends one regular file under `name`, streaming its contents.
fn append_file<W: Write>(
    builder: &mut Builder<W>,
    path: &Path,
    name: &Path,
    metadata: &Metadata,
) -> Result<u64> {
    let mut header = Header::new_gnu();
    header.set_metadata(metadata);
    let size = metadata.len();
    header.set_size(size);

    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    builder
        .append_data(&mut header, name, ExactSize::new(file, size))
        .with_context(|| format!("Failed to add file {} to archive", path.display()))?;
    debug!("Archived file {} ({} bytes)", name.display(), size);
    Ok(size)
}

/// Reader yielding exactly `remaining` bytes, failing if the source ends early.
struct ExactSize<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> ExactSize<R> {
    fn new(inner: R, size: u64) -> Self {
        Self {
            inner,
            remaining: size,
        }
    }
}

impl<R: Read> Read for ExactSize<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }
        let max = usize::try_from(self.remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let read = self.inner.read(&mut buf[..max])?;
        if read == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("file shrank while archiving, {} bytes missing", self.remaining),
            ));
        }
        self.remaining -= read as u64;
        Ok(read)
    }
}

/// # Decompress Archive (`decompress`)
///
/// Unpacks the gzipped tarball at `archive_path` below `destination`,
/// consuming the whole stream.
///
/// ## Arguments
///
/// * `archive_path` - Path of an existing `.tar.gz` file.
/// * `destination` - Root directory for extracted entries. Created if missing.
///
/// ## Returns
///
/// * `Result<ArchiveSummary>` - Number of files and directories extracted.
///
/// ## Errors
///
/// Returns an `Err` if:
/// - The archive is missing (`RelpackError::FileSystem`).
/// - The gzip or tar framing is invalid (`RelpackError::Archive`).
/// - An entry path contains `..` (`RelpackError::InvalidArchiveEntry`).
/// - A directory or file cannot be created.
///
/// Entries extracted before the failure stay on disk.
pub fn decompress(archive_path: &Path, destination: &Path) -> Result<ArchiveSummary> {
    info!(
        "Decompressing {} into {}",
        archive_path.display(),
        destination.display()
    );
    let mut archive = Archive::new(gzip_reader(archive_path)?);
    archive.set_overwrite(true);
    archive.set_preserve_mtime(true);

    fs::create_dir_all(destination)
        .with_context(|| format!("Failed to create directory {}", destination.display()))?;

    let mut summary = ArchiveSummary::default();
    let entries = archive
        .entries()
        .map_err(|e| decode_error(archive_path, e))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| decode_error(archive_path, e))?;
        let name = entry
            .path()
            .map_err(|e| decode_error(archive_path, e))?
            .into_owned();
        let target = resolve_entry_path(destination, &name)?;

        match entry.header().entry_type() {
            EntryType::Directory => {
                fs::create_dir_all(&target).with_context(|| {
                    format!("Failed to create directory {}", target.display())
                })?;
                debug!("Extracted directory {}", name.display());
                summary.directories += 1;
            }
            EntryType::Regular | EntryType::Continuous => {
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create directory {}", parent.display())
                    })?;
                }
                let size = entry.size();
                entry
                    .unpack(&target)
                    .with_context(|| format!("Failed to extract {}", target.display()))?;
                debug!("Extracted file {} ({} bytes)", name.display(), size);
                summary.files += 1;
                summary.bytes += size;
            }
            other => {
                warn!(
                    "Skipping archive entry '{}' of unsupported type {:?}",
                    name.display(),
                    other
                );
            }
        }
    }

    info!(
        "Extracted {} files and {} directories from {}",
        summary.files,
        summary.directories,
        archive_path.display()
    );
    Ok(summary)
}

/// # List Archive Entries (`list_entries`)
///
/// Reads every header in the gzipped tarball without extracting anything.
pub fn list_entries(archive_path: &Path) -> Result<Vec<ArchiveEntry>> {
    let mut archive = Archive::new(gzip_reader(archive_path)?);
    let mut listed = Vec::new();

    for entry in archive
        .entries()
        .map_err(|e| decode_error(archive_path, e))?
    {
        let entry = entry.map_err(|e| decode_error(archive_path, e))?;
        let header = entry.header();
        let kind = match header.entry_type() {
            EntryType::Regular | EntryType::Continuous => EntryKind::File,
            EntryType::Directory => EntryKind::Directory,
            _ => EntryKind::Other,
        };
        listed.push(ArchiveEntry {
            name: entry
                .path()
                .map_err(|e| decode_error(archive_path, e))?
                .to_string_lossy()
                .into_owned(),
            kind,
            size: entry.size(),
            mode: header.mode().map_err(|e| decode_error(archive_path, e))? & 0o7777,
            modified: header.mtime().map_err(|e| decode_error(archive_path, e))?,
        });
    }
    Ok(listed)
}

/// Maps an archive entry name onto a path below `destination`.
fn resolve_entry_path(destination: &Path, name: &Path) -> Result<PathBuf> {
    let mut target = destination.to_path_buf();
    for component in name.components() {
        match component {
            Component::Normal(part) => target.push(part),
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                anyhow::bail!(RelpackError::InvalidArchiveEntry {
                    name: name.to_string_lossy().into_owned(),
                })
            }
        }
    }
    Ok(target)
}

fn decode_error(archive_path: &Path, err: io::Error) -> anyhow::Error {
    anyhow!(RelpackError::Archive(format!(
        "{}: {}",
        archive_path.display(),
        err
    )))
}
