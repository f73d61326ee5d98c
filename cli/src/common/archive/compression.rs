//! # relpack Compression Utilities (`common::archive::compression`)
//!
//! File: cli/src/common/archive/compression.rs
//!
//! ## Overview
//!
//! Thin gzip layer used by the tar codec. Archives are always streamed
//! through a buffered file handle so memory stays bounded regardless of
//! archive size.
//!
//! ## Architecture
//!
//! - `gzip_writer` wraps a freshly created file in a `flate2` encoder.
//! - `finish_gzip` writes the gzip trailer and flushes everything to disk.
//! - `gzip_reader` wraps an opened file in a `flate2` decoder.
//!
use crate::core::error::{RelpackError, Result};
use anyhow::{anyhow, Context};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Buffered gzip encoder over a file.
pub type GzFileWriter = GzEncoder<BufWriter<File>>;
/// Buffered gzip decoder over a file.
pub type GzFileReader = GzDecoder<BufReader<File>>;

/// Creates (or truncates) `path` and returns a gzip encoder writing to it.
///
/// # Errors
///
/// Returns an `Err` if `level` is above 9 or the file cannot be created
/// (missing parent directory, permissions, path is a directory).
pub fn gzip_writer(path: &Path, level: u32) -> Result<GzFileWriter> {
    if level > 9 {
        anyhow::bail!(RelpackError::Config(format!(
            "Compression level {} is out of range (0-9).",
            level
        )));
    }
    let file = File::create(path)
        .with_context(|| format!("Failed to create archive file {}", path.display()))?;
    Ok(GzEncoder::new(BufWriter::new(file), Compression::new(level)))
}

/// Writes the gzip trailer and flushes the underlying file.
pub fn finish_gzip(encoder: GzFileWriter) -> Result<()> {
    let mut writer = encoder
        .finish()
        .context("Failed to finish gzip compression stream")?;
    writer.flush().context("Failed to flush archive file")?;
    Ok(())
}

/// Opens `path` and returns a gzip decoder reading from it.
pub fn gzip_reader(path: &Path) -> Result<GzFileReader> {
    let file = File::open(path).map_err(|e| {
        anyhow!(RelpackError::FileSystem(format!(
            "Failed to open archive {}: {}",
            path.display(),
            e
        )))
    })?;
    Ok(GzDecoder::new(BufReader::new(file)))
}
