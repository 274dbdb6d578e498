//! Snapshot source acquisition
//!
//! Resolves an operator-supplied source (a snapshot directory or a
//! compressed `.tar.zst` archive) to a readable directory. Archive
//! extraction lands in a temp directory owned by the returned guard, so
//! cleanup happens on every exit path including errors and cancellation.

use crate::error::{Result, StorediffError};
use crate::progress::create_file_progress;
use crate::snapshot::MANIFEST_FILE;
use std::fs::File;
use std::path::{Path, PathBuf};
use tar::{Archive, Builder};
use tempfile::TempDir;
use walkdir::WalkDir;
use zstd::{Decoder, Encoder};

/// Classified snapshot source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    /// Snapshot directory used in place.
    Directory(PathBuf),
    /// Compressed archive extracted before use.
    Archive(PathBuf),
}

impl DataSource {
    /// Classifies a source string. Directories are used as-is; regular
    /// files must be `.tar.zst` archives.
    pub fn parse(source: &str) -> Result<Self> {
        let path = Path::new(source);
        if !path.exists() {
            return Err(StorediffError::acquisition(format!(
                "source does not exist: {}",
                source
            )));
        }
        if path.is_dir() {
            return Ok(Self::Directory(path.to_path_buf()));
        }
        if source.ends_with(".tar.zst") {
            return Ok(Self::Archive(path.to_path_buf()));
        }
        Err(StorediffError::acquisition(format!(
            "unsupported source type: {} (expected a directory or a .tar.zst archive)",
            source
        )))
    }
}

/// A snapshot directory ready to open, holding its extraction temp dir
/// alive for as long as the directory is in use.
#[derive(Debug)]
pub struct AcquiredSnapshot {
    path: PathBuf,
    _tempdir: Option<TempDir>,
}

impl AcquiredSnapshot {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Resolves a source to a readable snapshot directory, extracting archives
/// into a fresh temp directory under the system temp root.
pub fn acquire(source: &DataSource) -> Result<AcquiredSnapshot> {
    acquire_in(source, None)
}

/// Like [`acquire`], but extraction lands under `parent` when given.
/// Used by the server to keep all of a request's scratch space inside one
/// per-request directory.
pub fn acquire_in(source: &DataSource, parent: Option<&Path>) -> Result<AcquiredSnapshot> {
    match source {
        DataSource::Directory(path) => Ok(AcquiredSnapshot {
            path: path.clone(),
            _tempdir: None,
        }),
        DataSource::Archive(path) => {
            let mut builder = tempfile::Builder::new();
            builder.prefix("storediff-extract-");
            let tempdir = match parent {
                Some(parent) => builder.tempdir_in(parent)?,
                None => builder.tempdir()?,
            };

            extract_archive(path, tempdir.path())?;
            let root = locate_snapshot_root(tempdir.path())?;

            log::info!("extracted {} to {}", path.display(), root.display());
            Ok(AcquiredSnapshot {
                path: root,
                _tempdir: Some(tempdir),
            })
        }
    }
}

/// Extracts a `.tar.zst` archive into `dest`.
fn extract_archive(archive_path: &Path, dest: &Path) -> Result<()> {
    let archive_file = File::open(archive_path)?;
    let file_size = archive_file.metadata()?.len();
    let progress = create_file_progress(file_size, "Extracting archive");

    let decoder = Decoder::new(archive_file)
        .map_err(|e| StorediffError::archive(format!("{}: {}", archive_path.display(), e)))?;
    let mut archive = Archive::new(decoder);

    let mut processed = 0u64;
    for entry in archive
        .entries()
        .map_err(|e| StorediffError::archive(e.to_string()))?
    {
        let mut entry = entry.map_err(|e| StorediffError::archive(e.to_string()))?;
        // unpack_in rejects entries that would escape dest
        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| StorediffError::archive(e.to_string()))?;
        if !unpacked {
            let path = entry.path().map(|p| p.display().to_string()).unwrap_or_default();
            return Err(StorediffError::archive(format!(
                "archive entry escapes extraction root: {}",
                path
            )));
        }

        processed += entry.header().size().unwrap_or(0);
        progress.set_position(processed.min(file_size));
    }

    progress.finish_and_clear();
    Ok(())
}

/// Finds the directory containing the snapshot manifest inside an
/// extracted tree. Archives commonly wrap the snapshot in a single
/// top-level directory.
fn locate_snapshot_root(dest: &Path) -> Result<PathBuf> {
    if dest.join(MANIFEST_FILE).exists() {
        return Ok(dest.to_path_buf());
    }

    for entry in WalkDir::new(dest).min_depth(1).max_depth(3) {
        let entry = entry?;
        if entry.file_type().is_file() && entry.file_name() == MANIFEST_FILE {
            return Ok(entry
                .path()
                .parent()
                .expect("manifest file has a parent")
                .to_path_buf());
        }
    }

    Err(StorediffError::acquisition(format!(
        "no {} found in extracted archive",
        MANIFEST_FILE
    )))
}

/// Packs a snapshot directory into a `.tar.zst` archive.
pub fn pack_snapshot(dir: &Path, archive_path: &Path) -> Result<()> {
    if !dir.join(MANIFEST_FILE).exists() {
        return Err(StorediffError::invalid_input(format!(
            "{} is not a snapshot directory (no {})",
            dir.display(),
            MANIFEST_FILE
        )));
    }

    let archive_file = File::create(archive_path)?;
    let encoder = Encoder::new(archive_file, 3)
        .map_err(|e| StorediffError::archive(e.to_string()))?;

    let mut builder = Builder::new(encoder);
    builder
        .append_dir_all(".", dir)
        .map_err(|e| StorediffError::archive(e.to_string()))?;
    let encoder = builder
        .into_inner()
        .map_err(|e| StorediffError::archive(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| StorediffError::archive(e.to_string()))?;

    log::info!("packed {} into {}", dir.display(), archive_path.display());
    Ok(())
}
