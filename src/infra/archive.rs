//! Archive extraction
//!
//! Unpacks `.zip` and `.tar.gz` bundles. Extraction always targets a
//! staging directory next to the final location; the staged tree replaces
//! the final directory by rename only once it is complete, so an
//! interrupted run never leaves a half-written install behind.

use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;

use crate::error::ExtractError;
use crate::infra::filesystem;

/// Infix of the staging name a replaced install is parked under
const RETIRED_MARKER: &str = "old-";

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// PKZIP archive
    Zip,
    /// Gzip-compressed tarball
    TarGz,
}

impl ArchiveFormat {
    /// Detect the format from a file name or URL
    pub fn from_name(name: &str) -> Result<Self, ExtractError> {
        let lower = name.to_ascii_lowercase();
        let lower = lower.split(['?', '#']).next().unwrap_or_default();
        if lower.ends_with(".zip") {
            Ok(Self::Zip)
        } else if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Ok(Self::TarGz)
        } else {
            Err(ExtractError::UnsupportedFormat {
                name: name.to_string(),
            })
        }
    }
}

/// Extract `archive` into `dest`, creating `dest` if needed
///
/// Returns the number of files written.
pub fn extract(archive: &Path, format: ArchiveFormat, dest: &Path) -> Result<usize, ExtractError> {
    std::fs::create_dir_all(dest).map_err(|e| ExtractError::IoError {
        path: dest.to_path_buf(),
        error: e.to_string(),
    })?;

    let file = File::open(archive).map_err(|e| ExtractError::IoError {
        path: archive.to_path_buf(),
        error: e.to_string(),
    })?;

    let corrupt = |error: String| ExtractError::Corrupt {
        archive: archive.to_path_buf(),
        error,
    };

    match format {
        ArchiveFormat::Zip => {
            let mut zip = zip::ZipArchive::new(file).map_err(|e| corrupt(e.to_string()))?;
            zip.extract(dest).map_err(|e| corrupt(e.to_string()))?;
        }
        ArchiveFormat::TarGz => {
            let mut tarball = tar::Archive::new(GzDecoder::new(file));
            tarball.set_preserve_permissions(true);
            tarball.unpack(dest).map_err(|e| corrupt(e.to_string()))?;
        }
    }

    let files = walkdir::WalkDir::new(dest)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .count();

    tracing::debug!("Extracted {files} files into {}", dest.display());
    Ok(files)
}

/// Extract `archive` and atomically replace `target` with the result
///
/// The archive is unpacked into a staging sibling of `target` and checked
/// with `missing`, which lists required entries absent from a directory.
/// When the staged tree is incomplete but its only top-level entry is a
/// directory that is complete, that directory is installed instead. An
/// incomplete bundle fails with [`ExtractError::IncompleteLayout`] and
/// leaves `target` untouched.
///
/// Leftovers of an earlier interrupted run should be handled with
/// [`recover_interrupted`] first.
pub fn extract_replacing<F>(
    archive: &Path,
    format: ArchiveFormat,
    target: &Path,
    staging_prefix: &str,
    missing: F,
) -> Result<usize, ExtractError>
where
    F: Fn(&Path) -> Vec<String>,
{
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    let id = std::process::id();
    let staging = parent.join(format!("{staging_prefix}{id}"));
    let retired = parent.join(format!("{staging_prefix}{RETIRED_MARKER}{id}"));

    let io_err = |path: &Path, error: String| ExtractError::IoError {
        path: path.to_path_buf(),
        error,
    };

    filesystem::remove_dir_all(&staging).map_err(|e| io_err(&staging, e.to_string()))?;

    let staged = extract(archive, format, &staging)
        .and_then(|files| Ok((files, bundle_root(&staging, target, &missing)?)));
    let (files, root) = match staged {
        Ok(staged) => staged,
        Err(e) => {
            let _ = filesystem::remove_dir_all(&staging);
            return Err(e);
        }
    };

    if target.exists() {
        filesystem::rename(target, &retired).map_err(|e| io_err(target, e.to_string()))?;
    }
    if let Err(e) = filesystem::rename(&root, target) {
        // Put the previous install back so the tree is unchanged
        if retired.exists() {
            let _ = filesystem::rename(&retired, target);
        }
        let _ = filesystem::remove_dir_all(&staging);
        return Err(io_err(target, e.to_string()));
    }

    let _ = filesystem::remove_dir_all(&retired);
    let _ = filesystem::remove_dir_all(&staging);

    Ok(files)
}

/// Clean up after an extraction that was interrupted
///
/// A previous install that was moved aside but never replaced is moved back
/// to `target`; every other staging leftover is removed.
pub fn recover_interrupted(target: &Path, staging_prefix: &str) -> Result<(), ExtractError> {
    let parent = target.parent().unwrap_or_else(|| Path::new("."));
    let retired_prefix = format!("{staging_prefix}{RETIRED_MARKER}");

    if !target.exists() {
        let retired = filesystem::entries_with_prefix(parent, &retired_prefix)
            .into_iter()
            .find(|path| path.is_dir());
        if let Some(retired) = retired {
            tracing::info!(
                "Restoring {} from {}",
                target.display(),
                retired.display()
            );
            filesystem::rename(&retired, target).map_err(|e| ExtractError::IoError {
                path: retired.clone(),
                error: e.to_string(),
            })?;
        }
    }

    remove_stale_staging(parent, staging_prefix)
}

/// Remove staging leftovers of an interrupted extraction
fn remove_stale_staging(parent: &Path, staging_prefix: &str) -> Result<(), ExtractError> {
    for leftover in filesystem::entries_with_prefix(parent, staging_prefix) {
        tracing::info!("Removing leftover {}", leftover.display());
        let removed = if leftover.is_dir() {
            filesystem::remove_dir_all(&leftover)
        } else {
            filesystem::remove_file(&leftover)
        };
        removed.map_err(|e| ExtractError::IoError {
            path: leftover.clone(),
            error: e.to_string(),
        })?;
    }
    Ok(())
}

/// Pick the directory to install from `staging`
fn bundle_root<F>(staging: &Path, target: &Path, missing: &F) -> Result<PathBuf, ExtractError>
where
    F: Fn(&Path) -> Vec<String>,
{
    let absent = missing(staging);
    if absent.is_empty() {
        return Ok(staging.to_path_buf());
    }
    if let Some(inner) = single_top_level_dir(staging) {
        if missing(&inner).is_empty() {
            tracing::debug!("Unwrapping bundle directory {}", inner.display());
            return Ok(inner);
        }
    }
    Err(ExtractError::IncompleteLayout {
        dir: target.to_path_buf(),
        missing: absent,
    })
}

fn single_top_level_dir(dir: &Path) -> Option<PathBuf> {
    let mut entries = std::fs::read_dir(dir).ok()?.filter_map(Result::ok);
    let first = entries.next()?;
    if entries.next().is_some() || !first.file_type().ok()?.is_dir() {
        return None;
    }
    Some(first.path())
}
