//! Dirty-checked atomic manifest writer.
//!
//! ## `retag_file` protocol
//!
//! 1. Read the manifest.
//! 2. Parse, retag, and re-serialize it ([`retag_text`]).
//! 3. Skip if nothing was rewritten or the output equals the original bytes.
//! 4. Write to `<path>.imagebump.tmp`.
//! 5. Rename to final path (atomic on POSIX).
//!
//! A failed write or rename removes the tmp file, so a later stage-all commit
//! never picks it up.

use std::path::{Path, PathBuf};

use imagebump_core::{ImageTarget, SkippedFile};

use crate::error::{io_err, parse_err, UpdateError};
use crate::manifest::retag_text;
use crate::mutator::ImageChange;
use crate::scanner::{relative_path, scan_manifests};

// ---------------------------------------------------------------------------
// Write result
// ---------------------------------------------------------------------------

/// Outcome of retagging an individual manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteResult {
    /// File was rewritten with the new image reference(s).
    Written {
        path: PathBuf,
        changes: Vec<ImageChange>,
    },
    /// File does not reference the image, or already carries the version.
    Unchanged { path: PathBuf },
    /// Dry-run mode: the file *would* have been written.
    WouldWrite {
        path: PathBuf,
        changes: Vec<ImageChange>,
    },
}

impl WriteResult {
    pub fn path(&self) -> &Path {
        match self {
            WriteResult::Written { path, .. }
            | WriteResult::Unchanged { path }
            | WriteResult::WouldWrite { path, .. } => path,
        }
    }

    pub fn is_change(&self) -> bool {
        !matches!(self, WriteResult::Unchanged { .. })
    }
}

// ---------------------------------------------------------------------------
// retag_file
// ---------------------------------------------------------------------------

/// Retag a single manifest on disk, writing it back only when dirty.
pub fn retag_file(
    path: &Path,
    target: &ImageTarget,
    dry_run: bool,
) -> Result<WriteResult, UpdateError> {
    let tmp = PathBuf::from(format!("{}.imagebump.tmp", path.display()));
    retag_file_with_tmp(path, target, dry_run, &tmp)
}

fn retag_file_with_tmp(
    path: &Path,
    target: &ImageTarget,
    dry_run: bool,
    tmp: &Path,
) -> Result<WriteResult, UpdateError> {
    let original = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let retagged = retag_text(&original, target).map_err(|e| parse_err(path, e))?;

    let Some(content) = retagged.content else {
        tracing::debug!("unchanged: {}", path.display());
        return Ok(WriteResult::Unchanged {
            path: path.to_path_buf(),
        });
    };

    if dry_run {
        for change in &retagged.changes {
            tracing::debug!("[dry-run] would update image: {} -> {}", change.from, change.to);
        }
        tracing::info!("[dry-run] would write: {}", path.display());
        return Ok(WriteResult::WouldWrite {
            path: path.to_path_buf(),
            changes: retagged.changes,
        });
    }

    if let Err(e) = std::fs::write(tmp, &content) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(tmp, e));
    }
    if let Err(e) = std::fs::rename(tmp, path) {
        let _ = std::fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    for change in &retagged.changes {
        tracing::info!("updated image: {} -> {}", change.from, change.to);
    }
    tracing::info!("wrote: {}", path.display());
    Ok(WriteResult::Written {
        path: path.to_path_buf(),
        changes: retagged.changes,
    })
}

// ---------------------------------------------------------------------------
// retag_repository
// ---------------------------------------------------------------------------

/// Outcome of retagging every manifest under a root.
#[derive(Debug, Default)]
pub struct RetagReport {
    /// Per-file outcomes, in scan order.
    pub writes: Vec<WriteResult>,
    pub skipped: Vec<SkippedFile>,
}

impl RetagReport {
    /// Relative paths of files that were (or would be) rewritten.
    pub fn files_updated(&self, root: &Path) -> Vec<String> {
        self.writes
            .iter()
            .filter(|w| w.is_change())
            .map(|w| relative_path(root, w.path()))
            .collect()
    }
}

/// Scan `root` and retag every manifest in scan order.
///
/// Only a failure to read `root` aborts. Per-file read, parse, or write
/// errors are logged and collected into [`RetagReport::skipped`].
pub fn retag_repository(
    root: &Path,
    target: &ImageTarget,
    dry_run: bool,
) -> Result<RetagReport, UpdateError> {
    let mut report = RetagReport::default();
    for path in scan_manifests(root)? {
        match retag_file(&path, target, dry_run) {
            Ok(write) => report.writes.push(write),
            Err(err) => {
                tracing::warn!("skipping {}: {err}", path.display());
                report.skipped.push(SkippedFile {
                    path: relative_path(root, &path),
                    reason: err.to_string(),
                });
            }
        }
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
