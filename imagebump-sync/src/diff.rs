//! Dry-run unified diff support for `imagebump diff`.

use std::path::{Path, PathBuf};

use similar::TextDiff;

use imagebump_core::{ImageTarget, SkippedFile};

use crate::error::{io_err, parse_err};
use crate::manifest::retag_text;
use crate::scanner::{relative_path, scan_manifests};
use crate::UpdateError;

/// A single manifest diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub path: PathBuf,
    pub unified_diff: String,
}

/// Diffs for every manifest an update would rewrite.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DiffReport {
    pub diffs: Vec<FileDiff>,
    pub skipped: Vec<SkippedFile>,
}

/// Compute what an update to `target` would write under `root`.
///
/// No files are written and no git commands are run.
pub fn diff_manifests(root: &Path, target: &ImageTarget) -> Result<DiffReport, UpdateError> {
    let mut report = DiffReport::default();
    for path in scan_manifests(root)? {
        match diff_file(root, &path, target) {
            Ok(Some(diff)) => report.diffs.push(diff),
            Ok(None) => {}
            Err(err) => report.skipped.push(SkippedFile {
                path: relative_path(root, &path),
                reason: err.to_string(),
            }),
        }
    }
    Ok(report)
}

fn diff_file(
    root: &Path,
    path: &Path,
    target: &ImageTarget,
) -> Result<Option<FileDiff>, UpdateError> {
    let existing = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let retagged = retag_text(&existing, target).map_err(|e| parse_err(path, e))?;
    let Some(rendered) = retagged.content else {
        return Ok(None);
    };

    let relative = relative_path(root, path);
    let old_header = format!("a/{relative}");
    let new_header = format!("b/{relative}");
    let unified = TextDiff::from_lines(&existing, &rendered)
        .unified_diff()
        .header(&old_header, &new_header)
        .context_radius(3)
        .to_string();

    Ok(Some(FileDiff {
        path: path.to_path_buf(),
        unified_diff: unified,
    }))
}
