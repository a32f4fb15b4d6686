//! Manifest discovery.
//!
//! Walks the checkout depth-first, visiting each directory's entries sorted
//! by file name, and collects `.yaml` / `.yml` files. VCS metadata and
//! dependency directories are pruned without being descended into. Symbolic
//! links are never followed, so link cycles cannot occur.

use std::path::{Path, PathBuf};

use walkdir::{DirEntry, WalkDir};

use crate::error::UpdateError;

/// Directory names that are never descended into.
pub const EXCLUDED_DIRS: &[&str] = &[".git", "node_modules", ".hg", ".svn"];

/// File name suffixes recognised as manifests.
pub const MANIFEST_EXTENSIONS: &[&str] = &[".yaml", ".yml"];

/// Enumerate manifest files under `root` in a stable order.
///
/// Fails only when `root` itself cannot be read; unreadable entries further
/// down are logged and skipped.
pub fn scan_manifests(root: &Path) -> Result<Vec<PathBuf>, UpdateError> {
    std::fs::read_dir(root).map_err(|source| UpdateError::Scan {
        path: root.to_path_buf(),
        source,
    })?;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_excluded_dir(entry));

    let mut manifests = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                tracing::warn!("skipping unreadable entry during scan: {err}");
                continue;
            }
        };
        if entry.file_type().is_file() && is_manifest_name(entry.file_name()) {
            manifests.push(entry.into_path());
        }
    }

    tracing::debug!("found {} manifest(s) under {}", manifests.len(), root.display());
    Ok(manifests)
}

/// Path of `path` relative to `root`, `/`-separated.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_excluded_dir(entry: &DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| EXCLUDED_DIRS.contains(&name))
            .unwrap_or(false)
}

fn is_manifest_name(name: &std::ffi::OsStr) -> bool {
    name.to_str()
        .map(|name| MANIFEST_EXTENSIONS.iter().any(|ext| name.ends_with(ext)))
        .unwrap_or(false)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
