//! Domain types for image tag updates.
//!
//! `UpdateRequest` and `UpdateResult` are the wire shapes exchanged with
//! callers (JSON, camelCase). `ImageTarget` is the validated form used by the
//! pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator between an image name and its version tag.
pub const VERSION_SEPARATOR: char = ':';

/// Returns the portion of an image reference before the first `:`.
///
/// `registry/app:1.0.0` → `registry/app`; a reference without a tag is
/// returned unchanged.
pub fn base_image(reference: &str) -> &str {
    match reference.split_once(VERSION_SEPARATOR) {
        Some((base, _)) => base,
        None => reference,
    }
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// Request to move every reference of `image` to `version`.
///
/// Missing fields decode as empty strings so they surface as validation
/// failures instead of decode errors.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub version: String,
}

impl UpdateRequest {
    pub fn new(image: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            version: version.into(),
        }
    }

    /// Validate the request and produce the target the pipeline works with.
    pub fn target(&self) -> Result<ImageTarget, InvalidRequest> {
        if self.image.trim().is_empty() || self.version.trim().is_empty() {
            return Err(InvalidRequest);
        }
        Ok(ImageTarget {
            image: self.image.clone(),
            version: self.version.clone(),
        })
    }
}

/// Returned by [`UpdateRequest::target`] when a mandatory field is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRequest;

impl fmt::Display for InvalidRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Both image and version are required")
    }
}

impl std::error::Error for InvalidRequest {}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// A validated image name / version pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageTarget {
    image: String,
    version: String,
}

impl ImageTarget {
    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// The full reference written into manifests: `{image}:{version}`.
    pub fn reference(&self) -> String {
        format!("{}{VERSION_SEPARATOR}{}", self.image, self.version)
    }

    /// True when `reference` names this image, ignoring its tag.
    ///
    /// Matching is exact and case-sensitive on the base name.
    pub fn matches(&self, reference: &str) -> bool {
        base_image(reference) == self.image
    }
}

impl fmt::Display for ImageTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.image, self.version)
    }
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// A manifest that was skipped because it could not be read, parsed, or
/// written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    /// Path relative to the repository root.
    pub path: String,
    pub reason: String,
}

/// Outcome of one update call, as returned to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_updated: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_files: Vec<SkippedFile>,
}

impl UpdateResult {
    pub fn success(files_updated: Vec<String>, commit_hash: impl Into<String>) -> Self {
        Self {
            success: true,
            message: format!("Successfully updated {} files", files_updated.len()),
            files_updated: Some(files_updated),
            commit_hash: Some(commit_hash.into()),
            skipped_files: Vec::new(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            files_updated: None,
            commit_hash: None,
            skipped_files: Vec::new(),
        }
    }

    pub fn with_skipped(mut self, skipped: Vec<SkippedFile>) -> Self {
        self.skipped_files = skipped;
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
