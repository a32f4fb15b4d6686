//! Error types for imagebump-sync.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use thiserror::Error;

/// Failures of a single `git` invocation.
#[derive(Debug, Error)]
pub enum GitError {
    /// The `git` binary could not be started.
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// `git` ran and exited unsuccessfully.
    #[error("`{command}` failed ({status}): {stderr}")]
    Failed {
        command: String,
        status: ExitStatus,
        stderr: String,
    },

    /// A network-bound command did not finish in time and was killed.
    #[error("`{command}` timed out after {}s", .after.as_secs())]
    Timeout { command: String, after: Duration },

    /// `git rev-parse HEAD` returned nothing after a commit.
    #[error("commit succeeded but no commit id could be read")]
    EmptyCommitId,
}

/// All errors that can arise from an image update.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Mandatory request fields were missing or empty.
    #[error("{0}")]
    Validation(String),

    /// A git operation failed; `stage` names the pipeline step.
    #[error("git {stage} failed: {source}")]
    Sync {
        stage: &'static str,
        #[source]
        source: GitError,
    },

    /// The repository root could not be read.
    #[error("cannot scan {path}: {source}")]
    Scan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A manifest could not be parsed or re-serialized.
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The scan finished without any manifest referencing the image.
    #[error("No YAML files found containing image: {image}")]
    NoMatch { image: String },

    /// A blocking task panicked or was cancelled.
    #[error("background task failed: {0}")]
    Task(String),
}

impl UpdateError {
    /// True for failures caused by the request itself rather than the service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, UpdateError::Validation(_) | UpdateError::NoMatch { .. })
    }

    /// Message reported to callers in a failure result.
    pub fn result_message(&self) -> String {
        match self {
            UpdateError::Validation(_) | UpdateError::NoMatch { .. } => self.to_string(),
            other => format!("Error: {other}"),
        }
    }
}

/// Convenience constructor for [`UpdateError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> UpdateError {
    UpdateError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`UpdateError::Parse`].
pub(crate) fn parse_err(path: impl Into<PathBuf>, source: serde_yaml::Error) -> UpdateError {
    UpdateError::Parse {
        path: path.into(),
        source,
    }
}
