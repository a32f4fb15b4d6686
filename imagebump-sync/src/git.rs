//! Repository synchronization over a local git checkout.
//!
//! [`GitCheckout`] shells out to the system `git` binary through
//! [`tokio::process::Command`]. Network-bound commands (`pull`, `push`) run
//! under a timeout and the child is killed when it expires. Author identity
//! is injected through `GIT_AUTHOR_*` / `GIT_COMMITTER_*` so the checkout's
//! own config is never modified.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use imagebump_core::{CommitAuthor, ImageTarget, ServiceConfig};

use crate::error::GitError;

/// Operations the update pipeline needs from a checkout.
pub trait Repository: Send + Sync {
    /// Working-tree root that manifests are scanned under.
    fn root(&self) -> &Path;

    /// Bring the checkout up to date with its upstream.
    fn sync(&self) -> impl Future<Output = Result<(), GitError>> + Send;

    /// Stage everything, commit, push, and return the new commit id.
    fn commit_and_push(
        &self,
        target: &ImageTarget,
        files_updated: &[String],
    ) -> impl Future<Output = Result<String, GitError>> + Send;
}

/// Commit message naming the image, the version, and every updated file.
pub fn commit_message(target: &ImageTarget, files_updated: &[String]) -> String {
    let files = files_updated
        .iter()
        .map(|f| format!("- {f}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Update {} to version {}\n\nUpdated files:\n{files}",
        target.image(),
        target.version()
    )
}

// ---------------------------------------------------------------------------
// GitCheckout
// ---------------------------------------------------------------------------

/// A git working directory the service owns exclusively.
#[derive(Debug, Clone)]
pub struct GitCheckout {
    root: PathBuf,
    author: CommitAuthor,
    network_timeout: Duration,
    revert_on_failure: bool,
}

impl GitCheckout {
    pub fn new(root: impl Into<PathBuf>, author: CommitAuthor) -> Self {
        Self {
            root: root.into(),
            author,
            network_timeout: Duration::from_secs(imagebump_core::config::DEFAULT_GIT_TIMEOUT_SECS),
            revert_on_failure: true,
        }
    }

    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.repo_path.clone(), config.author.clone())
            .with_network_timeout(config.git_timeout())
            .with_revert_on_failure(config.revert_on_failure)
    }

    pub fn with_network_timeout(mut self, timeout: Duration) -> Self {
        self.network_timeout = timeout;
        self
    }

    pub fn with_revert_on_failure(mut self, revert: bool) -> Self {
        self.revert_on_failure = revert;
        self
    }

    /// Current `HEAD` commit id.
    pub async fn head(&self) -> Result<String, GitError> {
        let id = self.git(&["rev-parse", "HEAD"], None, &[]).await?;
        let id = id.trim().to_string();
        if id.is_empty() {
            return Err(GitError::EmptyCommitId);
        }
        Ok(id)
    }

    async fn publish(
        &self,
        target: &ImageTarget,
        files_updated: &[String],
    ) -> Result<String, GitError> {
        self.git(&["add", "--all"], None, &[]).await?;

        let message = commit_message(target, files_updated);
        let identity = [
            ("GIT_AUTHOR_NAME", self.author.name.as_str()),
            ("GIT_AUTHOR_EMAIL", self.author.email.as_str()),
            ("GIT_COMMITTER_NAME", self.author.name.as_str()),
            ("GIT_COMMITTER_EMAIL", self.author.email.as_str()),
        ];
        self.git(&["commit", "--no-verify", "-m", &message], None, &identity)
            .await?;

        let commit_id = self.head().await?;
        self.git(&["push"], Some(self.network_timeout), &[]).await?;
        tracing::info!("committed and pushed {commit_id}");
        Ok(commit_id)
    }

    /// Discard everything since `head`: staged, unstaged, and local commits.
    async fn reset_to(&self, head: &str) {
        match self.git(&["reset", "--hard", head], None, &[]).await {
            Ok(_) => tracing::warn!("reset checkout to {head} after failed publish"),
            Err(err) => tracing::error!("could not reset checkout to {head}: {err}"),
        }
    }

    async fn git(
        &self,
        args: &[&str],
        timeout: Option<Duration>,
        env_vars: &[(&str, &str)],
    ) -> Result<String, GitError> {
        let label = format!("git {}", args.first().copied().unwrap_or_default());

        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(&self.root).args(args);
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        for (k, v) in env_vars {
            cmd.env(k, v);
        }
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!("running {label} in {}", self.root.display());

        let output = match timeout {
            Some(after) => tokio::time::timeout(after, cmd.output())
                .await
                .map_err(|_| GitError::Timeout {
                    command: label.clone(),
                    after,
                })?,
            None => cmd.output().await,
        }
        .map_err(|source| GitError::Spawn {
            command: label.clone(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let detail = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(GitError::Failed {
                command: label,
                status: output.status,
                stderr: detail,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Repository for GitCheckout {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn sync(&self) -> Result<(), GitError> {
        tracing::info!("pulling latest changes into {}", self.root.display());
        self.git(&["pull", "--ff-only"], Some(self.network_timeout), &[])
            .await?;
        Ok(())
    }

    async fn commit_and_push(
        &self,
        target: &ImageTarget,
        files_updated: &[String],
    ) -> Result<String, GitError> {
        let head_before = self.head().await?;
        match self.publish(target, files_updated).await {
            Ok(commit_id) => Ok(commit_id),
            Err(err) => {
                if self.revert_on_failure {
                    self.reset_to(&head_before).await;
                }
                Err(err)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
