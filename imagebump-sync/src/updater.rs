//! Update orchestration: sync → scan → retag → commit and push.
//!
//! [`ImageUpdater`] owns the checkout and a gate that serializes whole
//! update runs. Concurrent callers queue on the gate; they never interleave
//! pulls, writes, or commits against the same working tree.

use std::sync::Arc;

use tokio::sync::Mutex;

use imagebump_core::{ImageTarget, SkippedFile, UpdateRequest, UpdateResult};

use crate::error::UpdateError;
use crate::git::Repository;
use crate::writer::retag_repository;

/// A successful update run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateSuccess {
    /// Relative paths of rewritten manifests, in scan order.
    pub files_updated: Vec<String>,
    pub commit_hash: String,
    pub skipped: Vec<SkippedFile>,
}

impl From<UpdateSuccess> for UpdateResult {
    fn from(success: UpdateSuccess) -> Self {
        UpdateResult::success(success.files_updated, success.commit_hash)
            .with_skipped(success.skipped)
    }
}

/// A failed update run, with any per-file diagnostics gathered before it.
#[derive(Debug)]
pub struct UpdateFailure {
    pub error: UpdateError,
    pub skipped: Vec<SkippedFile>,
}

impl From<UpdateError> for UpdateFailure {
    fn from(error: UpdateError) -> Self {
        Self {
            error,
            skipped: Vec::new(),
        }
    }
}

impl From<UpdateFailure> for UpdateResult {
    fn from(failure: UpdateFailure) -> Self {
        UpdateResult::failure(failure.error.result_message()).with_skipped(failure.skipped)
    }
}

/// Drives one repository through image updates, one at a time.
///
/// Once a run holds the gate it executes on its own task, so dropping the
/// caller's future never cuts a run short between the write and the commit.
#[derive(Debug)]
pub struct ImageUpdater<R> {
    repo: Arc<R>,
    gate: Arc<Mutex<()>>,
}

impl<R: Repository + 'static> ImageUpdater<R> {
    pub fn new(repo: R) -> Self {
        Self {
            repo: Arc::new(repo),
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Run an update and report the outcome. Never fails; errors become
    /// failure results.
    pub async fn update_image_version(&self, request: &UpdateRequest) -> UpdateResult {
        match self.try_update(request).await {
            Ok(success) => success.into(),
            Err(failure) => {
                tracing::error!("error updating image version: {}", failure.error);
                failure.into()
            }
        }
    }

    /// Run an update, keeping the error kind for callers that map it.
    ///
    /// A caller cancelled while queued on the gate leaves no trace. A caller
    /// cancelled after the gate was acquired detaches from a run that still
    /// completes, commit or revert included.
    pub async fn try_update(&self, request: &UpdateRequest) -> Result<UpdateSuccess, UpdateFailure> {
        let target = request
            .target()
            .map_err(|err| UpdateError::Validation(err.to_string()))?;

        let held = Arc::clone(&self.gate).lock_owned().await;
        let repo = Arc::clone(&self.repo);
        let run = tokio::spawn(async move {
            let _held = held;
            run_update(repo.as_ref(), target).await
        });

        run.await
            .map_err(|err| UpdateError::Task(err.to_string()))?
    }
}

/// One full pass: sync, scan and retag, then commit and push. The caller
/// holds the gate.
async fn run_update<R: Repository>(
    repo: &R,
    target: ImageTarget,
) -> Result<UpdateSuccess, UpdateFailure> {
    tracing::info!("starting image update: {target}");

    repo.sync().await.map_err(|source| UpdateError::Sync {
        stage: "pull",
        source,
    })?;

    let root = repo.root().to_path_buf();
    let report = {
        let root = root.clone();
        let target = target.clone();
        tokio::task::spawn_blocking(move || retag_repository(&root, &target, false))
            .await
            .map_err(|err| UpdateError::Task(err.to_string()))??
    };

    let files_updated = report.files_updated(&root);
    if files_updated.is_empty() {
        return Err(UpdateFailure {
            error: UpdateError::NoMatch {
                image: target.image().to_string(),
            },
            skipped: report.skipped,
        });
    }

    let commit_hash = match repo.commit_and_push(&target, &files_updated).await {
        Ok(commit_hash) => commit_hash,
        Err(source) => {
            return Err(UpdateFailure {
                error: UpdateError::Sync {
                    stage: "commit/push",
                    source,
                },
                skipped: report.skipped,
            })
        }
    };

    tracing::info!(
        "successfully updated {} files with commit: {commit_hash}",
        files_updated.len()
    );
    Ok(UpdateSuccess {
        files_updated,
        commit_hash,
        skipped: report.skipped,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tempfile::TempDir;

    use super::*;
    use crate::error::GitError;

    #[derive(Default)]
    struct FakeRepo {
        root: PathBuf,
        fail_pull: bool,
        fail_push: bool,
        commit_delay: Duration,
        pulls: AtomicUsize,
        commits: std::sync::Mutex<Vec<(String, Vec<String>)>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
    }

    impl FakeRepo {
        fn at(root: &Path) -> Self {
            Self {
                root: root.to_path_buf(),
                ..Self::default()
            }
        }

        fn commit_count(&self) -> usize {
            self.commits.lock().unwrap().len()
        }
    }

    fn refused(command: &str) -> GitError {
        GitError::Failed {
            command: command.to_string(),
            status: failed_status(),
            stderr: "fatal: could not read from remote repository".to_string(),
        }
    }

    #[cfg(unix)]
    fn failed_status() -> std::process::ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(1 << 8)
    }

    #[cfg(windows)]
    fn failed_status() -> std::process::ExitStatus {
        use std::os::windows::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(1)
    }

    impl Repository for FakeRepo {
        fn root(&self) -> &Path {
            &self.root
        }

        async fn sync(&self) -> Result<(), GitError> {
            self.pulls.fetch_add(1, Ordering::SeqCst);
            if self.fail_pull {
                return Err(refused("git pull"));
            }
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_active.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(())
        }

        async fn commit_and_push(
            &self,
            target: &ImageTarget,
            files_updated: &[String],
        ) -> Result<String, GitError> {
            tokio::time::sleep(self.commit_delay).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            if self.fail_push {
                return Err(refused("git push"));
            }
            let mut commits = self.commits.lock().unwrap();
            commits.push((target.reference(), files_updated.to_vec()));
            Ok(format!("c0ffee{}", commits.len()))
        }
    }

    fn seed(root: &Path) {
        fs::create_dir_all(root.join("apps")).unwrap();
        fs::write(root.join("apps/a.yaml"), "image: registry/app:1.0.0\n").unwrap();
        fs::write(root.join("apps/b.yaml"), "image: other/app:2.0.0\n").unwrap();
    }

    #[tokio::test]
    async fn matching_manifest_is_rewritten_committed_and_reported() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());
        let updater = ImageUpdater::new(FakeRepo::at(tmp.path()));

        let result = updater
            .update_image_version(&UpdateRequest::new("registry/app", "1.1.0"))
            .await;

        assert!(result.success, "{}", result.message);
        assert_eq!(result.files_updated, Some(vec!["apps/a.yaml".to_string()]));
        assert_eq!(result.commit_hash.as_deref(), Some("c0ffee1"));
        assert_eq!(
            fs::read_to_string(tmp.path().join("apps/a.yaml")).unwrap(),
            "image: registry/app:1.1.0\n"
        );
        assert_eq!(
            fs::read_to_string(tmp.path().join("apps/b.yaml")).unwrap(),
            "image: other/app:2.0.0\n"
        );
        let commits = updater.repository().commits.lock().unwrap().clone();
        assert_eq!(
            commits,
            vec![("registry/app:1.1.0".to_string(), vec!["apps/a.yaml".to_string()])]
        );
    }

    #[tokio::test]
    async fn no_match_is_a_failure_without_commit() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());
        let updater = ImageUpdater::new(FakeRepo::at(tmp.path()));

        let failure = updater
            .try_update(&UpdateRequest::new("nomatch/app", "9.9.9"))
            .await
            .unwrap_err();

        assert!(matches!(failure.error, UpdateError::NoMatch { .. }));
        assert!(failure.error.is_client_error());
        let result = UpdateResult::from(failure);
        assert!(!result.success);
        assert_eq!(result.message, "No YAML files found containing image: nomatch/app");
        assert_eq!(updater.repository().commit_count(), 0);
        assert_eq!(
            fs::read_to_string(tmp.path().join("apps/a.yaml")).unwrap(),
            "image: registry/app:1.0.0\n"
        );
    }

    #[tokio::test]
    async fn empty_version_has_no_side_effects() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());
        let updater = ImageUpdater::new(FakeRepo::at(tmp.path()));

        let result = updater
            .update_image_version(&UpdateRequest::new("registry/app", ""))
            .await;

        assert!(!result.success);
        assert_eq!(result.message, "Both image and version are required");
        assert_eq!(updater.repository().pulls.load(Ordering::SeqCst), 0);
        assert_eq!(updater.repository().commit_count(), 0);
    }

    #[tokio::test]
    async fn pull_failure_aborts_before_any_write() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());
        let updater = ImageUpdater::new(FakeRepo {
            fail_pull: true,
            ..FakeRepo::at(tmp.path())
        });

        let failure = updater
            .try_update(&UpdateRequest::new("registry/app", "1.1.0"))
            .await
            .unwrap_err();

        assert!(!failure.error.is_client_error());
        let result = UpdateResult::from(failure);
        assert!(result.message.starts_with("Error: git pull failed"), "{}", result.message);
        assert!(result.message.contains("could not read from remote"));
        assert_eq!(
            fs::read_to_string(tmp.path().join("apps/a.yaml")).unwrap(),
            "image: registry/app:1.0.0\n"
        );
    }

    #[tokio::test]
    async fn push_failure_is_reported_as_failure() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());
        let updater = ImageUpdater::new(FakeRepo {
            fail_push: true,
            ..FakeRepo::at(tmp.path())
        });

        let result = updater
            .update_image_version(&UpdateRequest::new("registry/app", "1.1.0"))
            .await;

        assert!(!result.success);
        assert!(result.message.contains("commit/push"), "{}", result.message);
        assert!(result.files_updated.is_none());
        assert!(result.commit_hash.is_none());
    }

    #[tokio::test]
    async fn unparseable_manifests_are_skipped_and_reported() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());
        fs::write(tmp.path().join("apps/broken.yaml"), "image: [unclosed\n").unwrap();
        let updater = ImageUpdater::new(FakeRepo::at(tmp.path()));

        let result = updater
            .update_image_version(&UpdateRequest::new("registry/app", "1.1.0"))
            .await;

        assert!(result.success);
        assert_eq!(result.skipped_files.len(), 1);
        assert_eq!(result.skipped_files[0].path, "apps/broken.yaml");
    }

    #[tokio::test]
    async fn concurrent_updates_are_serialized() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());
        let updater = Arc::new(ImageUpdater::new(FakeRepo::at(tmp.path())));

        let first = UpdateRequest::new("registry/app", "1.1.0");
        let second = UpdateRequest::new("registry/app", "1.2.0");
        let (a, b) = tokio::join!(
            updater.update_image_version(&first),
            updater.update_image_version(&second),
        );

        assert!(a.success && b.success, "{} / {}", a.message, b.message);
        assert_eq!(updater.repository().max_active.load(Ordering::SeqCst), 1);
        assert_eq!(updater.repository().commit_count(), 2);
    }

    #[tokio::test]
    async fn cancelled_caller_does_not_abandon_its_commit() {
        let tmp = TempDir::new().unwrap();
        seed(tmp.path());
        let updater = ImageUpdater::new(FakeRepo {
            commit_delay: Duration::from_millis(300),
            ..FakeRepo::at(tmp.path())
        });

        let first = UpdateRequest::new("registry/app", "1.1.0");
        let cancelled =
            tokio::time::timeout(Duration::from_millis(100), updater.update_image_version(&first))
                .await;
        assert!(cancelled.is_err(), "first run should still be committing");

        let second = updater
            .update_image_version(&UpdateRequest::new("other/app", "2.1.0"))
            .await;
        assert!(second.success, "{}", second.message);
        assert_eq!(second.files_updated, Some(vec!["apps/b.yaml".to_string()]));

        let commits = updater.repository().commits.lock().unwrap().clone();
        assert_eq!(
            commits,
            vec![
                ("registry/app:1.1.0".to_string(), vec!["apps/a.yaml".to_string()]),
                ("other/app:2.1.0".to_string(), vec!["apps/b.yaml".to_string()]),
            ]
        );
        assert_eq!(updater.repository().max_active.load(Ordering::SeqCst), 1);
        assert_eq!(
            fs::read_to_string(tmp.path().join("apps/a.yaml")).unwrap(),
            "image: registry/app:1.1.0\n"
        );
        assert_eq!(
            fs::read_to_string(tmp.path().join("apps/b.yaml")).unwrap(),
            "image: other/app:2.1.0\n"
        );
    }
}
