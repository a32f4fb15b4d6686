//! # imagebump-sync
//!
//! The repository mutation pipeline: manifest discovery, image retagging,
//! dirty-checked atomic writes, and the git commit/push transaction.
//!
//! Call [`ImageUpdater::update_image_version`] with a [`GitCheckout`] to run
//! one full update, or [`diff_manifests`] to preview one without side effects.

pub mod diff;
pub mod error;
pub mod git;
pub mod manifest;
pub mod mutator;
pub mod scanner;
pub mod updater;
pub mod writer;

pub use diff::{diff_manifests, DiffReport, FileDiff};
pub use error::{GitError, UpdateError};
pub use git::{commit_message, GitCheckout, Repository};
pub use manifest::{retag_text, Manifest, Retagged};
pub use mutator::{retag, ImageChange, Mutation};
pub use scanner::{relative_path, scan_manifests};
pub use updater::{ImageUpdater, UpdateFailure, UpdateSuccess};
pub use writer::{retag_file, retag_repository, RetagReport, WriteResult};
