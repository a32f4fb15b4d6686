//! `imagebump diff <image> <version>`: unified diffs of what an update would
//! write. Nothing is written and git is never run.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use colored::Colorize;

use imagebump_core::UpdateRequest;
use imagebump_sync::diff_manifests;

use super::load_config;

/// Arguments for `imagebump diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    /// Base image name, e.g. `registry/app`.
    pub image: String,

    /// New version tag.
    pub version: String,

    /// Local checkout of the manifest repository.
    #[arg(long)]
    pub repo_path: Option<PathBuf>,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let config = load_config(None, self.repo_path)?;
        let target = UpdateRequest::new(self.image, self.version)
            .target()
            .map_err(|err| anyhow!(err))?;

        let report = diff_manifests(&config.repo_path, &target)
            .with_context(|| format!("diff failed for '{target}'"))?;

        for skipped in &report.skipped {
            eprintln!(
                "{} skipped {}: {}",
                "warning:".yellow().bold(),
                skipped.path,
                skipped.reason
            );
        }

        if report.diffs.is_empty() {
            println!("No changes for '{}'.", target.reference());
            return Ok(());
        }

        for diff in report.diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }

        Ok(())
    }
}
