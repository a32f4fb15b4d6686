//! `imagebump update <image> <version>`: run one update locally or via a
//! running service.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use imagebump_core::{UpdateRequest, UpdateResult};
use imagebump_daemon::update_blocking;

use super::load_config;

/// Arguments for `imagebump update`.
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Base image name, e.g. `registry/app`.
    pub image: String,

    /// New version tag.
    pub version: String,

    /// YAML config file; environment variables override it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Local checkout of the manifest repository.
    #[arg(long)]
    pub repo_path: Option<PathBuf>,

    /// POST the request to a running service instead of updating in-process.
    #[arg(long)]
    pub server: Option<String>,

    /// Emit the update result as JSON.
    #[arg(long)]
    pub json: bool,
}

impl UpdateArgs {
    pub fn run(self) -> Result<()> {
        let request = UpdateRequest::new(self.image, self.version);

        let result = match self.server.as_deref() {
            Some(server) => post_update(server, &request)?,
            None => {
                let config = load_config(self.config.as_deref(), self.repo_path)?;
                update_blocking(&config, &request).context("update run failed")?
            }
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&result).context("failed to serialize update result")?
            );
        } else {
            print_result(&result);
        }

        if !result.success {
            bail!("{}", result.message);
        }
        Ok(())
    }
}

fn post_update(server: &str, request: &UpdateRequest) -> Result<UpdateResult> {
    let url = format!("{}/update-image-version", server.trim_end_matches('/'));
    match ureq::post(&url).send_json(request) {
        Ok(response) => response
            .into_json::<UpdateResult>()
            .context("failed to decode update result"),
        Err(ureq::Error::Status(code, response)) => response
            .into_json::<UpdateResult>()
            .with_context(|| format!("server returned {code} without an update result")),
        Err(err) => Err(err).with_context(|| format!("failed to reach {url}")),
    }
}

fn print_result(result: &UpdateResult) {
    for skipped in &result.skipped_files {
        eprintln!(
            "{} skipped {}: {}",
            "warning:".yellow().bold(),
            skipped.path,
            skipped.reason
        );
    }

    if !result.success {
        return;
    }

    println!("{} {}", "✓".green().bold(), result.message);
    if let Some(commit) = result.commit_hash.as_deref() {
        println!("  commit {}", commit.bold());
    }
    for file in result.files_updated.iter().flatten() {
        println!("  - {file}");
    }
}
