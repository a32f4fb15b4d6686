pub mod diff;
pub mod scan;
pub mod serve;
pub mod update;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use imagebump_core::ServiceConfig;

/// Defaults, then `file`, then the environment, then `--repo-path`.
pub fn load_config(file: Option<&Path>, repo_path: Option<PathBuf>) -> Result<ServiceConfig> {
    let mut config = ServiceConfig::load(file).context("failed to load configuration")?;
    if let Some(path) = repo_path {
        config.repo_path = path;
    }
    Ok(config)
}
