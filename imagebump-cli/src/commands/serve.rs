//! `imagebump serve`: run the HTTP service in the foreground.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use imagebump_daemon::start_blocking;

use super::load_config;

/// Arguments for `imagebump serve`.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// YAML config file; environment variables override it.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Local checkout of the manifest repository.
    #[arg(long)]
    pub repo_path: Option<PathBuf>,

    /// Listen port.
    #[arg(long)]
    pub port: Option<u16>,
}

impl ServeArgs {
    pub fn run(self) -> Result<()> {
        let mut config = load_config(self.config.as_deref(), self.repo_path)?;
        if let Some(port) = self.port {
            config.port = port;
        }
        start_blocking(config).context("service exited with error")
    }
}
