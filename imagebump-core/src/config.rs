//! Service configuration.
//!
//! # Sources, lowest precedence first
//!
//! 1. Built-in defaults ([`ServiceConfig::default`]).
//! 2. An optional YAML file ([`ServiceConfig::load_at`]).
//! 3. Environment variables ([`ServiceConfig::apply_env`]).
//!
//! Command-line flags are applied on top by the binary.
//!
//! Every env-reading function has a `_with` form taking a lookup closure;
//! tests must use that form and never touch the process environment.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const ENV_REPO_PATH: &str = "REPO_LOCAL_PATH";
pub const ENV_AUTHOR_NAME: &str = "GIT_USER_NAME";
pub const ENV_AUTHOR_EMAIL: &str = "GIT_USER_EMAIL";
pub const ENV_PORT: &str = "PORT";
pub const ENV_GIT_TIMEOUT: &str = "IMAGEBUMP_GIT_TIMEOUT_SECS";
pub const ENV_REVERT_ON_FAILURE: &str = "IMAGEBUMP_REVERT_ON_FAILURE";
pub const ENV_LOG_JSON: &str = "IMAGEBUMP_LOG_JSON";

pub const DEFAULT_AUTHOR_NAME: &str = "imagebump";
pub const DEFAULT_AUTHOR_EMAIL: &str = "imagebump@localhost";
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_GIT_TIMEOUT_SECS: u64 = 120;

/// Identity recorded on commits made by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

impl Default for CommitAuthor {
    fn default() -> Self {
        Self {
            name: DEFAULT_AUTHOR_NAME.to_string(),
            email: DEFAULT_AUTHOR_EMAIL.to_string(),
        }
    }
}

/// Runtime configuration for the update service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Local git checkout the service mutates.
    pub repo_path: PathBuf,
    pub author: CommitAuthor,
    /// HTTP listen port.
    pub port: u16,
    /// Upper bound for network-bound git operations (pull, push).
    pub git_timeout_secs: u64,
    /// Reset the checkout to its pre-update HEAD when commit or push fails.
    pub revert_on_failure: bool,
    /// Emit JSON log lines instead of human-readable text.
    pub log_json: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            repo_path: PathBuf::from("."),
            author: CommitAuthor::default(),
            port: DEFAULT_PORT,
            git_timeout_secs: DEFAULT_GIT_TIMEOUT_SECS,
            revert_on_failure: true,
            log_json: false,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a YAML file. Missing keys take their defaults.
    pub fn load_at(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Defaults, then the optional file, then the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let base = match file {
            Some(path) => Self::load_at(path)?,
            None => Self::default(),
        };
        base.apply_env()
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env()
    }

    /// Override fields from the process environment.
    pub fn apply_env(self) -> Result<Self, ConfigError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Override fields from `lookup`. Empty values count as unset.
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get(ENV_REPO_PATH) {
            self.repo_path = PathBuf::from(path);
        }
        if let Some(name) = get(ENV_AUTHOR_NAME) {
            self.author.name = name;
        }
        if let Some(email) = get(ENV_AUTHOR_EMAIL) {
            self.author.email = email;
        }
        if let Some(port) = get(ENV_PORT) {
            self.port = parse_number(ENV_PORT, &port)?;
        }
        if let Some(secs) = get(ENV_GIT_TIMEOUT) {
            self.git_timeout_secs = parse_number(ENV_GIT_TIMEOUT, &secs)?;
        }
        if let Some(flag) = get(ENV_REVERT_ON_FAILURE) {
            self.revert_on_failure = parse_flag(ENV_REVERT_ON_FAILURE, &flag)?;
        }
        if let Some(flag) = get(ENV_LOG_JSON) {
            self.log_json = parse_flag(ENV_LOG_JSON, &flag)?;
        }
        Ok(self)
    }

    pub fn git_timeout(&self) -> Duration {
        Duration::from_secs(self.git_timeout_secs)
    }
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: err.to_string(),
    })
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected true/false".to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
