//! imagebump core library: domain types, service configuration, errors.
//!
//! - [`types`]: request/result shapes and the validated [`ImageTarget`]
//! - [`config`]: [`ServiceConfig`] loading from YAML and environment
//! - [`error`]: [`ConfigError`]

pub mod config;
pub mod error;
pub mod types;

pub use config::{CommitAuthor, ServiceConfig};
pub use error::ConfigError;
pub use types::{
    base_image, ImageTarget, InvalidRequest, SkippedFile, UpdateRequest, UpdateResult,
};
