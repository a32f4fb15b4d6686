//! HTTP service runtime: axum router over a shared `ImageUpdater`.

mod error;
pub mod http;
mod runtime;

pub use error::DaemonError;
pub use http::{router, LIVENESS_TEXT};
pub use runtime::{init_tracing, run, serve, start_blocking, update_blocking};
