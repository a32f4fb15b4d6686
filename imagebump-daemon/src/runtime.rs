use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::broadcast;

use imagebump_core::{ServiceConfig, UpdateRequest, UpdateResult};
use imagebump_sync::{GitCheckout, ImageUpdater, Repository};

use crate::error::{io_err, DaemonError};
use crate::http::router;

/// Start the service and block the current thread until it exits.
pub fn start_blocking(config: ServiceConfig) -> Result<(), DaemonError> {
    init_tracing(config.log_json);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(config))
}

/// Run a single update against the configured checkout without serving HTTP.
pub fn update_blocking(
    config: &ServiceConfig,
    request: &UpdateRequest,
) -> Result<UpdateResult, DaemonError> {
    init_tracing(config.log_json);
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    let updater = ImageUpdater::new(GitCheckout::from_config(config));
    Ok(runtime.block_on(updater.update_image_version(request)))
}

/// Bind the configured port and serve until ctrl-c.
pub async fn run(config: ServiceConfig) -> Result<(), DaemonError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| DaemonError::Bind { addr, source })?;
    let updater = Arc::new(ImageUpdater::new(GitCheckout::from_config(&config)));

    let (shutdown_tx, _) = broadcast::channel::<()>(4);

    let server_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            let result = serve(listener, updater, async move {
                let _ = shutdown_rx.recv().await;
            })
            .await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        let mut shutdown_rx = shutdown.subscribe();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Runtime(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (server_result, signal_result) = tokio::join!(server_handle, signal_handle);
    handle_join("http_server", server_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Serve the router on `listener` until `shutdown` resolves.
pub async fn serve<R, F>(
    listener: TcpListener,
    updater: Arc<ImageUpdater<R>>,
    shutdown: F,
) -> Result<(), DaemonError>
where
    R: Repository + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let local = listener.local_addr().map_err(DaemonError::Serve)?;
    tracing::info!(
        addr = %local,
        repo = %updater.repository().root().display(),
        "imagebump listening"
    );
    axum::serve(listener, router(updater))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(DaemonError::Serve)?;
    tracing::info!("HTTP server stopped");
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Runtime(format!("{task} task join failure: {err}"))),
    }
}

/// Install the global subscriber on stderr. `RUST_LOG` overrides the `info`
/// default.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn join_failure_is_reported_with_task_name() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<(), DaemonError>(())
        });
        handle.abort();
        let err = handle_join("http_server", handle.await).unwrap_err();
        assert!(err.to_string().contains("http_server task join failure"), "{err}");
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let tmp = tempfile::TempDir::new().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let updater = Arc::new(ImageUpdater::new(GitCheckout::new(
            tmp.path(),
            imagebump_core::CommitAuthor::default(),
        )));

        let served = tokio::time::timeout(
            Duration::from_secs(5),
            serve(listener, updater, async {}),
        )
        .await
        .expect("server did not stop");
        assert!(served.is_ok());
    }
}
