//! HTTP surface of the service.
//!
//! Routes:
//! - `GET  /`                     - liveness text
//! - `POST /update-image-version` - run one image update, reply with an `UpdateResult`

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use imagebump_core::{UpdateRequest, UpdateResult};
use imagebump_sync::{ImageUpdater, Repository};

pub const LIVENESS_TEXT: &str = "imagebump is running!";

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the router over a shared updater.
pub fn router<R>(updater: Arc<ImageUpdater<R>>) -> Router
where
    R: Repository + 'static,
{
    Router::new()
        .route("/", get(handle_root))
        .route("/update-image-version", post(handle_update::<R>))
        .with_state(updater)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn handle_root() -> &'static str {
    LIVENESS_TEXT
}

/// `POST /update-image-version`
///
/// 200 on success, 400 for a malformed body, a missing field, or no matching
/// manifest, 500 for anything else.
async fn handle_update<R>(
    State(updater): State<Arc<ImageUpdater<R>>>,
    body: Result<Json<UpdateRequest>, JsonRejection>,
) -> impl IntoResponse
where
    R: Repository + 'static,
{
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "rejected update request body");
            let result = UpdateResult::failure(format!("Invalid request body: {}", rejection.body_text()));
            return (StatusCode::BAD_REQUEST, Json(result));
        }
    };

    tracing::info!(image = %request.image, version = %request.version, "received update request");

    match updater.try_update(&request).await {
        Ok(success) => {
            tracing::info!(
                commit = %success.commit_hash,
                files = success.files_updated.len(),
                "update published"
            );
            (StatusCode::OK, Json(UpdateResult::from(success)))
        }
        Err(failure) => {
            let status = if failure.error.is_client_error() {
                StatusCode::BAD_REQUEST
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            tracing::error!(status = status.as_u16(), error = %failure.error, "update failed");
            (status, Json(UpdateResult::from(failure)))
        }
    }
}
