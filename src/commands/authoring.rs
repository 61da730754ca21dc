use std::io;
use std::path::PathBuf;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::error::{NotesError, Result};
use crate::filesystem::ContentRoot;
use crate::models::{ApiResult, AuthoringRequest, MkdirRequest, WriteRequest};
use crate::server::SharedState;

/// Applies one authoring request to the content root.
///
/// Validation happens before any filesystem access; the index is not
/// regenerated.
pub fn perform(content: &ContentRoot, request: AuthoringRequest) -> Result<PathBuf> {
    match request {
        AuthoringRequest::CreateDirectory { parent_path, name } => {
            content.create_directory(&parent_path, &name)
        }
        AuthoringRequest::CreateFile {
            parent_path,
            name,
            content: body,
        } => content.write_file(&parent_path, &name, &body),
    }
}

/// Converts an operation result into the endpoint response.
pub(crate) fn respond(result: Result<()>) -> (StatusCode, Json<ApiResult>) {
    match result {
        Ok(()) => (StatusCode::OK, Json(ApiResult::success())),
        Err(e) => {
            log::warn!("Authoring request failed: {}", e);
            (e.status_code(), Json(ApiResult::error(e.to_string())))
        }
    }
}

fn task_failed(e: tokio::task::JoinError) -> NotesError {
    NotesError::io("Background task failed", io::Error::other(e))
}

async fn run_request(state: SharedState, request: AuthoringRequest) -> Result<()> {
    tokio::task::spawn_blocking(move || perform(&state.content, request).map(|_| ()))
        .await
        .map_err(task_failed)?
}

/// Regenerates the notes index.
///
/// Concurrent calls are serialized so index writes never interleave.
pub async fn regenerate_index(State(state): State<SharedState>) -> (StatusCode, Json<ApiResult>) {
    let _guard = state.regenerate_lock.lock().await;
    let builder = state.index.clone();
    let result = tokio::task::spawn_blocking(move || builder.regenerate())
        .await
        .map_err(task_failed)
        .and_then(|r| r);
    respond(result.map(|_| ()))
}

/// Creates a folder: `{folderPath, folderName}`.
pub async fn make_directory(
    State(state): State<SharedState>,
    payload: std::result::Result<Json<MkdirRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiResult>) {
    match payload {
        Ok(Json(request)) => respond(run_request(state, request.into()).await),
        Err(rejection) => bad_request(rejection),
    }
}

/// Creates or overwrites a note: `{folderPath, fileName, content}`.
pub async fn write_file(
    State(state): State<SharedState>,
    payload: std::result::Result<Json<WriteRequest>, JsonRejection>,
) -> (StatusCode, Json<ApiResult>) {
    match payload {
        Ok(Json(request)) => respond(run_request(state, request.into()).await),
        Err(rejection) => bad_request(rejection),
    }
}

fn bad_request(rejection: JsonRejection) -> (StatusCode, Json<ApiResult>) {
    log::warn!("Rejected authoring payload: {}", rejection.body_text());
    (
        StatusCode::BAD_REQUEST,
        Json(ApiResult::error(rejection.body_text())),
    )
}
