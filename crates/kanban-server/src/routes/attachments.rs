use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use kanban_core::attachment::Attachment;
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::{blocking, AppError};
use crate::extract::{ApiPath, ApiQuery, UploadBody};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UploadParams {
    pub filename: String,
}

/// GET /api/boards/{board_id}/tasks/{task_id}/attachments
pub async fn list_attachments(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath((board_id, task_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let attachments = blocking(move || {
        store.board_for_user(&user, board_id)?;
        store.list_attachments(board_id, task_id)
    })
    .await?;
    Ok(Json(serde_json::json!({ "attachments": attachments })))
}

/// POST /api/boards/{board_id}/tasks/{task_id}/attachments?filename=NAME
///
/// The request body is the raw file. The blob is stored first and the
/// metadata row second; if the row cannot be written the blob is removed.
pub async fn upload_attachment(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath((board_id, task_id)): ApiPath<(Uuid, Uuid)>,
    ApiQuery(params): ApiQuery<UploadParams>,
    headers: HeaderMap,
    UploadBody(body): UploadBody,
) -> Result<impl IntoResponse, AppError> {
    let limit = app.config.storage.max_attachment_bytes;
    let size = body.len() as u64;
    if size > limit {
        return Err(AppError::too_large(limit));
    }
    if body.is_empty() {
        return Err(AppError::bad_request("attachment body is empty"));
    }
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
        .map(str::to_string)
        .unwrap_or_else(|| {
            mime_guess::from_path(&params.filename)
                .first_or_octet_stream()
                .to_string()
        });

    let store = app.store.clone();
    let blobs = app.blobs.clone();
    let attachment = blocking(move || {
        store.board_for_user(&user, board_id)?;
        store.get_task(board_id, task_id)?;
        let attachment = Attachment::new(task_id, &params.filename, content_type, size, user.id)?;
        blobs.put(&attachment.blob_key, &body)?;
        if let Err(e) = store.add_attachment(board_id, &attachment) {
            if let Err(cleanup) = blobs.delete(&attachment.blob_key) {
                tracing::warn!(blob = %attachment.blob_key, error = %cleanup, "orphaned attachment blob");
            }
            return Err(e);
        }
        Ok(attachment)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(attachment)))
}

/// GET /api/boards/{board_id}/tasks/{task_id}/attachments/{attachment_id}: file bytes.
pub async fn download_attachment(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath((board_id, task_id, attachment_id)): ApiPath<(Uuid, Uuid, Uuid)>,
) -> Result<impl IntoResponse, AppError> {
    let store = app.store.clone();
    let blobs = app.blobs.clone();
    let (attachment, data) = blocking(move || {
        store.board_for_user(&user, board_id)?;
        let attachment = store.get_attachment(board_id, task_id, attachment_id)?;
        let data = blobs.get(&attachment.blob_key)?;
        Ok((attachment, data))
    })
    .await?;

    let content_type = HeaderValue::from_str(&attachment.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=\"{}\"",
        attachment.filename.replace(['"', '\\'], "_")
    ))
    .unwrap_or_else(|_| HeaderValue::from_static("attachment"));
    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        data,
    ))
}

/// DELETE /api/boards/{board_id}/tasks/{task_id}/attachments/{attachment_id}
pub async fn delete_attachment(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath((board_id, task_id, attachment_id)): ApiPath<(Uuid, Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let store = app.store.clone();
    let blobs = app.blobs.clone();
    blocking(move || {
        store.board_for_user(&user, board_id)?;
        let attachment = store.remove_attachment(board_id, task_id, attachment_id)?;
        blobs.delete(&attachment.blob_key)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
