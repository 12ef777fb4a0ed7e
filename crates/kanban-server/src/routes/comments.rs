use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::{blocking, AppError};
use crate::extract::{ApiJson, ApiPath};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct AddCommentBody {
    pub body: String,
    /// Reply to this comment instead of starting a new thread.
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct EditCommentBody {
    pub body: String,
}

/// GET /api/boards/{board_id}/tasks/{task_id}/comments: threaded, oldest first.
pub async fn list_comments(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath((board_id, task_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let threads = blocking(move || {
        store.board_for_user(&user, board_id)?;
        store.list_comments(board_id, task_id)
    })
    .await?;
    Ok(Json(serde_json::json!({ "comments": threads })))
}

/// POST /api/boards/{board_id}/tasks/{task_id}/comments
pub async fn add_comment(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath((board_id, task_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<AddCommentBody>,
) -> Result<impl IntoResponse, AppError> {
    let store = app.store.clone();
    let comment = blocking(move || {
        store.board_for_user(&user, board_id)?;
        store.add_comment(board_id, task_id, user.id, body.parent_id, &body.body)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

/// PATCH /api/boards/{board_id}/tasks/{task_id}/comments/{comment_id}: author only.
pub async fn edit_comment(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath((board_id, task_id, comment_id)): ApiPath<(Uuid, Uuid, Uuid)>,
    ApiJson(body): ApiJson<EditCommentBody>,
) -> Result<impl IntoResponse, AppError> {
    let store = app.store.clone();
    let comment = blocking(move || {
        store.board_for_user(&user, board_id)?;
        store.edit_comment(board_id, task_id, comment_id, user.id, &body.body)
    })
    .await?;
    Ok(Json(comment))
}

/// DELETE /api/boards/{board_id}/tasks/{task_id}/comments/{comment_id}:
/// removes the comment and its replies.
pub async fn delete_comment(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath((board_id, task_id, comment_id)): ApiPath<(Uuid, Uuid, Uuid)>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let removed = blocking(move || {
        store.board_for_user(&user, board_id)?;
        store.delete_comment(board_id, task_id, comment_id, user.id)
    })
    .await?;
    Ok(Json(serde_json::json!({ "removed": removed })))
}
