use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use kanban_core::search::TaskFilter;
use kanban_core::task::{NewTask, Task, TaskPatch};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::{blocking, AppError};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct MoveBody {
    pub to_column: String,
    /// Zero-based index in the destination column; appends when absent.
    /// Negative values are accepted here and rejected as an invalid position.
    #[serde(default)]
    pub to_position: Option<i64>,
}

/// GET /api/boards/{board_id}/tasks: tasks in board order, optionally filtered.
pub async fn list_tasks(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(board_id): ApiPath<Uuid>,
    ApiQuery(filter): ApiQuery<TaskFilter>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let tasks = blocking(move || {
        store.board_for_user(&user, board_id)?;
        let tasks = store.list_tasks(board_id)?;
        Ok(filter.apply(store.layout(), tasks))
    })
    .await?;
    Ok(Json(serde_json::json!({ "tasks": tasks })))
}

/// POST /api/boards/{board_id}/tasks: create a task at the end of its column.
pub async fn create_task(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(board_id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<NewTask>,
) -> Result<impl IntoResponse, AppError> {
    let store = app.store.clone();
    let task = blocking(move || {
        store.board_for_user(&user, board_id)?;
        store.create_task(board_id, body, Some(user.id))
    })
    .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /api/boards/{board_id}/tasks/{task_id}
pub async fn get_task(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath((board_id, task_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<Json<Task>, AppError> {
    let store = app.store.clone();
    let task = blocking(move || {
        store.board_for_user(&user, board_id)?;
        store.get_task(board_id, task_id)
    })
    .await?;
    Ok(Json(task))
}

/// PATCH /api/boards/{board_id}/tasks/{task_id}: edit fields; placement is
/// changed only through the move endpoint.
pub async fn update_task(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath((board_id, task_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(patch): ApiJson<TaskPatch>,
) -> Result<Json<Task>, AppError> {
    let store = app.store.clone();
    let task = blocking(move || {
        store.board_for_user(&user, board_id)?;
        store.update_task(board_id, task_id, patch)
    })
    .await?;
    Ok(Json(task))
}

/// POST /api/boards/{board_id}/tasks/{task_id}/move
pub async fn move_task(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath((board_id, task_id)): ApiPath<(Uuid, Uuid)>,
    ApiJson(body): ApiJson<MoveBody>,
) -> Result<Json<Task>, AppError> {
    let store = app.store.clone();
    let task = blocking(move || {
        store.board_for_user(&user, board_id)?;
        store.move_task(board_id, task_id, &body.to_column, body.to_position)
    })
    .await?;
    Ok(Json(task))
}

/// DELETE /api/boards/{board_id}/tasks/{task_id}: delete the task with its
/// comments and attachments.
pub async fn delete_task(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath((board_id, task_id)): ApiPath<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let store = app.store.clone();
    let blobs = app.blobs.clone();
    blocking(move || {
        store.board_for_user(&user, board_id)?;
        let (_, attachments) = store.delete_task(board_id, task_id)?;
        for a in attachments {
            if let Err(e) = blobs.delete(&a.blob_key) {
                tracing::warn!(blob = %a.blob_key, error = %e, "failed to delete attachment blob");
            }
        }
        Ok(())
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
