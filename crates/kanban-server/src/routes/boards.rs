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
pub struct CreateBoardBody {
    pub slug: String,
    #[serde(default)]
    pub title: String,
}

/// GET /api/boards: boards of the caller's account.
pub async fn list_boards(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let boards = blocking(move || store.list_boards(user.account_id)).await?;
    Ok(Json(serde_json::json!({ "boards": boards })))
}

/// POST /api/boards: create a board in the caller's account.
pub async fn create_board(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiJson(body): ApiJson<CreateBoardBody>,
) -> Result<impl IntoResponse, AppError> {
    let store = app.store.clone();
    let board =
        blocking(move || store.create_board(user.account_id, &body.slug, &body.title)).await?;
    Ok((StatusCode::CREATED, Json(board)))
}

/// GET /api/boards/{board_id}: the board with its tasks grouped by column.
pub async fn get_board(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    ApiPath(board_id): ApiPath<Uuid>,
) -> Result<Json<kanban_core::board::BoardView>, AppError> {
    let store = app.store.clone();
    let view = blocking(move || {
        store.board_for_user(&user, board_id)?;
        store.board_view(board_id)
    })
    .await?;
    Ok(Json(view))
}
