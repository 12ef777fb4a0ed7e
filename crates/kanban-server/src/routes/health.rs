use axum::extract::State;
use axum::Json;

use crate::state::AppState;

/// GET /api/health: liveness check.
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

/// GET /api/columns: the configured column layout, in board order.
pub async fn columns(State(app): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "columns": app.store.layout().columns }))
}
