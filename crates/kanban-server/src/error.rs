use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use kanban_core::error::KanbanError;

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
///
/// Every error body is `{"error": <message>, "code": <machine code>}`.
/// Capacity rejections also carry `column` and `limit`.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    /// Construct a 400 Bad Request error with the given message.
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(KanbanError::InvalidInput(msg.into()).into())
    }

    /// Construct a 401 Unauthorized error.
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self(KanbanError::Unauthorized(msg.into()).into())
    }

    /// Construct a 413 error for an upload over the configured limit.
    pub fn too_large(limit: u64) -> Self {
        Self(PayloadTooLarge(limit).into())
    }
}

/// Sentinel carried through the `anyhow` chain for oversized uploads.
#[derive(Debug)]
struct PayloadTooLarge(u64);

impl std::fmt::Display for PayloadTooLarge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "attachment is larger than {} bytes", self.0)
    }
}

impl std::error::Error for PayloadTooLarge {}

/// Status and machine-readable code for a core error.
pub fn classify(e: &KanbanError) -> (StatusCode, &'static str) {
    match e {
        KanbanError::CapacityExceeded { .. } => (StatusCode::CONFLICT, "capacity_exceeded"),
        KanbanError::InvalidColumn(_) | KanbanError::InvalidPosition { .. } => {
            (StatusCode::BAD_REQUEST, "invalid_destination")
        }
        KanbanError::AccountNotFound(_)
        | KanbanError::UserNotFound(_)
        | KanbanError::BoardNotFound(_)
        | KanbanError::TaskNotFound(_)
        | KanbanError::CommentNotFound(_)
        | KanbanError::AttachmentNotFound(_)
        | KanbanError::InviteNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
        KanbanError::BoardExists(_) | KanbanError::EmailTaken(_) => {
            (StatusCode::CONFLICT, "already_exists")
        }
        KanbanError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        KanbanError::InvalidSlug(_) | KanbanError::InvalidInput(_) => {
            (StatusCode::BAD_REQUEST, "invalid_input")
        }
        KanbanError::InvalidCredentials | KanbanError::Unauthorized(_) => {
            (StatusCode::UNAUTHORIZED, "unauthorized")
        }
        KanbanError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
        KanbanError::NotInitialized => (StatusCode::BAD_REQUEST, "not_initialized"),
        KanbanError::Storage(_)
        | KanbanError::Io(_)
        | KanbanError::Yaml(_)
        | KanbanError::Json(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if let Some(p) = self.0.downcast_ref::<PayloadTooLarge>() {
            let body = serde_json::json!({ "error": p.to_string(), "code": "too_large" });
            return (StatusCode::PAYLOAD_TOO_LARGE, axum::Json(body)).into_response();
        }

        let Some(e) = self.0.downcast_ref::<KanbanError>() else {
            tracing::error!(error = %self.0, "unexpected server error");
            let body = serde_json::json!({ "error": "internal server error", "code": "internal" });
            return (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(body)).into_response();
        };

        let (status, code) = classify(e);
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %e, "storage failure");
            let body = serde_json::json!({ "error": "internal server error", "code": code });
            return (status, axum::Json(body)).into_response();
        }

        let mut body = serde_json::json!({ "error": e.to_string(), "code": code });
        if let KanbanError::CapacityExceeded { column, limit } = e {
            body["column"] = serde_json::json!(column);
            body["limit"] = serde_json::json!(limit);
        }
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/// Run blocking store work off the async executor.
pub async fn blocking<T, F>(f: F) -> Result<T, AppError>
where
    F: FnOnce() -> kanban_core::Result<T> + Send + 'static,
    T: Send + 'static,
{
    Ok(tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??)
}
