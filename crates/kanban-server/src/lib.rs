pub mod auth;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::handler::Handler;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::path::Path;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub use state::AppState;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(app_state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let upload_limit = usize::try_from(app_state.config.storage.max_attachment_bytes)
        .unwrap_or(usize::MAX)
        .saturating_add(1);

    // Everything here requires a signed-in user.
    let protected = Router::new()
        .route("/api/auth/me", get(routes::auth::me))
        .route("/api/invites", post(routes::auth::create_invite))
        // Boards
        .route(
            "/api/boards",
            get(routes::boards::list_boards).post(routes::boards::create_board),
        )
        .route("/api/boards/{board_id}", get(routes::boards::get_board))
        // Tasks
        .route(
            "/api/boards/{board_id}/tasks",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route(
            "/api/boards/{board_id}/tasks/{task_id}",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route(
            "/api/boards/{board_id}/tasks/{task_id}/move",
            post(routes::tasks::move_task),
        )
        // Comments
        .route(
            "/api/boards/{board_id}/tasks/{task_id}/comments",
            get(routes::comments::list_comments).post(routes::comments::add_comment),
        )
        .route(
            "/api/boards/{board_id}/tasks/{task_id}/comments/{comment_id}",
            axum::routing::patch(routes::comments::edit_comment)
                .delete(routes::comments::delete_comment),
        )
        // Attachments
        .route(
            "/api/boards/{board_id}/tasks/{task_id}/attachments",
            get(routes::attachments::list_attachments).post(
                routes::attachments::upload_attachment
                    .layer(DefaultBodyLimit::max(upload_limit)),
            ),
        )
        .route(
            "/api/boards/{board_id}/tasks/{task_id}/attachments/{attachment_id}",
            get(routes::attachments::download_attachment)
                .delete(routes::attachments::delete_attachment),
        )
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            auth::require_session,
        ));

    Router::new()
        .route("/api/health", get(routes::health::health))
        .route("/api/columns", get(routes::health::columns))
        .route("/api/auth/signup", post(routes::auth::signup))
        .route("/api/auth/login", post(routes::auth::login))
        .route("/api/auth/logout", post(routes::auth::logout))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Start the kanban API server for the project at `root`.
pub async fn serve(root: &Path, port: u16, open_browser: bool) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(root, listener, open_browser).await
}

/// Start the kanban API server on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(
    root: &Path,
    listener: tokio::net::TcpListener,
    open_browser: bool,
) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app_state = AppState::load(root)?;

    let store = app_state.store.clone();
    match tokio::task::spawn_blocking(move || store.purge_expired_sessions()).await? {
        Ok(0) => {}
        Ok(n) => tracing::info!(purged = n, "removed expired sessions"),
        Err(e) => tracing::warn!(error = %e, "could not purge expired sessions"),
    }

    let app = build_router(app_state);
    tracing::info!("kanban server listening on http://localhost:{actual_port}");

    if open_browser {
        let url = format!("http://localhost:{actual_port}/api/health");
        let _ = open::that(&url);
    }

    axum::serve(listener, app).await?;
    Ok(())
}
