use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use serde::Deserialize;

use crate::auth::{clear_cookie, session_cookie, session_token, CurrentUser};
use crate::error::{blocking, AppError};
use crate::extract::ApiJson;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct SignupBody {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Name of the new team account. Ignored when joining by invite.
    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub invite_token: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginBody {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/signup: create an account, or join one with an invite,
/// and start a session.
pub async fn signup(
    State(app): State<AppState>,
    ApiJson(body): ApiJson<SignupBody>,
) -> Result<impl IntoResponse, AppError> {
    let store = app.store.clone();
    let ttl = app.config.server.session_ttl_hours;
    let (user, account, session) = blocking(move || {
        let display_name = body.display_name.as_deref();
        let user = match body.invite_token.as_deref() {
            Some(token) => store.join_account(token, &body.email, display_name, &body.password)?,
            None => {
                let name = body.account_name.as_deref().unwrap_or_default();
                store
                    .create_account(name, &body.email, display_name, &body.password)?
                    .1
            }
        };
        let account = store.get_account(user.account_id)?;
        let session = store.create_session(user.id, ttl)?;
        Ok((user, account, session))
    })
    .await?;

    let cookie = session_cookie(&app.config.server, &session.token);
    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({
            "user": user.profile(),
            "account": account,
            "token": session.token,
            "expires_at": session.expires_at,
        })),
    ))
}

/// POST /api/auth/login: exchange credentials for a session.
pub async fn login(
    State(app): State<AppState>,
    ApiJson(body): ApiJson<LoginBody>,
) -> Result<impl IntoResponse, AppError> {
    let store = app.store.clone();
    let ttl = app.config.server.session_ttl_hours;
    let (user, session) = blocking(move || {
        let user = store.authenticate(&body.email, &body.password)?;
        let session = store.create_session(user.id, ttl)?;
        Ok((user, session))
    })
    .await?;
    tracing::info!(user = %user.id, "signed in");

    let cookie = session_cookie(&app.config.server, &session.token);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({
            "user": user.profile(),
            "token": session.token,
            "expires_at": session.expires_at,
        })),
    ))
}

/// POST /api/auth/logout: end the current session, if any.
pub async fn logout(
    State(app): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    if let Some(token) = session_token(&headers, &app.config.server.cookie_name) {
        let store = app.store.clone();
        blocking(move || store.delete_session(&token)).await?;
    }
    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, clear_cookie(&app.config.server))],
    ))
}

/// GET /api/auth/me: the signed-in user, their account and its members.
pub async fn me(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Json<serde_json::Value>, AppError> {
    let store = app.store.clone();
    let account_id = user.account_id;
    let (account, members) = blocking(move || {
        Ok((store.get_account(account_id)?, store.list_users(account_id)?))
    })
    .await?;
    let members: Vec<_> = members.iter().map(|u| u.profile()).collect();
    Ok(Json(serde_json::json!({
        "user": user.profile(),
        "account": account,
        "members": members,
    })))
}

/// POST /api/invites: issue an invite token for the caller's account.
pub async fn create_invite(
    State(app): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, AppError> {
    let store = app.store.clone();
    let ttl = app.config.server.invite_ttl_hours;
    let invite = blocking(move || store.create_invite(&user, ttl)).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "token": invite.token,
            "account_id": invite.account_id,
            "expires_at": invite.expires_at,
        })),
    ))
}
