use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use kanban_core::auth::User;
use kanban_core::config::ServerConfig;

use crate::error::{blocking, AppError};
use crate::state::AppState;

/// The signed-in user, inserted into request extensions by [`require_session`].
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Axum middleware that resolves the session token to a user.
///
/// The token is read from the session cookie, or from an
/// `Authorization: Bearer <token>` header for non-browser clients.
/// Missing, unknown or expired tokens get a JSON 401.
pub async fn require_session(
    State(app): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = session_token(req.headers(), &app.config.server.cookie_name)
        .ok_or_else(|| AppError::unauthorized("sign in required"))?;

    let store = app.store.clone();
    let user = blocking(move || store.resolve_session(&token)).await?;
    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

pub fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }
    let cookies = headers.get(header::COOKIE)?.to_str().ok()?;
    let prefix = format!("{cookie_name}=");
    cookies
        .split(';')
        .find_map(|part| part.trim().strip_prefix(prefix.as_str()))
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// `Set-Cookie` value for a fresh session.
pub fn session_cookie(cfg: &ServerConfig, token: &str) -> HeaderValue {
    let max_age = u64::from(cfg.session_ttl_hours) * 3600;
    cookie_value(cfg, token, max_age)
}

/// `Set-Cookie` value that clears the session cookie.
pub fn clear_cookie(cfg: &ServerConfig) -> HeaderValue {
    cookie_value(cfg, "", 0)
}

fn cookie_value(cfg: &ServerConfig, token: &str, max_age: u64) -> HeaderValue {
    let secure = if cfg.secure_cookies { "; Secure" } else { "" };
    let cookie = format!(
        "{}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={max_age}{secure}",
        cfg.cookie_name
    );
    // Tokens are alphanumeric and cookie names come from validated config.
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; kanban_session=abc123; other=1"),
        );
        assert_eq!(
            session_token(&headers, "kanban_session").as_deref(),
            Some("abc123")
        );
        assert_eq!(session_token(&headers, "missing"), None);
    }

    #[test]
    fn bearer_header_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        headers.insert(header::COOKIE, HeaderValue::from_static("kanban_session=cookie"));
        assert_eq!(session_token(&headers, "kanban_session").as_deref(), Some("tok"));
    }

    #[test]
    fn empty_cookie_value_ignored() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("kanban_session="));
        assert_eq!(session_token(&headers, "kanban_session"), None);
    }

    #[test]
    fn cookie_attributes() {
        let cfg = ServerConfig::default();
        let v = session_cookie(&cfg, "tok");
        let s = v.to_str().unwrap();
        assert!(s.starts_with("kanban_session=tok;"));
        assert!(s.contains("HttpOnly"));
        assert!(s.contains("SameSite=Lax"));
        assert!(s.contains("Max-Age=604800"));
        assert!(!s.contains("Secure"));

        let secure = ServerConfig {
            secure_cookies: true,
            ..ServerConfig::default()
        };
        assert!(clear_cookie(&secure).to_str().unwrap().ends_with("Max-Age=0; Secure"));
    }
}
