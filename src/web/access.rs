//! Session cookies, Basic credentials and the access middleware.

use super::{ApiError, AppState};

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::net::SocketAddr;
use std::time::Duration;

pub const SESSION_COOKIE: &str = "session";

/// `Set-Cookie` value carrying a fresh session token.
pub fn session_cookie(token: &str, ttl: Duration) -> String {
    format!(
        "{}={}; HttpOnly; Secure; SameSite=Strict; Path=/; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl.as_secs()
    )
}

/// `Set-Cookie` value that removes the session cookie.
pub fn expired_session_cookie() -> String {
    format!(
        "{}=; HttpOnly; Secure; SameSite=Strict; Path=/; Max-Age=0",
        SESSION_COOKIE
    )
}

fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

/// Username and password from an `Authorization: Basic` header.
pub fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

fn is_authenticated(state: &AppState, headers: &HeaderMap) -> bool {
    if let Some(token) = session_token(headers) {
        if state.auth.validate(token) {
            return true;
        }
    }

    match basic_credentials(headers) {
        Some((user, pass)) => state.auth.check_auth(&user, &pass),
        None => false,
    }
}

/// Rejects requests without a valid session cookie or Basic credentials.
pub async fn require_auth(State(state): State<AppState>, req: Request, next: Next) -> Response {
    if !is_authenticated(&state, req.headers()) {
        tracing::debug!("Unauthenticated request to {}", req.uri().path());
        return ApiError::Unauthorized.into_response();
    }
    next.run(req).await
}

/// Per-client request limit for the probe endpoints.
pub async fn rate_limit(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let client = client_id(&req);
    if !state.limiter.allow(&client) {
        tracing::warn!(
            "Rate limit exceeded for {} ({} clients tracked)",
            client,
            state.limiter.tracked_clients()
        );
        return ApiError::RateLimited.into_response();
    }
    next.run(req).await
}

fn client_id(req: &Request) -> String {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}
