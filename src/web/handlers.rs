//! HTTP request handlers.

use super::access::{basic_credentials, expired_session_cookie, session_cookie};
use super::{ApiError, AppState};

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Json},
};
use serde_json::{json, Map, Value};

// ============================================================================
// Session
// ============================================================================

pub async fn handle_login(State(state): State<AppState>, headers: HeaderMap) -> impl IntoResponse {
    let authorized = basic_credentials(&headers)
        .map(|(user, pass)| state.auth.check_auth(&user, &pass))
        .unwrap_or(false);

    if !authorized {
        tracing::warn!("Failed login attempt");
        return ApiError::Unauthorized.into_response();
    }

    let cookie = session_cookie(&state.auth.issue(), state.auth.ttl());
    (
        [(header::SET_COOKIE, cookie)],
        Json(json!({ "status": "success" })),
    )
        .into_response()
}

pub async fn handle_logout() -> impl IntoResponse {
    (
        [(header::SET_COOKIE, expired_session_cookie())],
        Json(json!({ "status": "success" })),
    )
}

// ============================================================================
// Probes
// ============================================================================

pub async fn handle_check_scheduled(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.check_remaining_time())
}

pub async fn handle_ping_one(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> impl IntoResponse {
    match state.monitor.probe_one(index).await {
        Ok(result) => Json(json!({
            "status": "success",
            "message": format!("Successfully pinged {}", result.target),
            "data": result,
        }))
        .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

pub async fn handle_ping_all(State(state): State<AppState>) -> impl IntoResponse {
    match state.monitor.probe_all().await {
        Ok(results) => Json(json!({ "status": "success", "results": results })).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

// ============================================================================
// History
// ============================================================================

pub async fn handle_history(State(state): State<AppState>) -> impl IntoResponse {
    let history: Map<String, Value> = state
        .monitor
        .get_history()
        .into_iter()
        .map(|(url, entries)| (url, json!(entries)))
        .collect();
    Json(history)
}

pub async fn handle_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.monitor.get_stats())
}

pub async fn handle_healthz() -> &'static str {
    "ok"
}
