//! Error responses for the HTTP API.

use crate::monitor::MonitorError;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

const UNAUTHORIZED_BODY: &str =
    "Could not verify your access level for that URL.\nYou have to login with proper credentials";

/// API error types.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Deliberately says nothing about which part of the check failed.
    #[error("authentication required")]
    Unauthorized,
    #[error("rate limit exceeded")]
    RateLimited,
    #[error("invalid target index")]
    InvalidIndex,
    #[error("scheduled probe imminent")]
    SchedulingConflict { remaining: Duration },
}

impl From<MonitorError> for ApiError {
    fn from(e: MonitorError) -> Self {
        match e {
            MonitorError::InvalidIndex(_) => ApiError::InvalidIndex,
            MonitorError::SchedulingConflict { remaining } => {
                ApiError::SchedulingConflict { remaining }
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Basic realm=\"Login Required\"")],
                UNAUTHORIZED_BODY,
            )
                .into_response(),
            ApiError::RateLimited => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": "Rate limit exceeded" })),
            )
                .into_response(),
            ApiError::InvalidIndex => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "status": "error", "message": "Invalid URL index" })),
            )
                .into_response(),
            ApiError::SchedulingConflict { remaining } => (
                StatusCode::LOCKED,
                Json(json!({
                    "status": "wait",
                    "message": "Scheduled ping imminent",
                    "remainingTime": remaining.as_secs_f64(),
                })),
            )
                .into_response(),
        }
    }
}
