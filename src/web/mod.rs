//! HTTP surface for the portfolio backend.
//!
//! Two JSON endpoints (`/api/chat`, `/api/contact`) plus `/health`. Errors
//! leave as `{error, code}` bodies.

pub mod routes;

use crate::core::SyncError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

pub use routes::{AppState, build_router, serve};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug)]
pub enum WebError {
    Sync(SyncError),
    Input(String),
}

impl From<SyncError> for WebError {
    fn from(err: SyncError) -> Self {
        WebError::Sync(err)
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message, code) = match self {
            WebError::Sync(SyncError::Validation(msg)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, msg, "validation_error".to_string())
            }
            WebError::Sync(SyncError::Captcha(msg)) => {
                (StatusCode::FORBIDDEN, msg, "captcha_failed".to_string())
            }
            WebError::Sync(SyncError::Upstream(msg)) => {
                (StatusCode::BAD_GATEWAY, msg, "upstream_error".to_string())
            }
            WebError::Sync(err @ SyncError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, err.to_string(), "not_found".to_string())
            }
            WebError::Sync(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
                "internal_error".to_string(),
            ),

            WebError::Input(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                msg,
                "input_error".to_string(),
            ),
        };

        let body = Json(ErrorResponse {
            error: message,
            code,
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;
