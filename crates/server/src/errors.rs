use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::error;

use service::ServiceError;

/// Error returned by handlers. Rendered as
/// `{"success": false, "message": ..., "kind": ...}` so the panels can show
/// `message` as their status line.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("unknown chart '{0}'")]
    UnknownChart(String),
    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Service(e) => match e {
                ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::Auth(_) => StatusCode::UNAUTHORIZED,
                ServiceError::Conflict { .. } => StatusCode::CONFLICT,
                ServiceError::Transport { .. } | ServiceError::Decode { .. } => StatusCode::BAD_GATEWAY,
                ServiceError::Storage(_) | ServiceError::Git(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::UnknownChart(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ApiError::Service(e) => e.kind(),
            ApiError::UnknownChart(_) => "not_found",
            ApiError::BadRequest(_) => "validation",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = self.to_string();
        if status.is_server_error() {
            error!(status = status.as_u16(), error = %msg, "request failed");
        }
        let body = serde_json::json!({"success": false, "message": msg, "kind": self.kind()});
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}
