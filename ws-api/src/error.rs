use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use ws_orchestrator::OrchestratorError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Forbidden(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Input problems are the caller's to fix; state conflicts and backend
/// failures are reported as 500 with the underlying message.
impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::InvalidInput(msg) => ApiError::BadRequest(msg),
            OrchestratorError::Forbidden(msg) => ApiError::Forbidden(msg),
            OrchestratorError::NotFound(msg) => ApiError::NotFound(msg),
            other => {
                tracing::error!("Request failed: {}", other);
                ApiError::Internal(other.to_string())
            }
        }
    }
}
