use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ballotbox_core::CoreError;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Every violated constraint, reported together.
    #[error("{}", .0.join(", "))]
    Validation(Vec<String>),
    #[error("You have already voted on this poll.")]
    AlreadyVoted,
    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Machine-readable error code string.
    fn error_code(&self) -> &'static str {
        match self {
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Forbidden(_) => "FORBIDDEN",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::Validation(_) => "VALIDATION_FAILED",
            ApiError::AlreadyVoted => "ALREADY_VOTED",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::AlreadyVoted => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn details(&self) -> Value {
        match self {
            ApiError::Validation(violations) => json!(violations),
            _ => Value::Null,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let details = self.details();

        let message = match &self {
            ApiError::Internal(err) => {
                tracing::error!("API internal error: {err:#}");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": code,
            "message": message,
            "error": message,
            "details": details,
        });

        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Validation(violations) => ApiError::Validation(violations),
            CoreError::NotFound => {
                ApiError::NotFound("Poll not found or invalid option.".to_string())
            }
            CoreError::DuplicateVote => ApiError::AlreadyVoted,
            CoreError::ProxyRejected => {
                ApiError::Forbidden("Votes sent through proxies are not accepted.".to_string())
            }
            CoreError::Store(err) => ApiError::Internal(anyhow::Error::new(err)),
        }
    }
}

impl From<ballotbox_core::StoreError> for ApiError {
    fn from(e: ballotbox_core::StoreError) -> Self {
        ApiError::Internal(anyhow::Error::new(e))
    }
}
