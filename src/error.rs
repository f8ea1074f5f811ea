use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::repository::RepoError;

/// ApiError
///
/// Every failure a handler can surface. Each variant maps to exactly one status code and
/// is rendered as `{"msg": "..."}`; nothing below this boundary leaks into the body.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body failed schema checks. Never reaches storage.
    #[error("{0}")]
    InvalidInput(String),
    /// Missing, malformed, forged or expired bearer token.
    #[error("Invalid or expired token")]
    InvalidToken,
    /// Signin with a password that does not match the stored digest.
    #[error("Wrong password")]
    InvalidCredentials,
    /// Token verified but carries no identity.
    #[error("Unauthorized request")]
    Unauthorized,
    /// Authenticated, but not the owner of the resource.
    #[error("You are not allowed to modify this resource")]
    Forbidden,
    #[error("{0}")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidToken | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Unauthorized | ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "msg": self.to_string() }))).into_response()
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Conflict(msg) => ApiError::Conflict(msg),
            other => {
                tracing::error!(error = %other, "storage failure");
                ApiError::Internal
            }
        }
    }
}
