//! Error envelope for the HTTP surface.
//!
//! Status codes derive from the engine's stable error codes:
//! validation failures are 400, missing resources 404, authorization
//! failures 403, lost races 409, and everything else 500.

use approval_types::ApprovalError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// API-level errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Engine or storage error, mapped through its stable code
    #[error("{0}")]
    Approval(#[from] ApprovalError),

    /// Malformed request before it reached the engine
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Request carries no usable identity
    #[error("forbidden: {0}")]
    Forbidden(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, details) = match &self {
            ApiError::Approval(err) => {
                let status = match err.code() {
                    "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
                    "NOT_FOUND" => StatusCode::NOT_FOUND,
                    "FORBIDDEN" => StatusCode::FORBIDDEN,
                    "CONFLICT" => StatusCode::CONFLICT,
                    _ => StatusCode::INTERNAL_SERVER_ERROR,
                };
                let details = err
                    .field_errors()
                    .and_then(|fields| serde_json::to_value(fields).ok());
                (status, err.code(), details)
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", None),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN", None),
        };

        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for API operations
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use approval_types::SubmissionId;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::Approval(ApprovalError::Validation("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Approval(ApprovalError::SubmissionNotFound(SubmissionId::new("s"))),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Approval(ApprovalError::Forbidden("x".into())),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::Approval(ApprovalError::Conflict("x".into())),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Approval(ApprovalError::Storage("x".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::Forbidden("x".into()), StatusCode::FORBIDDEN),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
