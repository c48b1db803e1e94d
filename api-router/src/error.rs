//! Maps the internal `AppError` taxonomy onto HTTP status codes at the API
//! boundary (spec §7: "boundary handlers catch and map to HTTP"). Grounded
//! in the teacher's `ApiError::from(AppError)` conversion and its
//! internal-error sanitization (never leak a raw database/LLM error string
//! to the client).

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use common::error::AppError;
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Serialize, Clone)]
pub enum ApiError {
    #[error("Internal server error")]
    InternalError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::NotFound(msg) => Self::NotFound(msg),
            AppError::Validation(msg) => Self::ValidationError(msg),
            AppError::Conflict(msg) => Self::Conflict(msg),
            other => {
                tracing::error!(error = %other, "internal error reached the API boundary");
                Self::InternalError("internal server error".to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            Self::ValidationError(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
        };

        let message = self.to_string();
        (
            status,
            Json(ErrorResponse {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize, Debug)]
struct ErrorResponse {
    error: String,
    code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let api_error = ApiError::from(AppError::NotFound("company acme".to_string()));
        assert_eq!(
            api_error.into_response().status(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn validation_maps_to_400() {
        let api_error = ApiError::from(AppError::Validation("bad input".to_string()));
        assert_eq!(
            api_error.into_response().status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn conflict_maps_to_409() {
        let api_error = ApiError::from(AppError::Conflict("company exists".to_string()));
        assert_eq!(api_error.into_response().status(), StatusCode::CONFLICT);
    }

    #[test]
    fn database_error_is_sanitized_to_internal_error() {
        let api_error = ApiError::from(AppError::InternalError("leaked detail".to_string()));
        assert!(matches!(api_error, ApiError::InternalError(_)));
        assert_eq!(api_error.to_string(), "Internal server error");
        assert_eq!(
            api_error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
