//! API error type mapped to HTTP status codes.
//!
//! Every [`ApiError`] variant renders as a JSON body `{"error": "message"}`
//! with the matching status. Core errors convert via `From`, so handlers can
//! use `?` on `vectord_core` results directly.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use vectord_core::VectorError;

/// Application-level error type that implements `IntoResponse`.
#[derive(Debug)]
pub enum ApiError {
    /// Invalid request parameters (400).
    BadRequest(String),
    /// Collection or vector not found (404).
    NotFound(String),
    /// Duplicate id or collection name (409).
    Conflict(String),
    /// Unexpected server error (500).
    Internal(String),
}

impl From<VectorError> for ApiError {
    fn from(err: VectorError) -> Self {
        match err {
            VectorError::DimensionMismatch { .. } | VectorError::CapacityExceeded { .. } => {
                ApiError::BadRequest(err.to_string())
            }
            VectorError::NotFound(_) => ApiError::NotFound(err.to_string()),
            VectorError::DuplicateId(_) | VectorError::AlreadyExists(_) => {
                ApiError::Conflict(err.to_string())
            }
            VectorError::CorruptState(_) | VectorError::Io(_) => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        let api: ApiError = VectorError::DimensionMismatch {
            expected: 4,
            got: 2,
        }
        .into();
        assert!(matches!(api, ApiError::BadRequest(_)));

        let api: ApiError = VectorError::DuplicateId("x".into()).into();
        assert!(matches!(api, ApiError::Conflict(_)));

        let api: ApiError = VectorError::collection_not_found("c").into();
        assert!(matches!(api, ApiError::NotFound(_)));

        let api: ApiError = VectorError::CorruptState("bad".into()).into();
        assert!(matches!(api, ApiError::Internal(_)));
    }
}
