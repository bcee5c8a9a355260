//! Error types for the cache service
//!
//! Provides unified error handling using thiserror. Absent keys, failed
//! value comparisons and removals of missing entries are ordinary results,
//! never errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Cache Error Enum ==
/// Unified error type for the cache service.
#[derive(Error, Debug)]
pub enum CacheError {
    /// Missing or malformed key, value or parameter
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Named cache or key not present
    #[error("Not found: {0}")]
    NotFound(String),

    /// A cache exists under this name with other key/value types
    #[error("Cache '{name}' holds <{found}>, requested <{expected}>")]
    TypeMismatch {
        name: String,
        expected: String,
        found: String,
    },

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            CacheError::NotFound(_) => StatusCode::NOT_FOUND,
            CacheError::TypeMismatch { .. } => StatusCode::CONFLICT,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(ErrorResponse::new(self.to_string()));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache service.
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (CacheError::InvalidArgument("key".into()), StatusCode::BAD_REQUEST),
            (CacheError::NotFound("sessions".into()), StatusCode::NOT_FOUND),
            (
                CacheError::TypeMismatch {
                    name: "sessions".into(),
                    expected: "String, u64".into(),
                    found: "String, String".into(),
                },
                StatusCode::CONFLICT,
            ),
            (CacheError::Internal("boom".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (error, status) in cases {
            assert_eq!(error.into_response().status(), status);
        }
    }

    #[test]
    fn test_type_mismatch_message() {
        let error = CacheError::TypeMismatch {
            name: "sessions".into(),
            expected: "String, u64".into(),
            found: "String, String".into(),
        };
        assert_eq!(
            error.to_string(),
            "Cache 'sessions' holds <String, String>, requested <String, u64>"
        );
    }
}
