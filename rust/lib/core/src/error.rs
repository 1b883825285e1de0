use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. Clients match on these,
// never on the human-readable message string.

/// Stable error code constants.
///
/// Clients should match on `code` from `{"code": "NOT_FOUND", "message": "..."}`.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const CONFLICT: &str = "CONFLICT";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const UNAUTHENTICATED: &str = "UNAUTHENTICATED";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
    pub const INTERNAL: &str = "INTERNAL";
}

// ── ServiceError ────────────────────────────────────────────────────

/// Unified error type carried by every envelope.
///
/// The variant is the error *kind*. It is preserved end to end so a caller
/// can apply its own policy (for example, answering `NotFound` as
/// `Unauthorized` to avoid leaking whether an account exists).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// Malformed or disallowed input. Never touches the database. HTTP 400.
    #[error("{0}")]
    Validation(String),

    /// Uniqueness violation. Bulk callers attach the per-row list to the
    /// envelope instead of folding it into this message. HTTP 409.
    #[error("{0}")]
    Conflict(String),

    /// Entity absent. HTTP 404.
    #[error("{0}")]
    NotFound(String),

    /// Missing credentials, or a caller-side remap of `NotFound`. HTTP 401.
    #[error("{0}")]
    Unauthorized(String),

    /// SQL prepare/exec/scan failure. HTTP 500.
    #[error("{0}")]
    Storage(String),

    /// Producer/consumer contract mismatch or a faulted worker. HTTP 500.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::Validation(_) => error_code::VALIDATION_FAILED,
            ServiceError::Conflict(_) => error_code::CONFLICT,
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::Unauthorized(_) => error_code::UNAUTHENTICATED,
            ServiceError::Storage(_) => error_code::STORAGE_ERROR,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Conflict(_) => StatusCode::CONFLICT,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Storage and internal failures are infrastructure faults: never the
    /// caller's input, always logged at the point of detection.
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, ServiceError::Storage(_) | ServiceError::Internal(_))
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_code_mapping() {
        assert_eq!(ServiceError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ServiceError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(ServiceError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ServiceError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ServiceError::Storage("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(ServiceError::Internal("x".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn error_code_mapping() {
        assert_eq!(ServiceError::Validation("x".into()).error_code(), "VALIDATION_FAILED");
        assert_eq!(ServiceError::Conflict("x".into()).error_code(), "CONFLICT");
        assert_eq!(ServiceError::NotFound("x".into()).error_code(), "NOT_FOUND");
        assert_eq!(ServiceError::Unauthorized("x".into()).error_code(), "UNAUTHENTICATED");
        assert_eq!(ServiceError::Storage("x".into()).error_code(), "STORAGE_ERROR");
        assert_eq!(ServiceError::Internal("x".into()).error_code(), "INTERNAL");
    }

    #[test]
    fn infrastructure_grouping() {
        assert!(ServiceError::Storage("db".into()).is_infrastructure());
        assert!(ServiceError::Internal("type".into()).is_infrastructure());
        assert!(!ServiceError::Validation("bad".into()).is_infrastructure());
        assert!(!ServiceError::NotFound("gone".into()).is_infrastructure());
    }

    #[test]
    fn json_response_format() {
        let err = ServiceError::NotFound("member 'abc' not found".into());
        let resp = err.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn error_display_is_just_message() {
        assert_eq!(ServiceError::NotFound("member 123".into()).to_string(), "member 123");
        assert_eq!(ServiceError::Conflict("dup email".into()).to_string(), "dup email");
        assert_eq!(ServiceError::Validation("bad input".into()).to_string(), "bad input");
    }
}
