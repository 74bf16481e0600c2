//! Error types shared across the VEMS backend
//!
//! One enum covers the whole failure taxonomy. Handlers map an error to an
//! HTTP status via [`VemsError::status`] and to a client-safe message via
//! [`VemsError::public_message`] - storage and IO detail stays in the logs.

use hyper::StatusCode;
use thiserror::Error;

/// Service-wide error type
#[derive(Debug, Error)]
pub enum VemsError {
    /// Malformed input, rejected before touching storage
    #[error("validation error: {0}")]
    Validation(String),

    /// Missing, invalid, expired, or revoked credentials
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Valid identity, insufficient role or scope
    #[error("access denied: {0}")]
    Authorization(String),

    /// Referenced entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Uniqueness violation
    #[error("conflict: {0}")]
    Conflict(String),

    /// Storage failure, surfaced to the caller as a generic error
    #[error("database error: {0}")]
    Database(String),

    /// Malformed HTTP request (body, headers, query string)
    #[error("bad request: {0}")]
    Http(String),

    /// Startup or configuration problem
    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl VemsError {
    /// HTTP status code for this error
    pub fn status(&self) -> StatusCode {
        match self {
            VemsError::Validation(_) | VemsError::Http(_) => StatusCode::BAD_REQUEST,
            VemsError::Authentication(_) => StatusCode::UNAUTHORIZED,
            VemsError::Authorization(_) => StatusCode::FORBIDDEN,
            VemsError::NotFound(_) => StatusCode::NOT_FOUND,
            VemsError::Conflict(_) => StatusCode::CONFLICT,
            VemsError::Database(_) | VemsError::Config(_) | VemsError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short machine-readable code for error responses
    pub fn code(&self) -> &'static str {
        match self {
            VemsError::Validation(_) => "VALIDATION_ERROR",
            VemsError::Authentication(_) => "AUTHENTICATION_ERROR",
            VemsError::Authorization(_) => "ACCESS_DENIED",
            VemsError::NotFound(_) => "NOT_FOUND",
            VemsError::Conflict(_) => "CONFLICT",
            VemsError::Database(_) => "STORAGE_ERROR",
            VemsError::Http(_) => "BAD_REQUEST",
            VemsError::Config(_) => "CONFIG_ERROR",
            VemsError::Io(_) => "IO_ERROR",
        }
    }

    /// Message safe to return to the caller.
    ///
    /// Internal failures collapse to a generic message; the real cause is
    /// already logged at the failure site.
    pub fn public_message(&self) -> String {
        match self {
            VemsError::Database(_) | VemsError::Config(_) | VemsError::Io(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// Convenience result alias
pub type Result<T> = std::result::Result<T, VemsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            VemsError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            VemsError::Authentication("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            VemsError::Authorization("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            VemsError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(VemsError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            VemsError::Database("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_database_detail_not_leaked() {
        let err = VemsError::Database("connection refused to mongodb://secret-host".into());
        assert_eq!(err.public_message(), "Internal server error");
        // the Display impl keeps the detail for logging
        assert!(err.to_string().contains("secret-host"));
    }

    #[test]
    fn test_validation_message_passes_through() {
        let err = VemsError::Validation("name too short".into());
        assert!(err.public_message().contains("name too short"));
    }
}
