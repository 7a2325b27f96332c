//! Structured error types for store, auth, and migration failures.

use serde::Serialize;
use thiserror::Error;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Caller errors
    InvalidInput,
    AuthFailed,

    // Errors a view must render
    QueryFailed,
    MigrationFailed,

    // Backing medium errors
    Storage,
    Database,
    Config,
    Internal,
}

/// Main error type for todo-sync operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid {field}: {reason}")]
    InvalidInput { field: &'static str, reason: String },

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Failed to load tasks: {0}")]
    QueryFailed(String),

    #[error("Failed to migrate {count} guest task(s): {reason}")]
    MigrationFailed { count: usize, reason: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database migration error: {0}")]
    Schema(#[from] refinery::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("{0}")]
    Internal(String),
}

impl Error {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            field,
            reason: reason.into(),
        }
    }

    pub fn auth(reason: impl Into<String>) -> Self {
        Self::AuthFailed(reason.into())
    }

    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    /// Classify this error for JSON output and exit handling.
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::InvalidInput { .. } => ErrorCode::InvalidInput,
            Error::AuthFailed(_) => ErrorCode::AuthFailed,
            Error::QueryFailed(_) => ErrorCode::QueryFailed,
            Error::MigrationFailed { .. } => ErrorCode::MigrationFailed,
            Error::Storage(_) | Error::Io(_) | Error::Json(_) => ErrorCode::Storage,
            Error::Database(_) | Error::Schema(_) => ErrorCode::Database,
            Error::Config(_) => ErrorCode::Config,
            Error::Internal(_) => ErrorCode::Internal,
        }
    }
}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<Error>() {
            Ok(inner) => inner,
            Err(err) => Error::internal(err),
        }
    }
}

/// Wrapper for rendering errors as JSON.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Result type for todo-sync operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_variants() {
        assert_eq!(Error::auth("bad code").code(), ErrorCode::AuthFailed);
        assert_eq!(
            Error::QueryFailed("offline".into()).code(),
            ErrorCode::QueryFailed
        );
        assert_eq!(
            Error::Io(std::io::Error::other("disk")).code(),
            ErrorCode::Storage
        );
    }

    #[test]
    fn anyhow_round_trip_keeps_variant() {
        let err: anyhow::Error = Error::invalid("title", "blank").into();
        let back: Error = err.into();
        assert_eq!(back.code(), ErrorCode::InvalidInput);
    }

    #[test]
    fn error_body_serializes_code() {
        let err = Error::MigrationFailed {
            count: 2,
            reason: "network".into(),
        };
        let json = serde_json::to_value(ErrorBody::from(&err)).unwrap();
        assert_eq!(json["code"], "MIGRATION_FAILED");
        assert_eq!(
            json["message"],
            "Failed to migrate 2 guest task(s): network"
        );
    }
}
