//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers return `Result<T, AppError>`.
//!
//! Status mapping honors the webhook contract: signature failures are 401
//! (never processed), malformed input is 400, and downstream fulfillment
//! failures are 5xx so the sender's retry policy re-delivers.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tidewater_sync::SyncError;

/// Application-level error type for the server.
#[derive(Debug, Error)]
pub enum AppError {
    /// Sync-library operation failed.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Sync(err) => match err {
                SyncError::Signature(_) => StatusCode::UNAUTHORIZED,
                SyncError::Validation(_) => StatusCode::BAD_REQUEST,
                SyncError::NotFound(_) => StatusCode::NOT_FOUND,
                SyncError::Upstream { .. } | SyncError::Http(_) => StatusCode::BAD_GATEWAY,
                SyncError::Config(_) | SyncError::Parse(_) | SyncError::Consistency(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        // Capture server-class errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Sync(err) => match err {
                SyncError::Signature(_) => "Invalid signature".to_string(),
                SyncError::Validation(msg) => msg.clone(),
                SyncError::NotFound(msg) => msg.clone(),
                SyncError::Upstream { .. } | SyncError::Http(_) => {
                    "Upstream service error".to_string()
                }
                _ => "Internal server error".to_string(),
            },
            Self::NotFound(msg) | Self::BadRequest(msg) => msg.clone(),
            Self::Internal(_) => "Internal server error".to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_signature_failures_are_401() {
        assert_eq!(
            status_of(AppError::Sync(SyncError::Signature("mismatch".to_string()))),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_validation_failures_are_400() {
        assert_eq!(
            status_of(AppError::Sync(SyncError::Validation("bad".to_string()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::BadRequest("bad".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_upstream_failures_are_5xx() {
        let status = status_of(AppError::Sync(SyncError::Upstream {
            status: 500,
            message: "printful down".to_string(),
        }));
        assert!(status.is_server_error());
    }

    #[test]
    fn test_not_found_is_404() {
        assert_eq!(
            status_of(AppError::NotFound("no such price".to_string())),
            StatusCode::NOT_FOUND
        );
    }
}
