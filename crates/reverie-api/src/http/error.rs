//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use reverie_types::error::{AccountError, ChatError};

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Chat(ChatError),
    Account(AccountError),
    /// Missing or invalid credentials.
    Unauthorized(String),
    /// Relay endpoints are disabled (no shared secret configured).
    RelayDisabled,
    /// Malformed request input.
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<ChatError> for AppError {
    fn from(e: ChatError) -> Self {
        AppError::Chat(e)
    }
}

impl From<AccountError> for AppError {
    fn from(e: AccountError) -> Self {
        AppError::Account(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Chat(e @ ChatError::AdmissionDenied { .. }) => {
                (StatusCode::FORBIDDEN, "NO_INTERPRETATIONS", e.user_message())
            }
            AppError::Chat(ChatError::Forbidden) => {
                (StatusCode::FORBIDDEN, "FORBIDDEN", "Access denied".to_string())
            }
            AppError::Chat(e @ ChatError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", e.user_message())
            }
            AppError::Chat(ChatError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Chat(e @ ChatError::UpstreamUnavailable) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE", e.user_message())
            }
            AppError::Chat(e @ ChatError::Storage(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.user_message())
            }
            AppError::Account(AccountError::NotFound) => {
                (StatusCode::NOT_FOUND, "USER_NOT_FOUND", "User not found".to_string())
            }
            AppError::Account(AccountError::ExternalIdConflict(id)) => (
                StatusCode::CONFLICT,
                "CONFLICT",
                format!("External id '{id}' is already registered"),
            ),
            AppError::Account(AccountError::Storage(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
            AppError::RelayDisabled => (
                StatusCode::NOT_FOUND,
                "RELAY_DISABLED",
                "Relay integration is not configured".to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        // Internal causes are logged, never returned.
        match &self {
            AppError::Chat(ChatError::Storage(cause))
            | AppError::Account(AccountError::Storage(cause))
            | AppError::Internal(cause) => {
                tracing::error!(error = %cause, "request failed with internal error");
            }
            _ => {}
        }

        let body = ApiResponse::error(code, &message, Uuid::now_v7().to_string());
        (status, body).into_response()
    }
}
