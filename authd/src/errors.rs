use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt::Display;
use thiserror::Error as ThisError;

/// Every failure an auth operation can report to its caller.
///
/// Store-level errors are translated into these kinds at the store boundary (see
/// [`crate::db::errors`]); above it they pass through unchanged.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Wrong email or wrong password. The two are deliberately indistinguishable.
    #[error("Invalid credentials")]
    InvalidCredentials,

    /// Registration with an email that is already taken
    #[error("User with this email already exists")]
    AlreadyExists,

    /// No user with the requested identity
    #[error("User not found")]
    UserNotFound,

    /// No session with the requested identity
    #[error("Session not found")]
    SessionNotFound,

    /// Refresh token is revoked, rotated away, or past its expiry
    #[error("Invalid refresh token")]
    InvalidRefreshToken,

    /// Malformed input rejected at the API boundary
    #[error("{message}")]
    InvalidArgument { message: String },

    /// Missing or invalid access token (Auth Gate)
    #[error("Not authenticated")]
    Unauthenticated { message: Option<String> },

    /// The operation's deadline passed before it completed
    #[error("Deadline exceeded while trying to {operation}")]
    Cancelled { operation: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },
}

impl Error {
    /// Wrap an unexpected failure with the name of the operation that hit it.
    pub fn internal(operation: &str, source: impl Display) -> Self {
        Error::Internal {
            operation: format!("{operation}: {source}"),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Error::InvalidArgument { message: message.into() }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Error::AlreadyExists => StatusCode::CONFLICT,
            Error::UserNotFound | Error::SessionNotFound => StatusCode::NOT_FOUND,
            Error::InvalidRefreshToken => StatusCode::UNAUTHORIZED,
            Error::InvalidArgument { .. } => StatusCode::BAD_REQUEST,
            Error::Unauthenticated { .. } => StatusCode::UNAUTHORIZED,
            Error::Cancelled { .. } => StatusCode::GATEWAY_TIMEOUT,
            Error::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable name of the error kind
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidCredentials => "invalid_credentials",
            Error::AlreadyExists => "already_exists",
            Error::UserNotFound => "user_not_found",
            Error::SessionNotFound => "session_not_found",
            Error::InvalidRefreshToken => "invalid_refresh_token",
            Error::InvalidArgument { .. } => "invalid_argument",
            Error::Unauthenticated { .. } => "unauthenticated",
            Error::Cancelled { .. } => "deadline_exceeded",
            Error::Internal { .. } => "internal",
        }
    }

    /// Returns a user-safe error message, without leaking internal implementation details
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidCredentials => "Wrong email or password".to_string(),
            Error::AlreadyExists => "An account with this email address already exists".to_string(),
            Error::UserNotFound => "User not found".to_string(),
            Error::SessionNotFound => "Session not found".to_string(),
            Error::InvalidRefreshToken => "Refresh token is invalid or expired".to_string(),
            Error::InvalidArgument { message } => message.clone(),
            Error::Unauthenticated { message } => message.clone().unwrap_or_else(|| "Authentication required".to_string()),
            Error::Cancelled { .. } => "Request deadline exceeded".to_string(),
            Error::Internal { .. } => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        // Log full error details for debugging - different log levels based on severity
        match &self {
            Error::Internal { .. } => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::Cancelled { .. } => {
                tracing::warn!("Request cancelled: {}", self);
            }
            Error::InvalidCredentials | Error::InvalidRefreshToken | Error::Unauthenticated { .. } => {
                tracing::info!("Authentication error: {}", self);
            }
            Error::AlreadyExists | Error::UserNotFound | Error::SessionNotFound | Error::InvalidArgument { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = json!({
            "code": self.code(),
            "message": self.user_message(),
        });

        (self.status_code(), axum::response::Json(body)).into_response()
    }
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
