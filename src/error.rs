//! Unified application error model and mapping helpers.
//! One error enum is shared by the contents core, the device bridge and the HTTP layer,
//! along with the mapping from each variant to an HTTP status and JSON body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    UserInput { code: String, message: String },
    InvalidPath { code: String, message: String },
    NotFound { code: String, message: String },
    Conflict { code: String, message: String },
    Device { code: String, message: String },
    Internal { code: String, message: String },
}

impl AppError {
    pub fn code_str(&self) -> &str {
        match self {
            AppError::UserInput { code, .. }
            | AppError::InvalidPath { code, .. }
            | AppError::NotFound { code, .. }
            | AppError::Conflict { code, .. }
            | AppError::Device { code, .. }
            | AppError::Internal { code, .. } => code.as_str(),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            AppError::UserInput { message, .. }
            | AppError::InvalidPath { message, .. }
            | AppError::NotFound { message, .. }
            | AppError::Conflict { message, .. }
            | AppError::Device { message, .. }
            | AppError::Internal { message, .. } => message.as_str(),
        }
    }

    pub fn user(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::UserInput { code: code.into(), message: msg.into() } }
    pub fn invalid_path(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::InvalidPath { code: code.into(), message: msg.into() } }
    pub fn not_found(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::NotFound { code: code.into(), message: msg.into() } }
    pub fn conflict(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Conflict { code: code.into(), message: msg.into() } }
    pub fn device(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Device { code: code.into(), message: msg.into() } }
    pub fn internal(code: impl Into<String>, msg: impl Into<String>) -> Self { AppError::Internal { code: code.into(), message: msg.into() } }

    /// Map to HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::UserInput { .. } => 400,
            AppError::InvalidPath { .. } => 400,
            AppError::NotFound { .. } => 404,
            // 422 Unprocessable Entity: the caller's fingerprint is stale
            AppError::Conflict { .. } => 422,
            AppError::Device { .. } => 502,
            AppError::Internal { .. } => 500,
        }
    }

    pub fn is_not_found(&self) -> bool { matches!(self, AppError::NotFound { .. }) }
    pub fn is_conflict(&self) -> bool { matches!(self, AppError::Conflict { .. }) }
    pub fn is_invalid_path(&self) -> bool { matches!(self, AppError::InvalidPath { .. }) }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        // Default mapping: anything not already classified is an internal failure
        AppError::Internal { code: "internal_error".into(), message: err.to_string() }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => AppError::not_found("not_found", "file not exists"),
            _ => AppError::internal("io_error", err.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(code = self.code_str(), "request failed: {}", self.message());
        }
        let body = serde_json::json!({
            "code": self.code_str(),
            "description": self.message(),
        });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_mapping() {
        assert_eq!(AppError::user("bad_input", "oops").http_status(), 400);
        assert_eq!(AppError::invalid_path("invalid_path", "escape").http_status(), 400);
        assert_eq!(AppError::not_found("not_found", "missing").http_status(), 404);
        assert_eq!(AppError::conflict("sha_mismatch", "stale").http_status(), 422);
        assert_eq!(AppError::device("device_error", "offline").http_status(), 502);
        assert_eq!(AppError::internal("internal", "panic").http_status(), 500);
    }

    #[test]
    fn io_errors_split_on_not_found() {
        let nf = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(AppError::from(nf).is_not_found());

        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let e = AppError::from(denied);
        assert_eq!(e.http_status(), 500);
        assert_eq!(e.code_str(), "io_error");
    }

    #[test]
    fn display_includes_code_and_message() {
        let e = AppError::conflict("sha_mismatch", "file sha not match");
        assert_eq!(e.to_string(), "sha_mismatch: file sha not match");
    }
}
