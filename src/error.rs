// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Application error types with consistent API responses.
//!
//! Every error carries an [`ErrorKind`] so callers can branch on the kind of
//! failure (retry it, redirect, degrade) without matching on message text.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Coarse classification of an [`AppError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    NotFound,
    Transient,
    Timeout,
    Payment,
    Config,
    Internal,
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid or expired session")]
    InvalidSession,

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Backend request failed: {0}")]
    Backend(String),

    #[error("Backend rejected request ({status}): {message}")]
    BackendStatus { status: u16, message: String },

    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    #[error("Payment provider error: {0}")]
    Payment(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::Unauthorized | AppError::InvalidSession | AppError::InvalidCredentials(_) => {
                ErrorKind::Unauthorized
            }
            AppError::NotFound(_) => ErrorKind::NotFound,
            AppError::Validation(_) => ErrorKind::Validation,
            AppError::Backend(_) => ErrorKind::Transient,
            AppError::BackendStatus { status, .. } => match *status {
                401 | 403 => ErrorKind::Unauthorized,
                404 => ErrorKind::NotFound,
                408 | 429 => ErrorKind::Transient,
                s if s >= 500 => ErrorKind::Transient,
                _ => ErrorKind::Internal,
            },
            AppError::Timeout(_) => ErrorKind::Timeout,
            AppError::Payment(_) => ErrorKind::Payment,
            AppError::Config(_) => ErrorKind::Config,
            AppError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient | ErrorKind::Timeout)
    }

    /// Map a reqwest transport error. Timeouts are logged and stay transient.
    pub fn from_reqwest(err: reqwest::Error, context: &str) -> Self {
        if err.is_timeout() {
            tracing::warn!(context, "Backend request timed out");
            return AppError::Backend(format!("{}: request timed out", context));
        }
        AppError::Backend(format!("{}: {}", context, err))
    }
}

/// Error captured on the auth state for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(ts_rs::TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ErrorReport {
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AppError> for ErrorReport {
    fn from(err: &AppError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let fields: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, errs)| {
                let msg = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "is invalid".to_string());
                format!("{} {}", field, msg)
            })
            .collect();
        AppError::Validation(fields.join(", "))
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let (status, details) = match kind {
            ErrorKind::Validation => (StatusCode::BAD_REQUEST, Some(self.to_string())),
            ErrorKind::Unauthorized => (StatusCode::UNAUTHORIZED, Some(self.to_string())),
            ErrorKind::NotFound => (StatusCode::NOT_FOUND, Some(self.to_string())),
            ErrorKind::Transient => {
                tracing::warn!(error = %self, "Backend unavailable");
                (StatusCode::BAD_GATEWAY, None)
            }
            ErrorKind::Timeout => (StatusCode::GATEWAY_TIMEOUT, None),
            ErrorKind::Payment => (StatusCode::BAD_GATEWAY, Some(self.to_string())),
            ErrorKind::Config | ErrorKind::Internal => {
                tracing::error!(error = %self, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, None)
            }
        };

        let body = ErrorResponse {
            error: kind,
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_status_kinds() {
        let err = AppError::BackendStatus {
            status: 503,
            message: "unavailable".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(err.is_transient());

        let err = AppError::BackendStatus {
            status: 401,
            message: "jwt expired".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert!(!err.is_transient());

        let err = AppError::BackendStatus {
            status: 400,
            message: "bad filter".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_error_report_carries_kind() {
        let report = ErrorReport::from(&AppError::Timeout(10_000));
        assert_eq!(report.kind, ErrorKind::Timeout);
        assert!(report.message.contains("10000"));
    }
}
