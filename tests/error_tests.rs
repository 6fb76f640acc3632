// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

use axum::{http::StatusCode, response::IntoResponse};
use pullup_club::error::{AppError, ErrorKind};

#[test]
fn test_transient_errors_are_retryable() {
    assert!(AppError::Backend("connection reset".to_string()).is_transient());
    assert!(AppError::Timeout(10_000).is_transient());

    let err = AppError::BackendStatus {
        status: 429,
        message: "rate limited".to_string(),
    };
    assert!(err.is_transient());
}

#[test]
fn test_rejections_are_not_retryable() {
    assert!(!AppError::InvalidCredentials("bad password".to_string()).is_transient());
    assert!(!AppError::Validation("email".to_string()).is_transient());

    let err = AppError::BackendStatus {
        status: 409,
        message: "duplicate key".to_string(),
    };
    assert!(!err.is_transient());
    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[test]
fn test_status_codes() {
    let cases = [
        (AppError::Unauthorized, StatusCode::UNAUTHORIZED),
        (AppError::InvalidSession, StatusCode::UNAUTHORIZED),
        (
            AppError::Validation("age".to_string()),
            StatusCode::BAD_REQUEST,
        ),
        (
            AppError::NotFound("Profile".to_string()),
            StatusCode::NOT_FOUND,
        ),
        (
            AppError::Backend("down".to_string()),
            StatusCode::BAD_GATEWAY,
        ),
        (AppError::Timeout(10_000), StatusCode::GATEWAY_TIMEOUT),
        (
            AppError::Config("SUPABASE_URL".to_string()),
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    ];

    for (err, expected) in cases {
        assert_eq!(err.into_response().status(), expected);
    }
}
