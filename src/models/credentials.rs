// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Request bodies for the auth entry points.
//!
//! Validation runs locally before any network call.

use serde::{Deserialize, Serialize};
use validator::Validate;

use super::subscription::Plan;

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SignInRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, message = "is required"))]
    pub password: String,
    /// Plan chosen on the pricing page before being sent to log in.
    #[serde(default)]
    pub plan: Option<Plan>,
    /// Route the user was on when they started signing in.
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct SignUpRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    #[serde(default)]
    pub plan: Option<Plan>,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PasswordResetRequest {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct PasswordUpdate {
    #[validate(length(min = 8, message = "must be at least 8 characters"))]
    pub password: String,
    #[validate(must_match(other = "password", message = "does not match password"))]
    pub confirm_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_up_rejects_short_password() {
        let req = SignUpRequest {
            email: "athlete@example.com".to_string(),
            password: "short".to_string(),
            plan: None,
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("password"));
    }

    #[test]
    fn test_sign_in_rejects_bad_email() {
        let req = SignInRequest {
            email: "not-an-email".to_string(),
            password: "whatever".to_string(),
            plan: None,
            location: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_password_update_requires_match() {
        let req = PasswordUpdate {
            password: "longenough".to_string(),
            confirm_password: "different1".to_string(),
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("confirm_password"));

        let req = PasswordUpdate {
            password: "longenough".to_string(),
            confirm_password: "longenough".to_string(),
        };
        assert!(req.validate().is_ok());
    }
}
