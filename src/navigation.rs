// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Web app routes and post-sign-in navigation decisions.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::models::Plan;

pub const LOGIN_ROUTE: &str = "/login";
pub const SIGNUP_ROUTE: &str = "/signup";
pub const RESET_PASSWORD_ROUTE: &str = "/reset-password";
/// Where the OAuth provider sends the browser back to.
pub const OAUTH_CALLBACK_ROUTE: &str = "/auth/callback";
/// Where authenticated users land by default.
pub const DEFAULT_LANDING_ROUTE: &str = "/profile";
/// Pricing page; checkout failures come back here with `?error=<reason>`.
pub const SUBSCRIBE_ROUTE: &str = "/subscribe";

/// Routes a user is on while authenticating.
const AUTH_ENTRY_ROUTES: &[&str] = &[
    LOGIN_ROUTE,
    SIGNUP_ROUTE,
    "/create-account",
    OAUTH_CALLBACK_ROUTE,
];

/// Whether `location` (path with optional query) is an auth-entry route.
pub fn is_auth_entry(location: &str) -> bool {
    let path = location.split(['?', '#']).next().unwrap_or_default();
    let path = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    AUTH_ENTRY_ROUTES.contains(&path)
}

/// Why a resumed checkout could not be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutFailure {
    CheckoutFailed,
    CheckoutUrlMissing,
    /// The provider redirected back but the session is not paid.
    PaymentNotVerified,
}

impl CheckoutFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckoutFailure::CheckoutFailed => "checkout_failed",
            CheckoutFailure::CheckoutUrlMissing => "checkout_url_missing",
            CheckoutFailure::PaymentNotVerified => "payment_not_verified",
        }
    }
}

/// Where the app should send the user after a reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(tag = "kind", content = "to", rename_all = "snake_case")]
pub enum Navigation {
    /// Leave the app, e.g. for a hosted checkout page.
    External(String),
    /// A route inside the app.
    Internal(String),
}

impl Navigation {
    pub fn checkout_error(reason: CheckoutFailure) -> Self {
        Navigation::Internal(format!("{}?error={}", SUBSCRIBE_ROUTE, reason.as_str()))
    }

    pub fn landing() -> Self {
        Navigation::Internal(DEFAULT_LANDING_ROUTE.to_string())
    }

    /// Absolute URL, resolving internal routes against `site_url`.
    pub fn to_url(&self, site_url: &str) -> String {
        match self {
            Navigation::External(url) => url.clone(),
            Navigation::Internal(route) => format!("{}{}", site_url.trim_end_matches('/'), route),
        }
    }
}

/// In-memory navigation state travelling with a sign-in: where the user was
/// and which plan they meant to buy, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationState {
    pub location: String,
    #[serde(default)]
    pub intended_plan: Option<Plan>,
}

impl NavigationState {
    pub fn at(location: &str) -> Self {
        Self {
            location: location.to_string(),
            intended_plan: None,
        }
    }

    pub fn with_plan(mut self, plan: Option<Plan>) -> Self {
        self.intended_plan = plan;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_entry_detection() {
        assert!(is_auth_entry("/login"));
        assert!(is_auth_entry("/login/"));
        assert!(is_auth_entry("/signup?plan=annual"));
        assert!(is_auth_entry("/auth/callback#access_token=x"));
        assert!(!is_auth_entry("/profile"));
        assert!(!is_auth_entry("/"));
        assert!(!is_auth_entry(""));
    }

    #[test]
    fn test_checkout_error_route() {
        assert_eq!(
            Navigation::checkout_error(CheckoutFailure::CheckoutUrlMissing),
            Navigation::Internal("/subscribe?error=checkout_url_missing".to_string())
        );
    }

    #[test]
    fn test_to_url() {
        let nav = Navigation::landing();
        assert_eq!(nav.to_url("https://pullupclub.com/"), "https://pullupclub.com/profile");
        let nav = Navigation::External("https://checkout.stripe.com/c/pay/cs_1".to_string());
        assert_eq!(nav.to_url("https://pullupclub.com"), "https://checkout.stripe.com/c/pay/cs_1");
    }
}
