// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Post-sign-in checkout resumption.

use chrono::Utc;
use pullup_club::error::ErrorKind;
use pullup_club::models::{PendingPlan, Plan, SignUpRequest};
use pullup_club::navigation::{CheckoutFailure, Navigation};

mod common;
use common::{create_context, sign_in_request, PASSWORD};

fn is_checkout(navigation: &Option<Navigation>) -> bool {
    matches!(navigation, Some(Navigation::External(url)) if url.starts_with("https://checkout.stripe.com/"))
}

#[tokio::test]
async fn test_pending_plan_is_consumed_once() {
    let ctx = create_context().await;
    let user = ctx.backend.add_account("buyer@example.com", PASSWORD);
    ctx.backend
        .put_pending_plan(user.id, PendingPlan::new(Plan::Annual));

    let first = ctx
        .auth
        .sign_in(sign_in_request("buyer@example.com", None))
        .await
        .unwrap();
    assert!(is_checkout(&first.navigation));
    assert!(ctx.backend.pending_plan(user.id).is_none());

    let second = ctx
        .auth
        .sign_in(sign_in_request("buyer@example.com", None))
        .await
        .unwrap();
    assert_eq!(second.navigation, Some(Navigation::landing()));
    assert_eq!(ctx.backend.checkouts(), vec![(user.id, Plan::Annual)]);
}

#[tokio::test]
async fn test_intended_plan_on_request_starts_checkout() {
    let ctx = create_context().await;
    let user = ctx.backend.add_account("monthly@example.com", PASSWORD);

    let outcome = ctx
        .auth
        .sign_in(sign_in_request("monthly@example.com", Some(Plan::Monthly)))
        .await
        .unwrap();

    assert!(is_checkout(&outcome.navigation));
    assert_eq!(ctx.backend.checkouts(), vec![(user.id, Plan::Monthly)]);
}

#[tokio::test]
async fn test_stored_plan_takes_precedence_over_request() {
    let ctx = create_context().await;
    let user = ctx.backend.add_account("both@example.com", PASSWORD);
    ctx.backend
        .put_pending_plan(user.id, PendingPlan::new(Plan::Annual));

    ctx.auth
        .sign_in(sign_in_request("both@example.com", Some(Plan::Monthly)))
        .await
        .unwrap();

    assert_eq!(ctx.backend.checkouts(), vec![(user.id, Plan::Annual)]);
}

#[tokio::test]
async fn test_expired_plan_is_discarded() {
    let ctx = create_context().await;
    let user = ctx.backend.add_account("late@example.com", PASSWORD);
    let mut stale = PendingPlan::new(Plan::Annual);
    stale.timestamp = Utc::now() - chrono::Duration::hours(25);
    ctx.backend.put_pending_plan(user.id, stale);

    let outcome = ctx
        .auth
        .sign_in(sign_in_request("late@example.com", None))
        .await
        .unwrap();

    assert_eq!(outcome.navigation, Some(Navigation::landing()));
    assert!(ctx.backend.pending_plan(user.id).is_none());
    assert!(ctx.backend.checkouts().is_empty());
}

#[tokio::test]
async fn test_plan_that_cannot_be_cleared_blocks_checkout() {
    let ctx = create_context().await;
    let user = ctx.backend.add_account("stuck@example.com", PASSWORD);
    ctx.backend
        .put_pending_plan(user.id, PendingPlan::new(Plan::Annual));
    ctx.backend.fail_pending_clear(true);

    let outcome = ctx
        .auth
        .sign_in(sign_in_request("stuck@example.com", Some(Plan::Monthly)))
        .await
        .unwrap();

    // Neither the stored plan nor the requested one may start a checkout.
    assert_eq!(outcome.navigation, Some(Navigation::landing()));
    assert!(ctx.backend.checkouts().is_empty());
    assert!(ctx.backend.pending_plan(user.id).is_some());
}

#[tokio::test]
async fn test_no_navigation_outside_auth_routes() {
    let ctx = create_context().await;
    ctx.backend.add_account("browsing@example.com", PASSWORD);

    let mut request = sign_in_request("browsing@example.com", None);
    request.location = Some("/leaderboard".to_string());
    let outcome = ctx.auth.sign_in(request).await.unwrap();

    assert_eq!(outcome.navigation, None);
}

#[tokio::test]
async fn test_checkout_failure_routes_to_subscribe() {
    let ctx = create_context().await;
    ctx.backend.add_account("unlucky@example.com", PASSWORD);
    ctx.backend.fail_checkout(true);

    let outcome = ctx
        .auth
        .sign_in(sign_in_request("unlucky@example.com", Some(Plan::Annual)))
        .await
        .unwrap();

    assert_eq!(
        outcome.navigation,
        Some(Navigation::checkout_error(CheckoutFailure::CheckoutFailed))
    );
    assert!(outcome.view.profile.is_some());
}

#[tokio::test]
async fn test_checkout_without_url_routes_to_subscribe() {
    let ctx = create_context().await;
    ctx.backend.add_account("nourl@example.com", PASSWORD);
    ctx.backend.checkout_without_url(true);

    let outcome = ctx
        .auth
        .sign_in(sign_in_request("nourl@example.com", Some(Plan::Monthly)))
        .await
        .unwrap();

    assert_eq!(
        outcome.navigation,
        Some(Navigation::Internal(
            "/subscribe?error=checkout_url_missing".to_string()
        ))
    );
}

#[tokio::test]
async fn test_sign_up_with_session_resumes_plan() {
    let ctx = create_context().await;

    let result = ctx
        .auth
        .sign_up(SignUpRequest {
            email: "fresh@example.com".to_string(),
            password: PASSWORD.to_string(),
            plan: Some(Plan::Annual),
        })
        .await
        .unwrap();

    assert!(!result.confirmation_required);
    assert!(result.view.is_first_login);
    assert!(is_checkout(&result.navigation));
}

#[tokio::test]
async fn test_sign_up_awaiting_confirmation_defers_plan() {
    let ctx = create_context().await;
    ctx.backend.require_email_confirmation(true);

    let result = ctx
        .auth
        .sign_up(SignUpRequest {
            email: "confirm@example.com".to_string(),
            password: PASSWORD.to_string(),
            plan: Some(Plan::Monthly),
        })
        .await
        .unwrap();

    assert!(result.confirmation_required);
    assert_eq!(result.navigation, None);
    assert!(result.view.user.is_none());

    // The plan survives until the first sign-in, from any page.
    let mut request = sign_in_request("confirm@example.com", None);
    request.location = Some("/leaderboard".to_string());
    let outcome = ctx.auth.sign_in(request).await.unwrap();
    assert!(is_checkout(&outcome.navigation));
    assert_eq!(ctx.backend.checkouts().len(), 1);
}

#[tokio::test]
async fn test_invalid_sign_up_makes_no_calls() {
    let ctx = create_context().await;

    let err = ctx
        .auth
        .sign_up(SignUpRequest {
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            plan: Some(Plan::Annual),
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(ctx.backend.calls.total(), 0);
}

#[tokio::test]
async fn test_invalid_sign_in_makes_no_calls() {
    let ctx = create_context().await;

    let mut request = sign_in_request("athlete@example.com", None);
    request.password = String::new();
    let err = ctx.auth.sign_in(request).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(ctx.backend.calls.total(), 0);
}
