// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! OAuth sign-in through the router.
//!
//! The in-memory provider accepts the account email as the authorization
//! code, so a callback can be driven directly from the start redirect.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
};
use pullup_club::middleware::SESSION_COOKIE;
use pullup_club::models::Plan;
use pullup_club::services::pkce::{OAuthIntent, FLOW_COOKIE};
use tower::ServiceExt;

mod common;
use common::{create_test_app, PASSWORD};

fn location(response: &Response) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect should have a location")
        .to_str()
        .unwrap()
        .to_string()
}

/// `name=value` of the flow cookie set by the start route.
fn flow_cookie(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(FLOW_COOKIE))
        .and_then(|v| v.split(';').next())
        .expect("flow cookie should be set")
        .to_string()
}

/// The signed intent carried in the provider's `redirect_to`.
fn intent_from_authorize_url(url: &str) -> String {
    let redirect_to = url
        .split("redirect_to=")
        .nth(1)
        .and_then(|rest| rest.split('&').next())
        .expect("authorize url should carry redirect_to");
    let redirect_to = urlencoding::decode(redirect_to).unwrap();
    assert!(redirect_to.starts_with("http://localhost:8080/auth/callback?"));
    redirect_to
        .split("intent=")
        .nth(1)
        .expect("redirect_to should carry the intent")
        .to_string()
}

async fn start(app: &axum::Router, query: &str) -> Response {
    app.clone()
        .oneshot(
            Request::builder()
                .uri(format!("/auth/oauth/start{}", query))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

async fn callback(app: &axum::Router, query: &str, cookie: Option<&str>) -> Response {
    let mut request = Request::builder().uri(format!("/auth/callback{}", query));
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_start_redirects_to_provider_with_flow_cookie() {
    let (app, _state, _backend) = create_test_app().await;

    let response = start(&app, "?provider=google&plan=annual&location=/signup").await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let url = location(&response);
    assert!(url.starts_with("memory://authorize?provider=google&redirect_to="));
    assert!(url.contains("code_challenge="));

    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Path=/auth/callback"));
}

#[tokio::test]
async fn test_unsupported_provider_is_rejected() {
    let (app, _state, _backend) = create_test_app().await;

    let response = start(&app, "?provider=myspace").await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_resumes_intended_plan() {
    let (app, state, backend) = create_test_app().await;
    let user = backend.add_account("oauth@example.com", PASSWORD);

    let started = start(&app, "?plan=annual&location=/signup").await;
    let cookie = flow_cookie(&started);
    let intent = intent_from_authorize_url(&location(&started));

    let response = callback(
        &app,
        &format!("?code=oauth@example.com&intent={}", intent),
        Some(&cookie),
    )
    .await;

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert!(location(&response).starts_with("https://checkout.stripe.com/"));
    assert_eq!(backend.checkouts(), vec![(user.id, Plan::Annual)]);
    assert_eq!(state.auth.view().user.map(|u| u.id), Some(user.id));

    let token = state.auth.sessions().current_session().unwrap().access_token;
    let session_cookie = response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with(SESSION_COOKIE))
        .expect("callback should set the session cookie");
    assert!(session_cookie.starts_with(&format!("{}={};", SESSION_COOKIE, token)));
    assert!(session_cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_tampered_intent_falls_back_to_landing() {
    let (app, _state, backend) = create_test_app().await;
    backend.add_account("oauth@example.com", PASSWORD);

    let started = start(&app, "").await;
    let cookie = flow_cookie(&started);
    let forged = OAuthIntent::new("/signup", Some(Plan::Annual))
        .unwrap()
        .sign(b"not_the_server_key_but_long_enough")
        .unwrap();

    let response = callback(
        &app,
        &format!("?code=oauth@example.com&intent={}", forged),
        Some(&cookie),
    )
    .await;

    assert_eq!(location(&response), "http://localhost:5173/profile");
    assert!(backend.checkouts().is_empty());
}

#[tokio::test]
async fn test_callback_without_flow_cookie_fails() {
    let (app, state, backend) = create_test_app().await;
    backend.add_account("oauth@example.com", PASSWORD);

    let response = callback(&app, "?code=oauth@example.com", None).await;

    assert_eq!(
        location(&response),
        "http://localhost:5173/login?error=oauth_failed"
    );
    assert!(state.auth.view().user.is_none());
    assert_eq!(backend.calls.total(), 0);
}

#[tokio::test]
async fn test_flow_cookie_is_single_use() {
    let (app, _state, backend) = create_test_app().await;
    backend.add_account("oauth@example.com", PASSWORD);

    let started = start(&app, "").await;
    let cookie = flow_cookie(&started);

    let first = callback(&app, "?code=oauth@example.com", Some(&cookie)).await;
    assert_eq!(location(&first), "http://localhost:5173/profile");

    let replay = callback(&app, "?code=oauth@example.com", Some(&cookie)).await;
    assert_eq!(
        location(&replay),
        "http://localhost:5173/login?error=oauth_failed"
    );
}

#[tokio::test]
async fn test_provider_error_redirects_to_login() {
    let (app, _state, _backend) = create_test_app().await;

    let response = callback(&app, "?error=access_denied", None).await;

    assert_eq!(
        location(&response),
        "http://localhost:5173/login?error=access_denied"
    );
}
