// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Session guards for protected routes.
//!
//! A request is authorized only when it carries the access token of the
//! stored session, either in the session cookie or as a bearer token.

use crate::error::AppError;
use crate::models::Session;
use crate::navigation::LOGIN_ROUTE;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Cookie holding the access token of the signed-in browser.
pub const SESSION_COOKIE: &str = "puc_session";

/// Session of the signed-in user, inserted by the guards.
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

/// Session cookie for `access_token`, scoped to the whole companion server.
pub fn session_cookie(access_token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, access_token))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

/// Removal cookie matching [`session_cookie`].
pub fn clear_session_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}

/// Token presented by the request. Cookie first, then header.
fn presented_token(jar: &CookieJar, request: &Request) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn authorized_session(state: &AppState, token: Option<&str>) -> Result<Session, AppError> {
    let token = token.ok_or(AppError::Unauthorized)?;
    let session = state.auth.sessions().require_session()?;

    if !bool::from(session.access_token.as_bytes().ct_eq(token.as_bytes())) {
        return Err(AppError::Unauthorized);
    }
    if session.expires_within(chrono::Duration::zero()) {
        return Err(AppError::InvalidSession);
    }
    Ok(session)
}

/// API guard: 401 JSON unless the request carries the current session.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = presented_token(&jar, &request);
    let session = authorized_session(&state, token.as_deref())?;
    request.extensions_mut().insert(CurrentSession(session));
    Ok(next.run(request).await)
}

/// Browser guard: redirect to the login page unless the request carries the
/// current session.
pub async fn require_browser_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let token = presented_token(&jar, &request);
    match authorized_session(&state, token.as_deref()) {
        Ok(session) => {
            request.extensions_mut().insert(CurrentSession(session));
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(error = %e, path = %request.uri().path(), "No session, redirecting to login");
            Redirect::temporary(&format!("{}{}", state.config.site_url, LOGIN_ROUTE)).into_response()
        }
    }
}
