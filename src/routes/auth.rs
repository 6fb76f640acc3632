// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Sign-in, sign-up, sign-out, password and OAuth routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Redirect,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use std::sync::Arc;

use crate::auth::{SignInOutcome, SignUpResult};
use crate::error::Result;
use crate::middleware::auth::{clear_session_cookie, session_cookie};
use crate::models::{
    PasswordResetRequest, PasswordUpdate, Plan, Session, SignInRequest, SignUpRequest,
};
use crate::navigation::{Navigation, LOGIN_ROUTE, OAUTH_CALLBACK_ROUTE};
use crate::services::pkce::FLOW_COOKIE;
use crate::AppState;

/// Routes usable without a session.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/sign-in", post(sign_in))
        .route("/auth/sign-up", post(sign_up))
        .route("/auth/password/reset", post(request_password_reset))
        .route("/auth/oauth/start", get(oauth_start))
        .route(OAUTH_CALLBACK_ROUTE, get(oauth_callback))
}

/// Routes that act on the current session.
pub fn session_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/sign-out", post(sign_out))
        .route("/auth/password/update", post(update_password))
}

/// Add the session cookie for `session`, when there is one.
fn with_session(state: &AppState, jar: CookieJar, session: Option<&Session>) -> CookieJar {
    match session {
        Some(session) => jar.add(session_cookie(
            session.access_token.clone(),
            state.config.public_url.starts_with("https://"),
        )),
        None => jar,
    }
}

async fn sign_in(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<SignInRequest>,
) -> Result<(CookieJar, Json<SignInOutcome>)> {
    let outcome = state.auth.sign_in(request).await?;
    let jar = with_session(&state, jar, outcome.session.as_ref());
    Ok((jar, Json(outcome)))
}

async fn sign_up(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<SignUpRequest>,
) -> Result<(CookieJar, Json<SignUpResult>)> {
    let result = state.auth.sign_up(request).await?;
    let jar = with_session(&state, jar, result.session.as_ref());
    Ok((jar, Json(result)))
}

async fn sign_out(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode)> {
    let jar = jar.remove(clear_session_cookie());
    state.auth.sign_out().await?;
    Ok((jar, StatusCode::NO_CONTENT))
}

async fn request_password_reset(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PasswordResetRequest>,
) -> Result<StatusCode> {
    state.auth.request_password_reset(request).await?;
    Ok(StatusCode::ACCEPTED)
}

async fn update_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PasswordUpdate>,
) -> Result<StatusCode> {
    state.auth.update_password(request).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Query parameters for starting an OAuth sign-in.
#[derive(Deserialize)]
pub struct OAuthStartParams {
    #[serde(default = "default_provider")]
    provider: String,
    #[serde(default)]
    plan: Option<Plan>,
    /// Route the user was on, restored after sign-in.
    #[serde(default)]
    location: Option<String>,
}

fn default_provider() -> String {
    "google".to_string()
}

/// Start OAuth flow - redirect to the provider with a PKCE challenge.
async fn oauth_start(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<OAuthStartParams>,
) -> Result<(CookieJar, Redirect)> {
    let start = state
        .auth
        .start_oauth(&params.provider, params.location.as_deref(), params.plan)?;

    let cookie = Cookie::build((FLOW_COOKIE, start.flow_id))
        .path(OAUTH_CALLBACK_ROUTE)
        .http_only(true)
        .secure(state.config.public_url.starts_with("https://"))
        .same_site(SameSite::Lax)
        .build();

    Ok((jar.add(cookie), Redirect::temporary(&start.authorize_url)))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    intent: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback - exchange the code, reconcile, redirect to the decided route.
async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Redirect) {
    let site_url = &state.config.site_url;
    let flow_id = jar.get(FLOW_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::build(FLOW_COOKIE).path(OAUTH_CALLBACK_ROUTE));
    let login_error = |reason: &str| {
        Redirect::temporary(&format!("{}{}?error={}", site_url, LOGIN_ROUTE, urlencoding::encode(reason)))
    };

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from provider");
        return (jar, login_error(&error));
    }
    let Some(code) = params.code else {
        tracing::warn!("OAuth callback without code");
        return (jar, login_error("missing_code"));
    };

    match state
        .auth
        .complete_oauth(&code, flow_id.as_deref(), params.intent.as_deref())
        .await
    {
        Ok(outcome) => {
            let jar = with_session(&state, jar, outcome.session.as_ref());
            let target = outcome.navigation.unwrap_or_else(Navigation::landing);
            (jar, Redirect::temporary(&target.to_url(site_url)))
        }
        Err(e) => {
            tracing::warn!(error = %e, "OAuth sign-in failed");
            (jar, login_error("oauth_failed"))
        }
    }
}
