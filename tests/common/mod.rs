// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

use pullup_club::auth::AuthContext;
use pullup_club::config::Config;
use pullup_club::models::{Plan, SignInRequest};
use pullup_club::ports::Backends;
use pullup_club::routes::create_router;
use pullup_club::services::MemoryBackend;
use pullup_club::AppState;
use std::sync::Arc;

#[allow(dead_code)]
pub const PASSWORD: &str = "pull-ups-every-day";

/// An initialized auth context over an in-memory backend.
#[allow(dead_code)]
pub struct TestContext {
    pub config: Config,
    pub backend: Arc<MemoryBackend>,
    pub auth: Arc<AuthContext>,
}

/// Build and initialize a context for `config`.
#[allow(dead_code)]
pub async fn create_context_with(config: Config, backend: Arc<MemoryBackend>) -> TestContext {
    let auth = Arc::new(AuthContext::new(
        &config,
        Backends::from_shared(backend.clone()),
    ));
    auth.init().await.expect("init should succeed");
    TestContext {
        config,
        backend,
        auth,
    }
}

#[allow(dead_code)]
pub async fn create_context() -> TestContext {
    create_context_with(Config::test_default(), Arc::new(MemoryBackend::new())).await
}

/// Sign-in request from the login page.
#[allow(dead_code)]
pub fn sign_in_request(email: &str, plan: Option<Plan>) -> SignInRequest {
    SignInRequest {
        email: email.to_string(),
        password: PASSWORD.to_string(),
        plan,
        location: Some("/login".to_string()),
    }
}

/// Create a test app over an in-memory backend.
/// Returns the router, the shared state and the backend.
#[allow(dead_code)]
pub async fn create_test_app() -> (axum::Router, Arc<AppState>, Arc<MemoryBackend>) {
    let ctx = create_context().await;
    let state = Arc::new(AppState {
        config: ctx.config,
        auth: ctx.auth,
    });
    (create_router(state.clone()), state, ctx.backend)
}
