// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Auth view and profile settings API.

use axum::{
    extract::{Extension, State},
    routing::{get, patch},
    Json, Router,
};
use std::sync::Arc;

use crate::auth::AuthView;
use crate::error::Result;
use crate::middleware::CurrentSession;
use crate::models::{Profile, ProfilePatch};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me))
        .route("/api/profile", patch(update_profile))
}

/// Current consolidated auth view.
async fn get_me(State(state): State<Arc<AppState>>) -> Json<AuthView> {
    Json(state.auth.view())
}

/// Save profile settings.
async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
    Json(patch): Json<ProfilePatch>,
) -> Result<Json<Profile>> {
    tracing::debug!(user_id = %session.user.id, "Profile update requested");
    Ok(Json(state.auth.update_profile(patch).await?))
}
