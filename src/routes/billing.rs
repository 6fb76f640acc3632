// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Stripe customer portal and post-checkout routes.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::error::Result;
use crate::navigation::{CheckoutFailure, Navigation};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/billing/portal", get(portal))
        .route("/billing/success", get(checkout_success))
}

/// Redirect to the Stripe customer portal.
async fn portal(State(state): State<Arc<AppState>>) -> Result<Redirect> {
    let url = state.auth.billing_portal().await?;
    Ok(Redirect::temporary(&url))
}

#[derive(Deserialize)]
pub struct SuccessParams {
    session_id: String,
}

/// Checkout return URL - verify payment, refresh state, go to the app.
async fn checkout_success(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuccessParams>,
) -> Result<Redirect> {
    let target = if state.auth.verify_checkout(&params.session_id).await? {
        Navigation::landing()
    } else {
        tracing::warn!(session_id = %params.session_id, "Checkout session not paid");
        Navigation::checkout_error(CheckoutFailure::PaymentNotVerified)
    };
    Ok(Redirect::temporary(&target.to_url(&state.config.site_url)))
}
