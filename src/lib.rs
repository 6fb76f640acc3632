// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Pull-Up Club: session, profile and subscription reconciliation.
//!
//! This crate keeps one consolidated view of the signed-in user (profile,
//! admin flag, subscription state) in sync with Supabase and Stripe, and
//! serves it to the web app over a small HTTP API.

pub mod auth;
pub mod config;
pub mod error;
pub mod middleware;
pub mod models;
pub mod navigation;
pub mod ports;
pub mod routes;
pub mod services;

use std::sync::Arc;

use auth::AuthContext;
use config::Config;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub auth: Arc<AuthContext>,
}
