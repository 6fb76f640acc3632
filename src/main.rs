// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Pull-Up Club companion server
//!
//! Restores the persisted session, keeps the auth view reconciled with
//! Supabase and Stripe, and serves it to the web app.

use pullup_club::{
    auth::AuthContext,
    config::{BackendKind, Config},
    ports::Backends,
    services::{MemoryBackend, SupabaseClient},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, backend = ?config.backend, "Starting Pull-Up Club server");

    let backends = match config.backend {
        BackendKind::Supabase => {
            let client = SupabaseClient::new(
                &config.supabase_url,
                &config.supabase_anon_key,
                config.reconcile.http_timeout,
            )?;
            tracing::info!(url = %config.supabase_url, "Supabase client initialized");
            Backends::from_shared(Arc::new(client))
        }
        BackendKind::Memory => {
            tracing::warn!("Using in-memory backend, nothing will be persisted remotely");
            Backends::from_shared(Arc::new(MemoryBackend::new()))
        }
    };

    // Subscribe to auth changes and restore any persisted session
    let auth = Arc::new(AuthContext::new(&config, backends));
    auth.init().await?;

    let state = Arc::new(AppState {
        config: config.clone(),
        auth: auth.clone(),
    });

    // Build router
    let app = pullup_club::routes::create_router(state);

    // Start server
    let addr = format!("{}:{}", config.bind_host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    auth.dispose();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("pullup_club=debug,info"));

    tracing_subscriber::registry().with(filter).with(format).init();
}
