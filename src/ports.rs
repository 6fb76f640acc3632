// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Backend seams consumed by the reconciliation components.
//!
//! `SupabaseClient` implements these against the hosted project and
//! `MemoryBackend` implements them in-process.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    CheckoutSession, PendingPlan, Plan, Profile, ProfilePatch, Session, SessionUser,
    SubscriptionStatus,
};

/// Outcome of a sign-up. Email confirmation may withhold the session.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub user: SessionUser,
    pub session: Option<Session>,
}

/// Hosted authentication provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome>;

    /// Revoke the session server-side.
    async fn sign_out(&self, access_token: &str) -> Result<()>;

    /// Exchange a PKCE authorization code for a session.
    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> Result<Session>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session>;

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<()>;

    async fn update_password(&self, access_token: &str, password: &str) -> Result<()>;

    /// Provider authorize URL for an OAuth sign-in with an S256 PKCE challenge.
    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String;

    /// Called whenever the current session changes so table requests can
    /// carry the user's token.
    fn set_session_token(&self, _token: Option<&str>) {}
}

/// The `profiles` table.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Point lookup by primary key. `Ok(None)` when no row exists.
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>>;

    async fn insert_profile(&self, profile: &Profile) -> Result<Profile>;

    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> Result<Profile>;
}

/// The `admin_roles` allow-list table.
#[async_trait]
pub trait AdminRoleStore: Send + Sync {
    async fn has_admin_role(&self, user_id: Uuid) -> Result<bool>;
}

/// URLs the payment provider redirects back to.
#[derive(Debug, Clone)]
pub struct CheckoutUrls {
    pub success_url: String,
    pub cancel_url: String,
}

/// Billing edge functions in front of Stripe.
#[async_trait]
pub trait BillingApi: Send + Sync {
    async fn subscription_status(&self, access_token: &str) -> Result<SubscriptionStatus>;

    async fn create_checkout(
        &self,
        access_token: &str,
        plan: Plan,
        urls: &CheckoutUrls,
    ) -> Result<CheckoutSession>;

    async fn customer_portal(&self, access_token: &str, return_url: &str)
        -> Result<CheckoutSession>;

    /// Confirm a completed checkout session. Returns whether it was paid.
    async fn verify_checkout_session(&self, access_token: &str, session_id: &str) -> Result<bool>;
}

/// Server-side storage of [`PendingPlan`]s keyed by user id.
#[async_trait]
pub trait PendingPlanStore: Send + Sync {
    async fn get_pending_plan(&self, user_id: Uuid) -> Result<Option<PendingPlan>>;

    async fn save_pending_plan(&self, user_id: Uuid, pending: &PendingPlan) -> Result<()>;

    async fn clear_pending_plan(&self, user_id: Uuid) -> Result<()>;
}

/// Every backend port, shared.
#[derive(Clone)]
pub struct Backends {
    pub auth: Arc<dyn AuthProvider>,
    pub profiles: Arc<dyn ProfileStore>,
    pub roles: Arc<dyn AdminRoleStore>,
    pub billing: Arc<dyn BillingApi>,
    pub pending: Arc<dyn PendingPlanStore>,
}

impl Backends {
    /// Use one implementation for every port.
    pub fn from_shared<B>(backend: Arc<B>) -> Self
    where
        B: AuthProvider + ProfileStore + AdminRoleStore + BillingApi + PendingPlanStore + 'static,
    {
        Self {
            auth: backend.clone(),
            profiles: backend.clone(),
            roles: backend.clone(),
            billing: backend.clone(),
            pending: backend,
        }
    }
}
