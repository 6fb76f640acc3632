// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! In-process backend implementing every port.
//!
//! Backs the test suite, the benchmark and offline development. Each port
//! counts its calls and can be told to fail so retry and degradation paths
//! can be exercised without a network.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::subscription::SubscriptionRecord;
use crate::models::{
    CheckoutSession, IdentityMetadata, PendingPlan, Plan, Profile, ProfilePatch, Session,
    SessionUser, SubscriptionStatus,
};
use crate::ports::{
    AdminRoleStore, AuthProvider, BillingApi, CheckoutUrls, PendingPlanStore, ProfileStore,
    SignUpOutcome,
};

/// Per-port call counters.
#[derive(Debug, Default)]
pub struct CallCounts {
    pub auth: AtomicUsize,
    pub profile_reads: AtomicUsize,
    pub profile_writes: AtomicUsize,
    pub admin_lookups: AtomicUsize,
    pub subscription_lookups: AtomicUsize,
    pub checkouts: AtomicUsize,
    pub pending_reads: AtomicUsize,
    pub pending_writes: AtomicUsize,
}

impl CallCounts {
    /// Sum over every port.
    pub fn total(&self) -> usize {
        [
            &self.auth,
            &self.profile_reads,
            &self.profile_writes,
            &self.admin_lookups,
            &self.subscription_lookups,
            &self.checkouts,
            &self.pending_reads,
            &self.pending_writes,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

struct Account {
    user: SessionUser,
    password: String,
    metadata: IdentityMetadata,
}

/// In-memory backend.
#[derive(Default)]
pub struct MemoryBackend {
    accounts: DashMap<String, Account>,
    tokens: DashMap<String, Uuid>,
    profiles: DashMap<Uuid, Profile>,
    admins: DashMap<Uuid, ()>,
    active_subscriptions: DashMap<Uuid, ()>,
    pending: DashMap<Uuid, PendingPlan>,
    checkout_log: Mutex<Vec<(Uuid, Plan)>>,
    paid_sessions: DashMap<String, Uuid>,
    pub calls: CallCounts,
    fail_profile_reads: AtomicU32,
    fail_admin: AtomicBool,
    fail_billing: AtomicBool,
    fail_checkout: AtomicBool,
    checkout_without_url: AtomicBool,
    fail_pending_clear: AtomicBool,
    profile_read_delay_ms: AtomicU32,
    require_confirmation: AtomicBool,
    profile_reads_in_flight: AtomicUsize,
    max_profile_reads_in_flight: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account and return its user.
    pub fn add_account(&self, email: &str, password: &str) -> SessionUser {
        let user = SessionUser {
            id: Uuid::new_v4(),
            email: email.to_string(),
        };
        self.accounts.insert(
            email.to_string(),
            Account {
                user: user.clone(),
                password: password.to_string(),
                metadata: IdentityMetadata::default(),
            },
        );
        user
    }

    /// Set the webhook-written payment flags on an account.
    pub fn set_metadata(&self, email: &str, metadata: IdentityMetadata) {
        if let Some(mut account) = self.accounts.get_mut(email) {
            account.metadata = metadata;
        }
    }

    pub fn put_profile(&self, profile: Profile) {
        self.profiles.insert(profile.id, profile);
    }

    pub fn profile(&self, id: Uuid) -> Option<Profile> {
        self.profiles.get(&id).map(|p| p.clone())
    }

    pub fn profile_count(&self) -> usize {
        self.profiles.len()
    }

    pub fn grant_admin(&self, user_id: Uuid) {
        self.admins.insert(user_id, ());
    }

    pub fn activate_subscription(&self, user_id: Uuid) {
        self.active_subscriptions.insert(user_id, ());
    }

    /// Mark a checkout session id as paid for `user_id`.
    pub fn complete_checkout(&self, session_id: &str, user_id: Uuid) {
        self.paid_sessions.insert(session_id.to_string(), user_id);
    }

    pub fn pending_plan(&self, user_id: Uuid) -> Option<PendingPlan> {
        self.pending.get(&user_id).map(|p| p.clone())
    }

    pub fn put_pending_plan(&self, user_id: Uuid, pending: PendingPlan) {
        self.pending.insert(user_id, pending);
    }

    /// Checkouts created so far, in order.
    pub fn checkouts(&self) -> Vec<(Uuid, Plan)> {
        self.checkout_log
            .lock()
            .map(|log| log.clone())
            .unwrap_or_default()
    }

    /// Issue a session for an account without going through sign-in.
    pub fn issue_session(&self, email: &str) -> Option<Session> {
        let account = self.accounts.get(email)?;
        Some(self.session_for(&account))
    }

    /// Fail the next `n` profile reads with a transient error.
    pub fn fail_next_profile_reads(&self, n: u32) {
        self.fail_profile_reads.store(n, Ordering::SeqCst);
    }

    pub fn fail_admin_lookups(&self, fail: bool) {
        self.fail_admin.store(fail, Ordering::SeqCst);
    }

    pub fn fail_billing(&self, fail: bool) {
        self.fail_billing.store(fail, Ordering::SeqCst);
    }

    pub fn fail_checkout(&self, fail: bool) {
        self.fail_checkout.store(fail, Ordering::SeqCst);
    }

    pub fn checkout_without_url(&self, missing: bool) {
        self.checkout_without_url.store(missing, Ordering::SeqCst);
    }

    /// Fail every pending-plan clear, leaving the plan in place.
    pub fn fail_pending_clear(&self, fail: bool) {
        self.fail_pending_clear.store(fail, Ordering::SeqCst);
    }

    /// Delay every profile read, to keep passes in flight.
    pub fn delay_profile_reads(&self, millis: u32) {
        self.profile_read_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Withhold the session on sign-up until the email is confirmed.
    pub fn require_email_confirmation(&self, required: bool) {
        self.require_confirmation.store(required, Ordering::SeqCst);
    }

    /// Highest number of profile reads that were running at once.
    pub fn max_concurrent_profile_reads(&self) -> usize {
        self.max_profile_reads_in_flight.load(Ordering::SeqCst)
    }

    fn session_for(&self, account: &Account) -> Session {
        let token = format!("mem-{}", Uuid::new_v4());
        self.tokens.insert(token.clone(), account.user.id);
        Session {
            user: account.user.clone(),
            access_token: token,
            refresh_token: Some(format!("mem-refresh-{}", account.user.id)),
            expires_at: Utc::now() + Duration::hours(1),
            metadata: account.metadata.clone(),
            offline: false,
        }
    }

    fn user_for_token(&self, access_token: &str) -> Result<Uuid, AppError> {
        self.tokens
            .get(access_token)
            .map(|id| *id)
            .ok_or(AppError::InvalidSession)
    }
}

#[async_trait]
impl AuthProvider for MemoryBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AppError> {
        self.calls.auth.fetch_add(1, Ordering::SeqCst);
        let account = self
            .accounts
            .get(email)
            .filter(|a| a.password == password)
            .ok_or_else(|| AppError::InvalidCredentials("Invalid login credentials".to_string()))?;
        Ok(self.session_for(&account))
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AppError> {
        self.calls.auth.fetch_add(1, Ordering::SeqCst);
        if self.accounts.contains_key(email) {
            return Err(AppError::Validation("User already registered".to_string()));
        }
        let user = self.add_account(email, password);
        let session = if self.require_confirmation.load(Ordering::SeqCst) {
            None
        } else {
            self.issue_session(email)
        };
        Ok(SignUpOutcome { user, session })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        self.calls.auth.fetch_add(1, Ordering::SeqCst);
        self.tokens.remove(access_token);
        Ok(())
    }

    async fn exchange_code(&self, auth_code: &str, _code_verifier: &str) -> Result<Session, AppError> {
        self.calls.auth.fetch_add(1, Ordering::SeqCst);
        // Codes are account emails in this backend.
        self.issue_session(auth_code)
            .ok_or_else(|| AppError::InvalidCredentials("Invalid authorization code".to_string()))
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AppError> {
        self.calls.auth.fetch_add(1, Ordering::SeqCst);
        let account = self
            .accounts
            .iter()
            .find(|a| refresh_token == format!("mem-refresh-{}", a.user.id))
            .ok_or(AppError::InvalidSession)?;
        Ok(self.session_for(&account))
    }

    async fn send_password_reset(&self, _email: &str, _redirect_to: &str) -> Result<(), AppError> {
        self.calls.auth.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn update_password(&self, access_token: &str, password: &str) -> Result<(), AppError> {
        self.calls.auth.fetch_add(1, Ordering::SeqCst);
        let user_id = self.user_for_token(access_token)?;
        for mut account in self.accounts.iter_mut() {
            if account.user.id == user_id {
                account.password = password.to_string();
            }
        }
        Ok(())
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String {
        format!(
            "memory://authorize?provider={}&redirect_to={}&code_challenge={}",
            provider,
            urlencoding::encode(redirect_to),
            code_challenge
        )
    }
}

#[async_trait]
impl ProfileStore for MemoryBackend {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, AppError> {
        self.calls.profile_reads.fetch_add(1, Ordering::SeqCst);
        let in_flight = self.profile_reads_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_profile_reads_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);
        let delay = self.profile_read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(delay as u64)).await;
        }
        self.profile_reads_in_flight.fetch_sub(1, Ordering::SeqCst);
        let remaining = self.fail_profile_reads.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_profile_reads.store(remaining - 1, Ordering::SeqCst);
            return Err(AppError::Backend("profiles: connection reset".to_string()));
        }
        Ok(self.profile(id))
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<Profile, AppError> {
        self.calls.profile_writes.fetch_add(1, Ordering::SeqCst);
        if self.profiles.contains_key(&profile.id) {
            return Err(AppError::BackendStatus {
                status: 409,
                message: "duplicate key value violates unique constraint \"profiles_pkey\""
                    .to_string(),
            });
        }
        self.profiles.insert(profile.id, profile.clone());
        Ok(profile.clone())
    }

    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> Result<Profile, AppError> {
        self.calls.profile_writes.fetch_add(1, Ordering::SeqCst);
        let mut row = self
            .profiles
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Profile {}", id)))?;
        row.apply(patch);
        Ok(row.clone())
    }
}

#[async_trait]
impl AdminRoleStore for MemoryBackend {
    async fn has_admin_role(&self, user_id: Uuid) -> Result<bool, AppError> {
        self.calls.admin_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_admin.load(Ordering::SeqCst) {
            return Err(AppError::BackendStatus {
                status: 500,
                message: "admin_roles: permission denied".to_string(),
            });
        }
        Ok(self.admins.contains_key(&user_id))
    }
}

#[async_trait]
impl BillingApi for MemoryBackend {
    async fn subscription_status(&self, access_token: &str) -> Result<SubscriptionStatus, AppError> {
        self.calls.subscription_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_billing.load(Ordering::SeqCst) {
            return Err(AppError::Backend("subscription-status: connection refused".to_string()));
        }
        let user_id = self.user_for_token(access_token)?;
        let subscription = self
            .active_subscriptions
            .contains_key(&user_id)
            .then(|| SubscriptionRecord {
                status: "active".to_string(),
                plan: None,
                current_period_end: None,
                cancel_at_period_end: false,
            });
        Ok(SubscriptionStatus { subscription })
    }

    async fn create_checkout(
        &self,
        access_token: &str,
        plan: Plan,
        _urls: &CheckoutUrls,
    ) -> Result<CheckoutSession, AppError> {
        self.calls.checkouts.fetch_add(1, Ordering::SeqCst);
        if self.fail_checkout.load(Ordering::SeqCst) {
            return Err(AppError::Payment("create-checkout: stripe unavailable".to_string()));
        }
        let user_id = self.user_for_token(access_token)?;
        if let Ok(mut log) = self.checkout_log.lock() {
            log.push((user_id, plan));
        }
        let session_id = format!("cs_test_{}", Uuid::new_v4().simple());
        let url = (!self.checkout_without_url.load(Ordering::SeqCst))
            .then(|| format!("https://checkout.stripe.com/c/pay/{}", session_id));
        Ok(CheckoutSession {
            url,
            session_id: Some(session_id),
        })
    }

    async fn customer_portal(
        &self,
        access_token: &str,
        _return_url: &str,
    ) -> Result<CheckoutSession, AppError> {
        self.user_for_token(access_token)?;
        Ok(CheckoutSession {
            url: Some("https://billing.stripe.com/p/session/test".to_string()),
            session_id: None,
        })
    }

    async fn verify_checkout_session(
        &self,
        access_token: &str,
        session_id: &str,
    ) -> Result<bool, AppError> {
        let user_id = self.user_for_token(access_token)?;
        let paid = self
            .paid_sessions
            .get(session_id)
            .is_some_and(|owner| *owner == user_id);
        if paid {
            self.active_subscriptions.insert(user_id, ());
            if let Some(mut row) = self.profiles.get_mut(&user_id) {
                row.is_paid = true;
            }
        }
        Ok(paid)
    }
}

#[async_trait]
impl PendingPlanStore for MemoryBackend {
    async fn get_pending_plan(&self, user_id: Uuid) -> Result<Option<PendingPlan>, AppError> {
        self.calls.pending_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.pending_plan(user_id))
    }

    async fn save_pending_plan(&self, user_id: Uuid, pending: &PendingPlan) -> Result<(), AppError> {
        self.calls.pending_writes.fetch_add(1, Ordering::SeqCst);
        self.pending.insert(user_id, pending.clone());
        Ok(())
    }

    async fn clear_pending_plan(&self, user_id: Uuid) -> Result<(), AppError> {
        self.calls.pending_writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_pending_clear.load(Ordering::SeqCst) {
            return Err(AppError::Backend(
                "clear_pending_subscription: connection reset".to_string(),
            ));
        }
        self.pending.remove(&user_id);
        Ok(())
    }
}
