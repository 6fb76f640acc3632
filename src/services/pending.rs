// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Resumes a checkout the user chose before authenticating.
//!
//! Runs only after a live sign-in. A pending plan stored server-side is
//! consumed first (cleared before checkout starts, so a reload cannot start
//! a second checkout). Failing that, a plan carried in the navigation state
//! is used. Checkout failures become navigation to the pricing page with an
//! error code instead of errors.

use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{PendingPlan, Plan, Session};
use crate::navigation::{is_auth_entry, CheckoutFailure, Navigation, NavigationState};
use crate::ports::{BillingApi, CheckoutUrls, PendingPlanStore};

/// Outcome of consuming a stored pending plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingTake {
    /// Cleared from the store and still fresh.
    Taken(Plan),
    /// Nothing stored, or the stored plan had expired.
    Empty,
    /// A plan is stored but could not be cleared. No checkout may start.
    Uncleared,
}

#[derive(Clone)]
pub struct PendingActionProcessor {
    billing: Arc<dyn BillingApi>,
    store: Arc<dyn PendingPlanStore>,
    urls: CheckoutUrls,
    ttl: Duration,
}

impl PendingActionProcessor {
    pub fn new(
        billing: Arc<dyn BillingApi>,
        store: Arc<dyn PendingPlanStore>,
        urls: CheckoutUrls,
        ttl: Duration,
    ) -> Self {
        Self {
            billing,
            store,
            urls,
            ttl,
        }
    }

    /// Decide where to send the user after signing in.
    pub async fn process(&self, session: &Session, intent: &NavigationState) -> Option<Navigation> {
        if session.offline {
            return is_auth_entry(&intent.location).then(Navigation::landing);
        }

        let user_id = session.user_id();
        let plan = match self.take_pending(user_id).await {
            PendingTake::Taken(plan) => {
                tracing::info!(%user_id, plan = %plan, "Resuming checkout from pending plan");
                Some(plan)
            }
            PendingTake::Uncleared => None,
            PendingTake::Empty => intent.intended_plan.inspect(|plan| {
                tracing::info!(%user_id, plan = %plan, "Resuming checkout from navigation state");
            }),
        };

        match plan {
            Some(plan) => Some(self.checkout(session, plan).await),
            None if is_auth_entry(&intent.location) => Some(Navigation::landing()),
            None => None,
        }
    }

    /// Read and delete the user's pending plan.
    ///
    /// A read failure counts as [`PendingTake::Empty`].
    pub async fn take_pending(&self, user_id: Uuid) -> PendingTake {
        let pending = match self.store.get_pending_plan(user_id).await {
            Ok(Some(pending)) => pending,
            Ok(None) => return PendingTake::Empty,
            Err(e) => {
                tracing::warn!(error = %e, %user_id, "Failed to read pending plan");
                return PendingTake::Empty;
            }
        };

        if let Err(e) = self.store.clear_pending_plan(user_id).await {
            tracing::warn!(error = %e, %user_id, "Failed to clear pending plan, not resuming checkout");
            return PendingTake::Uncleared;
        }

        if pending.is_expired(self.ttl) {
            tracing::info!(%user_id, saved_at = %pending.timestamp, "Discarding expired pending plan");
            return PendingTake::Empty;
        }
        PendingTake::Taken(pending.plan)
    }

    /// Remember a plan until the user's next sign-in.
    pub async fn defer(&self, user_id: Uuid, plan: Plan) -> Result<(), AppError> {
        tracing::info!(%user_id, plan = %plan, "Saving pending plan");
        self.store
            .save_pending_plan(user_id, &PendingPlan::new(plan))
            .await
    }

    /// Start a hosted checkout for `plan`.
    pub async fn checkout(&self, session: &Session, plan: Plan) -> Navigation {
        match self
            .billing
            .create_checkout(&session.access_token, plan, &self.urls)
            .await
        {
            Ok(checkout) => match checkout.url {
                Some(url) => {
                    tracing::info!(
                        user_id = %session.user.id,
                        plan = %plan,
                        session_id = ?checkout.session_id,
                        "Redirecting to checkout"
                    );
                    Navigation::External(url)
                }
                None => {
                    tracing::error!(user_id = %session.user.id, plan = %plan, "Checkout session has no URL");
                    Navigation::checkout_error(CheckoutFailure::CheckoutUrlMissing)
                }
            },
            Err(e) => {
                tracing::error!(error = %e, user_id = %session.user.id, plan = %plan, "Checkout creation failed");
                Navigation::checkout_error(CheckoutFailure::CheckoutFailed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::MemoryBackend;
    use chrono::Utc;

    fn processor(backend: &Arc<MemoryBackend>) -> PendingActionProcessor {
        PendingActionProcessor::new(
            backend.clone(),
            backend.clone(),
            CheckoutUrls {
                success_url: "http://localhost:8080/billing/success".to_string(),
                cancel_url: "http://localhost:5173/subscribe".to_string(),
            },
            Duration::from_secs(24 * 60 * 60),
        )
    }

    fn signed_in(backend: &MemoryBackend) -> Session {
        backend.add_account("buyer@example.com", "password123");
        backend.issue_session("buyer@example.com").unwrap()
    }

    #[tokio::test]
    async fn test_pending_plan_consumed_once() {
        let backend = Arc::new(MemoryBackend::new());
        let session = signed_in(&backend);
        backend.put_pending_plan(session.user.id, PendingPlan::new(Plan::Annual));
        let intent = NavigationState::at("/login");

        let first = processor(&backend).process(&session, &intent).await;
        assert!(matches!(first, Some(Navigation::External(_))));
        assert!(backend.pending_plan(session.user.id).is_none());

        let second = processor(&backend).process(&session, &intent).await;
        assert_eq!(second, Some(Navigation::landing()));
        assert_eq!(backend.checkouts(), vec![(session.user.id, Plan::Annual)]);
    }

    #[tokio::test]
    async fn test_intended_plan_used_without_pending() {
        let backend = Arc::new(MemoryBackend::new());
        let session = signed_in(&backend);
        let intent = NavigationState::at("/login").with_plan(Some(Plan::Monthly));

        let nav = processor(&backend).process(&session, &intent).await;
        assert!(matches!(nav, Some(Navigation::External(_))));
        assert_eq!(backend.checkouts(), vec![(session.user.id, Plan::Monthly)]);
    }

    #[tokio::test]
    async fn test_no_action_off_auth_routes() {
        let backend = Arc::new(MemoryBackend::new());
        let session = signed_in(&backend);

        let nav = processor(&backend)
            .process(&session, &NavigationState::at("/leaderboard"))
            .await;
        assert_eq!(nav, None);
    }

    #[tokio::test]
    async fn test_expired_plan_is_cleared_and_ignored() {
        let backend = Arc::new(MemoryBackend::new());
        let session = signed_in(&backend);
        backend.put_pending_plan(
            session.user.id,
            PendingPlan {
                plan: Plan::Monthly,
                timestamp: Utc::now() - chrono::Duration::hours(25),
            },
        );

        let nav = processor(&backend)
            .process(&session, &NavigationState::at("/login"))
            .await;
        assert_eq!(nav, Some(Navigation::landing()));
        assert!(backend.pending_plan(session.user.id).is_none());
        assert!(backend.checkouts().is_empty());
    }

    #[tokio::test]
    async fn test_uncleared_plan_blocks_every_checkout() {
        let backend = Arc::new(MemoryBackend::new());
        let session = signed_in(&backend);
        backend.put_pending_plan(session.user.id, PendingPlan::new(Plan::Annual));
        backend.fail_pending_clear(true);
        let intent = NavigationState::at("/login").with_plan(Some(Plan::Monthly));

        assert_eq!(
            processor(&backend).take_pending(session.user.id).await,
            PendingTake::Uncleared
        );
        let nav = processor(&backend).process(&session, &intent).await;
        assert_eq!(nav, Some(Navigation::landing()));
        assert!(backend.checkouts().is_empty());
        assert!(backend.pending_plan(session.user.id).is_some());
    }

    #[tokio::test]
    async fn test_checkout_errors_become_routes() {
        let backend = Arc::new(MemoryBackend::new());
        let session = signed_in(&backend);

        backend.checkout_without_url(true);
        let nav = processor(&backend).checkout(&session, Plan::Monthly).await;
        assert_eq!(nav, Navigation::checkout_error(CheckoutFailure::CheckoutUrlMissing));

        backend.fail_checkout(true);
        let nav = processor(&backend).checkout(&session, Plan::Monthly).await;
        assert_eq!(nav, Navigation::checkout_error(CheckoutFailure::CheckoutFailed));
    }
}
