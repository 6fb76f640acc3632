// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Subscription evaluation. Never fails: billing outages degrade according
//! to the configured [`BillingFailurePolicy`].

use std::sync::Arc;

use crate::config::BillingFailurePolicy;
use crate::models::{Session, SubscriptionState};
use crate::ports::BillingApi;

#[derive(Clone)]
pub struct SubscriptionEvaluator {
    billing: Arc<dyn BillingApi>,
    policy: BillingFailurePolicy,
}

impl SubscriptionEvaluator {
    pub fn new(billing: Arc<dyn BillingApi>, policy: BillingFailurePolicy) -> Self {
        Self { billing, policy }
    }

    /// `Active` or `Unpaid` for the session's user.
    pub async fn evaluate(&self, session: &Session) -> SubscriptionState {
        // Development sessions have no billing account.
        if session.offline {
            return SubscriptionState::Active;
        }

        match self.billing.subscription_status(&session.access_token).await {
            Ok(status) if status.is_active() => SubscriptionState::Active,
            Ok(status) => {
                tracing::debug!(
                    user_id = %session.user.id,
                    status = ?status.subscription.as_ref().map(|s| s.status.as_str()),
                    "No active subscription"
                );
                SubscriptionState::Unpaid
            }
            Err(e) => {
                let state = match self.policy {
                    BillingFailurePolicy::TreatAsUnpaid => SubscriptionState::Unpaid,
                    BillingFailurePolicy::TreatAsActive => SubscriptionState::Active,
                };
                tracing::warn!(
                    error = %e,
                    user_id = %session.user.id,
                    fallback = ?state,
                    "Subscription lookup failed"
                );
                state
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::MemoryBackend;

    #[tokio::test]
    async fn test_active_and_unpaid() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_account("a@example.com", "password123");
        let session = backend.issue_session("a@example.com").unwrap();
        let evaluator = SubscriptionEvaluator::new(backend.clone(), BillingFailurePolicy::TreatAsUnpaid);

        assert_eq!(evaluator.evaluate(&session).await, SubscriptionState::Unpaid);
        backend.activate_subscription(session.user.id);
        assert_eq!(evaluator.evaluate(&session).await, SubscriptionState::Active);
    }

    #[tokio::test]
    async fn test_billing_failure_applies_policy() {
        let backend = Arc::new(MemoryBackend::new());
        backend.add_account("a@example.com", "password123");
        let session = backend.issue_session("a@example.com").unwrap();
        backend.activate_subscription(session.user.id);
        backend.fail_billing(true);

        let strict = SubscriptionEvaluator::new(backend.clone(), BillingFailurePolicy::TreatAsUnpaid);
        assert_eq!(strict.evaluate(&session).await, SubscriptionState::Unpaid);

        let grace = SubscriptionEvaluator::new(backend.clone(), BillingFailurePolicy::TreatAsActive);
        assert_eq!(grace.evaluate(&session).await, SubscriptionState::Active);
    }
}
