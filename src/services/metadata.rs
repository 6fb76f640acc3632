// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Copies payment flags from identity metadata into the profile row.
//!
//! The Stripe webhook writes `is_paid` and `stripe_customer_id` into the
//! user's auth metadata. When the profile row lags behind, it is patched.
//! Values only ever flow metadata to profile.

use std::sync::Arc;

use crate::models::{IdentityMetadata, Profile, ProfilePatch, Session};
use crate::ports::ProfileStore;

/// Patch needed to bring `profile` in line with `metadata`, if any.
pub fn plan_patch(profile: &Profile, metadata: &IdentityMetadata) -> Option<ProfilePatch> {
    let mut patch = ProfilePatch::default();

    if metadata.is_paid == Some(true) && !profile.is_paid {
        patch.is_paid = Some(true);
    }
    if let Some(customer_id) = metadata.stripe_customer_id.as_deref() {
        if !customer_id.is_empty() && profile.stripe_customer_id.as_deref() != Some(customer_id) {
            patch.stripe_customer_id = Some(customer_id.to_string());
        }
    }

    (!patch.is_empty()).then_some(patch)
}

#[derive(Clone)]
pub struct MetadataSync {
    store: Arc<dyn ProfileStore>,
}

impl MetadataSync {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store }
    }

    /// Best effort. Failures are logged and never returned.
    pub async fn sync(&self, session: &Session) {
        let metadata = &session.metadata;
        if metadata.is_paid != Some(true) && metadata.stripe_customer_id.is_none() {
            return;
        }

        let user_id = session.user_id();
        let profile = match self.store.get_profile(user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!(error = %e, %user_id, "Metadata sync could not read profile");
                return;
            }
        };

        let Some(patch) = plan_patch(&profile, metadata) else {
            return;
        };

        tracing::info!(
            %user_id,
            is_paid = ?patch.is_paid,
            has_customer_id = patch.stripe_customer_id.is_some(),
            "Syncing payment flags from metadata"
        );
        if let Err(e) = self.store.update_profile(profile.id, &patch).await {
            tracing::warn!(error = %e, %user_id, "Metadata sync failed");
        }
    }
}
