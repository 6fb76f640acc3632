// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Admin-role resolution against the `admin_roles` allow-list.

use std::sync::Arc;
use uuid::Uuid;

use crate::config::AdminFailurePolicy;
use crate::error::AppError;
use crate::ports::AdminRoleStore;

#[derive(Clone)]
pub struct AdminRoleResolver {
    store: Arc<dyn AdminRoleStore>,
    policy: AdminFailurePolicy,
}

impl AdminRoleResolver {
    pub fn new(store: Arc<dyn AdminRoleStore>, policy: AdminFailurePolicy) -> Self {
        Self { store, policy }
    }

    /// Raw membership check. No retries.
    pub async fn is_admin(&self, user_id: Uuid) -> Result<bool, AppError> {
        self.store.has_admin_role(user_id).await
    }

    /// Membership with the failure policy applied.
    ///
    /// `previous` is the flag from the last pass for the same user, if any.
    pub async fn resolve(&self, user_id: Uuid, previous: Option<bool>) -> bool {
        match self.is_admin(user_id).await {
            Ok(is_admin) => is_admin,
            Err(e) => {
                let fallback = match self.policy {
                    AdminFailurePolicy::Deny => false,
                    AdminFailurePolicy::KeepPrevious => previous.unwrap_or(false),
                };
                tracing::warn!(error = %e, %user_id, fallback, "Admin lookup failed");
                fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::memory::MemoryBackend;

    #[tokio::test]
    async fn test_lookup_failure_denies_by_default() {
        let backend = Arc::new(MemoryBackend::new());
        let user_id = Uuid::new_v4();
        backend.grant_admin(user_id);
        backend.fail_admin_lookups(true);

        let resolver = AdminRoleResolver::new(backend.clone(), AdminFailurePolicy::Deny);
        assert!(!resolver.resolve(user_id, Some(true)).await);
    }

    #[tokio::test]
    async fn test_keep_previous_policy() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_admin_lookups(true);
        let resolver = AdminRoleResolver::new(backend.clone(), AdminFailurePolicy::KeepPrevious);

        assert!(resolver.resolve(Uuid::new_v4(), Some(true)).await);
        assert!(!resolver.resolve(Uuid::new_v4(), None).await);
    }
}
