// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Profile repository: fetch-or-create with a fixed retry policy.
//!
//! A point read by primary key is retried on transient failure, a missing row
//! is created from the session, and rows left with a null `user_id` by older
//! versions of the app are backfilled. The whole operation is bounded by a
//! soft deadline and fails with [`AppError::Timeout`] when it is exceeded.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::config::ReconcileConfig;
use crate::error::AppError;
use crate::models::{Profile, ProfilePatch, SessionUser};
use crate::ports::ProfileStore;

/// Result of [`ProfileRepository::fetch_or_create`].
#[derive(Debug, Clone)]
pub struct FetchedProfile {
    pub profile: Profile,
    /// The row did not exist and was inserted by this call.
    pub created: bool,
}

#[derive(Clone)]
pub struct ProfileRepository {
    store: Arc<dyn ProfileStore>,
    retries: u32,
    retry_delay: Duration,
    timeout: Duration,
}

impl ProfileRepository {
    pub fn new(store: Arc<dyn ProfileStore>, config: &ReconcileConfig) -> Self {
        Self {
            store,
            retries: config.profile_retries,
            retry_delay: config.profile_retry_delay,
            timeout: config.profile_timeout,
        }
    }

    /// Load the user's profile, creating it on first access.
    pub async fn fetch_or_create(&self, user: &SessionUser) -> Result<FetchedProfile, AppError> {
        match tokio::time::timeout(self.timeout, self.fetch_or_create_inner(user)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    user_id = %user.id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Profile fetch timed out"
                );
                Err(AppError::Timeout(self.timeout.as_millis() as u64))
            }
        }
    }

    /// Apply a user-initiated settings patch.
    pub async fn update(&self, id: Uuid, patch: &ProfilePatch) -> Result<Profile, AppError> {
        self.store.update_profile(id, patch).await
    }

    async fn fetch_or_create_inner(&self, user: &SessionUser) -> Result<FetchedProfile, AppError> {
        let existing = self
            .with_retry("get_profile", || self.store.get_profile(user.id))
            .await?;

        if let Some(profile) = existing {
            return Ok(FetchedProfile {
                profile: self.backfill_user_id(user, profile).await,
                created: false,
            });
        }

        tracing::info!(user_id = %user.id, "No profile row, creating one");
        let fresh = Profile::new_for_user(user.id, &user.email);
        match self.store.insert_profile(&fresh).await {
            Ok(profile) => Ok(FetchedProfile {
                profile,
                created: true,
            }),
            // Another tab or a database trigger created the row first.
            Err(AppError::BackendStatus { status: 409, .. }) => {
                tracing::info!(user_id = %user.id, "Profile created concurrently, re-reading");
                let profile = self
                    .store
                    .get_profile(user.id)
                    .await?
                    .ok_or_else(|| AppError::NotFound(format!("Profile {}", user.id)))?;
                Ok(FetchedProfile {
                    profile: self.backfill_user_id(user, profile).await,
                    created: false,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn backfill_user_id(&self, user: &SessionUser, mut profile: Profile) -> Profile {
        if profile.user_id == Some(user.id) {
            return profile;
        }

        tracing::info!(
            user_id = %user.id,
            stored_user_id = ?profile.user_id,
            "Backfilling profile user_id"
        );
        let patch = ProfilePatch {
            user_id: Some(user.id),
            ..Default::default()
        };
        match self.store.update_profile(profile.id, &patch).await {
            Ok(updated) => updated,
            Err(e) => {
                tracing::warn!(error = %e, user_id = %user.id, "Failed to backfill profile user_id");
                profile.user_id = Some(user.id);
                profile
            }
        }
    }

    /// Run `op`, retrying transient failures with a fixed delay.
    async fn with_retry<T, F, Fut>(&self, op: &'static str, mut f: F) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(
                        op,
                        attempt,
                        max_retries = self.retries,
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    tracing::error!(op, attempts = attempt + 1, error = %e, "Giving up");
                    return Err(e);
                }
            }
        }
    }
}
