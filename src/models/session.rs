// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Authenticated session and identity-provider metadata.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

/// Identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct SessionUser {
    pub id: Uuid,
    pub email: String,
}

/// Payment flags the billing webhook writes into the identity provider's
/// user metadata. Independent of the profile row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMetadata {
    #[serde(default)]
    pub is_paid: Option<bool>,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
}

impl IdentityMetadata {
    /// Merge `app_metadata` and `user_metadata` objects. A paid flag or
    /// customer id in either source counts.
    pub fn from_sources(app: Option<&serde_json::Value>, user: Option<&serde_json::Value>) -> Self {
        let mut merged = Self::default();
        for source in [app, user].into_iter().flatten() {
            if let Some(paid) = source.get("is_paid").and_then(|v| v.as_bool()) {
                merged.is_paid = Some(merged.is_paid.unwrap_or(false) || paid);
            }
            if merged.stripe_customer_id.is_none() {
                merged.stripe_customer_id = source
                    .get("stripe_customer_id")
                    .and_then(|v| v.as_str())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
            }
        }
        merged
    }
}

/// Authenticated session. Exactly one per client context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: SessionUser,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: IdentityMetadata,
    /// Issued locally by the development credential; never sent to the backend.
    #[serde(default)]
    pub offline: bool,
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    /// True when the access token expires within `margin`.
    pub fn expires_within(&self, margin: Duration) -> bool {
        Utc::now() + margin >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_merges_sources() {
        let app = json!({ "provider": "email", "is_paid": true });
        let user = json!({ "stripe_customer_id": "cus_123", "is_paid": false });
        let meta = IdentityMetadata::from_sources(Some(&app), Some(&user));
        assert_eq!(meta.is_paid, Some(true));
        assert_eq!(meta.stripe_customer_id.as_deref(), Some("cus_123"));
    }

    #[test]
    fn test_metadata_ignores_empty_customer_id() {
        let user = json!({ "stripe_customer_id": "" });
        let meta = IdentityMetadata::from_sources(None, Some(&user));
        assert_eq!(meta, IdentityMetadata::default());
    }
}
