// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Subscription plans, pending checkout intents and derived state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// Billing plan offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Monthly,
    Annual,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Monthly => "monthly",
            Plan::Annual => "annual",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Plan::Monthly),
            "annual" => Ok(Plan::Annual),
            other => Err(format!("unknown plan: {}", other)),
        }
    }
}

/// A checkout the user chose before authenticating.
///
/// Persisted server-side keyed by user id so it survives cross-device OAuth
/// redirects. Written once, read once, then deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPlan {
    pub plan: Plan,
    pub timestamp: DateTime<Utc>,
}

impl PendingPlan {
    pub fn new(plan: Plan) -> Self {
        Self {
            plan,
            timestamp: Utc::now(),
        }
    }

    pub fn is_expired(&self, ttl: std::time::Duration) -> bool {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        Utc::now() - self.timestamp > ttl
    }
}

/// Transient subscription classification for the current session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    #[default]
    Loading,
    Active,
    Unpaid,
}

/// Response of the `subscription-status` function.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscriptionStatus {
    #[serde(default)]
    pub subscription: Option<SubscriptionRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionRecord {
    pub status: String,
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default)]
    pub current_period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
}

impl SubscriptionStatus {
    pub fn is_active(&self) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|s| s.status == "active")
    }
}

/// Response of the `create-checkout` and `customer-portal` functions.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckoutSession {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, alias = "sessionId")]
    pub session_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_plan_parse() {
        assert_eq!("monthly".parse::<Plan>(), Ok(Plan::Monthly));
        assert_eq!("annual".parse::<Plan>(), Ok(Plan::Annual));
        assert!("weekly".parse::<Plan>().is_err());
    }

    #[test]
    fn test_status_only_active_counts() {
        let status: SubscriptionStatus =
            serde_json::from_value(serde_json::json!({ "subscription": { "status": "past_due" } }))
                .unwrap();
        assert!(!status.is_active());

        let status: SubscriptionStatus =
            serde_json::from_value(serde_json::json!({ "subscription": null })).unwrap();
        assert!(!status.is_active());

        let status: SubscriptionStatus =
            serde_json::from_value(serde_json::json!({ "subscription": { "status": "active" } }))
                .unwrap();
        assert!(status.is_active());
    }

    #[test]
    fn test_pending_plan_expiry() {
        let mut pending = PendingPlan::new(Plan::Annual);
        assert!(!pending.is_expired(Duration::from_secs(60)));
        pending.timestamp = Utc::now() - chrono::Duration::hours(2);
        assert!(pending.is_expired(Duration::from_secs(3600)));
    }
}
