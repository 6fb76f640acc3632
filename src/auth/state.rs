// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Consolidated auth state published by the [`AuthContext`](super::AuthContext).

use serde::Serialize;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::ErrorReport;
use crate::models::{Profile, SessionUser, SubscriptionState};
use crate::navigation::Navigation;

/// Lifecycle of the context itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Uninitialized,
    Initializing,
    Ready,
}

/// What the rest of the application sees.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthView {
    pub phase: Phase,
    pub user: Option<SessionUser>,
    pub profile: Option<Profile>,
    pub is_admin: bool,
    /// The profile row was created during the current session's first pass.
    pub is_first_login: bool,
    pub subscription: SubscriptionState,
    pub is_loading: bool,
    pub last_error: Option<ErrorReport>,
}

impl Default for AuthView {
    fn default() -> Self {
        Self {
            phase: Phase::Uninitialized,
            user: None,
            profile: None,
            is_admin: false,
            is_first_login: false,
            subscription: SubscriptionState::Loading,
            is_loading: true,
            last_error: None,
        }
    }
}

impl AuthView {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Drop everything tied to the signed-in user.
    pub(crate) fn clear_identity(&mut self) {
        self.user = None;
        self.profile = None;
        self.is_admin = false;
        self.is_first_login = false;
        self.subscription = SubscriptionState::Unpaid;
        self.last_error = None;
    }
}

/// Everything published on the watch channel.
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub view: AuthView,
    /// Set by the pending-action step, consumed once.
    pub navigation: Option<Navigation>,
    /// Passes finished so far, including skipped and abandoned ones.
    pub completed_passes: u64,
    /// Id of the pass currently running. `Some(0)` while restoring at init.
    pub active_pass: Option<u64>,
    /// Access token of the last pass that ran to completion.
    pub last_reconciled_token: Option<String>,
    /// Access token of the last pass to finish in any way.
    pub last_settled_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_starts_loading() {
        let view = AuthView::default();
        assert_eq!(view.phase, Phase::Uninitialized);
        assert!(view.is_loading);
        assert_eq!(view.subscription, SubscriptionState::Loading);
        assert!(!view.is_authenticated());
    }

    #[test]
    fn test_view_serializes_snake_case() {
        let json = serde_json::to_value(AuthView::default()).unwrap();
        assert_eq!(json["phase"], "uninitialized");
        assert_eq!(json["subscription"], "loading");
        assert_eq!(json["is_first_login"], false);
    }
}
