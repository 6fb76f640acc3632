// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Data models for sessions, profiles and subscriptions.

pub mod credentials;
pub mod profile;
pub mod session;
pub mod subscription;

pub use credentials::{PasswordResetRequest, PasswordUpdate, SignInRequest, SignUpRequest};
pub use profile::{
    NotificationPreferences, PrivacySettings, Profile, ProfilePatch, Role, ThemePreferences,
};
pub use session::{IdentityMetadata, Session, SessionUser};
pub use subscription::{CheckoutSession, PendingPlan, Plan, SubscriptionState, SubscriptionStatus};
