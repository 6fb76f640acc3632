// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Profile row stored in the `profiles` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;
use validator::Validate;

/// Profile role column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(default)]
pub struct NotificationPreferences {
    pub email_notifications: bool,
    pub submission_updates: bool,
    pub leaderboard_updates: bool,
    pub marketing_emails: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            email_notifications: true,
            submission_updates: true,
            leaderboard_updates: true,
            marketing_emails: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(default)]
pub struct ThemePreferences {
    /// "light", "dark" or "system"
    pub theme: String,
    pub language: String,
}

impl Default for ThemePreferences {
    fn default() -> Self {
        Self {
            theme: "system".to_string(),
            language: "en".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
#[serde(default)]
pub struct PrivacySettings {
    pub public_profile: bool,
    pub show_on_leaderboard: bool,
    pub show_social_media: bool,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            public_profile: true,
            show_on_leaderboard: true,
            show_social_media: true,
        }
    }
}

/// Columns without a NOT NULL constraint come back as `null`; read those as
/// the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A user's profile. One per user; outlives sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Profile {
    /// Primary key, equal to the auth user id
    pub id: Uuid,
    /// Historically nullable; backfilled from the session on read
    pub user_id: Option<Uuid>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub email: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub social_media: Option<String>,
    #[serde(default)]
    pub age: Option<u8>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub region: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_paid: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: Role,
    #[serde(default, deserialize_with = "null_as_default")]
    pub badges: Vec<String>,
    #[serde(default)]
    pub is_profile_completed: Option<bool>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub notification_preferences: NotificationPreferences,
    #[serde(default, deserialize_with = "null_as_default")]
    pub theme_preferences: ThemePreferences,
    #[serde(default, deserialize_with = "null_as_default")]
    pub privacy_settings: PrivacySettings,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// A fresh profile for a user seen for the first time.
    pub fn new_for_user(user_id: Uuid, email: &str) -> Self {
        let now = Utc::now();
        Self {
            id: user_id,
            user_id: Some(user_id),
            email: email.to_string(),
            full_name: None,
            social_media: None,
            age: None,
            gender: None,
            organization: None,
            region: String::new(),
            phone: None,
            stripe_customer_id: None,
            is_paid: false,
            role: Role::User,
            badges: Vec::new(),
            is_profile_completed: Some(false),
            notification_preferences: NotificationPreferences::default(),
            theme_preferences: ThemePreferences::default(),
            privacy_settings: PrivacySettings::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a patch in memory, as the store would.
    pub fn apply(&mut self, patch: &ProfilePatch) {
        macro_rules! set_opt {
            ($($field:ident),*) => {
                $(if let Some(v) = &patch.$field { self.$field = Some(v.clone()); })*
            };
        }
        set_opt!(
            user_id,
            full_name,
            social_media,
            age,
            gender,
            organization,
            phone,
            stripe_customer_id,
            is_profile_completed
        );
        if let Some(region) = &patch.region {
            self.region = region.clone();
        }
        if let Some(is_paid) = patch.is_paid {
            self.is_paid = is_paid;
        }
        if let Some(prefs) = &patch.notification_preferences {
            self.notification_preferences = prefs.clone();
        }
        if let Some(prefs) = &patch.theme_preferences {
            self.theme_preferences = prefs.clone();
        }
        if let Some(settings) = &patch.privacy_settings {
            self.privacy_settings = settings.clone();
        }
        self.updated_at = Utc::now();
    }
}

/// Partial update of a profile row. Unset fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, max = 100, message = "must be 1-100 characters"))]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub social_media: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 13, max = 120, message = "must be between 13 and 120"))]
    pub age: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 100, message = "must be at most 100 characters"))]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(min = 1, message = "must not be empty"))]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 32, message = "must be at most 32 characters"))]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stripe_customer_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_paid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_profile_completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_preferences: Option<NotificationPreferences>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub theme_preferences: Option<ThemePreferences>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub privacy_settings: Option<PrivacySettings>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Strip fields a user may not set on their own profile.
    pub fn user_editable(mut self) -> Self {
        self.user_id = None;
        self.stripe_customer_id = None;
        self.is_paid = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_profile_has_defaults() {
        let id = Uuid::new_v4();
        let profile = Profile::new_for_user(id, "athlete@example.com");
        assert_eq!(profile.id, id);
        assert_eq!(profile.user_id, Some(id));
        assert!(!profile.is_paid);
        assert_eq!(profile.role, Role::User);
        assert!(profile.notification_preferences.email_notifications);
        assert_eq!(profile.theme_preferences.theme, "system");
        assert!(profile.privacy_settings.show_on_leaderboard);
    }

    #[test]
    fn test_row_with_null_user_id_deserializes() {
        let id = Uuid::new_v4();
        let row = serde_json::json!({
            "id": id,
            "user_id": null,
            "email": "old@example.com",
            "is_paid": true,
            "role": "admin",
            "notification_preferences": { "email_notifications": false },
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        });
        let profile: Profile = serde_json::from_value(row).unwrap();
        assert_eq!(profile.user_id, None);
        assert_eq!(profile.role, Role::Admin);
        assert!(!profile.notification_preferences.email_notifications);
        assert!(profile.notification_preferences.submission_updates);
        assert_eq!(profile.privacy_settings, PrivacySettings::default());
    }

    #[test]
    fn test_null_columns_read_as_defaults() {
        let row = serde_json::json!({
            "id": Uuid::new_v4(),
            "user_id": null,
            "email": "legacy@example.com",
            "region": null,
            "is_paid": null,
            "role": null,
            "badges": null,
            "notification_preferences": null,
            "theme_preferences": null,
            "privacy_settings": null,
            "created_at": "2023-06-01T00:00:00Z",
            "updated_at": "2023-06-01T00:00:00Z"
        });
        let profile: Profile = serde_json::from_value(row).unwrap();
        assert_eq!(profile.region, "");
        assert!(!profile.is_paid);
        assert_eq!(profile.role, Role::User);
        assert!(profile.badges.is_empty());
        assert_eq!(
            profile.notification_preferences,
            NotificationPreferences::default()
        );
        assert_eq!(profile.theme_preferences.language, "en");
        assert!(profile.privacy_settings.public_profile);
    }

    #[test]
    fn test_patch_serializes_only_set_fields() {
        let patch = ProfilePatch {
            is_paid: Some(true),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&patch).unwrap(),
            serde_json::json!({ "is_paid": true })
        );
    }

    #[test]
    fn test_user_editable_strips_payment_fields() {
        let patch = ProfilePatch {
            full_name: Some("Jo".to_string()),
            is_paid: Some(true),
            stripe_customer_id: Some("cus_1".to_string()),
            ..Default::default()
        }
        .user_editable();
        assert_eq!(patch.full_name.as_deref(), Some("Jo"));
        assert!(patch.is_paid.is_none());
        assert!(patch.stripe_customer_id.is_none());
    }
}
