// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Supabase client for auth, table access, RPCs and edge functions.
//!
//! Handles:
//! - GoTrue auth endpoints (password, sign-up, PKCE exchange, refresh)
//! - PostgREST access to `profiles` and `admin_roles`
//! - Pending-subscription RPCs
//! - Billing edge functions in front of Stripe

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::RwLock;
use std::time::Duration;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    CheckoutSession, IdentityMetadata, PendingPlan, Plan, Profile, ProfilePatch, Session,
    SessionUser, SubscriptionStatus,
};
use crate::ports::{
    AdminRoleStore, AuthProvider, BillingApi, CheckoutUrls, PendingPlanStore, ProfileStore,
    SignUpOutcome,
};

/// Supabase project client.
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    /// Access token of the current session, used for row-level security.
    session_token: RwLock<Option<String>>,
}

impl SupabaseClient {
    /// Create a new client. `timeout` applies to every request.
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            session_token: RwLock::new(None),
        })
    }

    fn bearer(&self) -> String {
        self.session_token
            .read()
            .ok()
            .and_then(|t| t.clone())
            .unwrap_or_else(|| self.anon_key.clone())
    }

    fn rest(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}/rest/v1/{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
    }

    fn auth(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}/auth/v1/{}", self.base_url, path))
            .header("apikey", &self.anon_key)
    }

    async fn invoke_function<B: Serialize, T: for<'de> Deserialize<'de>>(
        &self,
        name: &str,
        access_token: &str,
        body: &B,
    ) -> Result<T, AppError> {
        let response = self
            .http
            .post(format!("{}/functions/v1/{}", self.base_url, name))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(e, name))?;

        check_response_json(response).await
    }

    async fn rpc<B: Serialize>(&self, name: &str, body: &B) -> Result<serde_json::Value, AppError> {
        let response = self
            .rest(reqwest::Method::POST, &format!("rpc/{}", name))
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(e, name))?;

        check_response_json(response).await
    }

    async fn token_grant<B: Serialize>(&self, grant_type: &str, body: &B) -> Result<Session, AppError> {
        let response = self
            .auth(
                reqwest::Method::POST,
                &format!("token?grant_type={}", grant_type),
            )
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(e, "auth token"))?;

        if response.status().as_u16() == 400 {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::InvalidCredentials(gotrue_message(&body)));
        }

        let token: TokenResponse = check_response_json(response).await?;
        let session = token.into_session()?;
        self.set_session_token(Some(&session.access_token));
        Ok(session)
    }
}

/// Check response status and return error if not successful.
async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();

    if status == 429 {
        tracing::warn!("Supabase rate limit hit (429)");
    }

    Err(AppError::BackendStatus {
        status,
        message: gotrue_message(&body),
    })
}

/// Check response and parse JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
) -> Result<T, AppError> {
    check_response(response)
        .await?
        .json()
        .await
        .map_err(|e| AppError::Backend(format!("JSON parse error: {}", e)))
}

/// Pull a human-readable message out of a Supabase error body.
fn gotrue_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.to_string())
}

/// GoTrue user object.
#[derive(Debug, Clone, Deserialize)]
struct AuthUser {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    app_metadata: Option<serde_json::Value>,
    #[serde(default)]
    user_metadata: Option<serde_json::Value>,
}

impl AuthUser {
    fn session_user(&self) -> SessionUser {
        SessionUser {
            id: self.id,
            email: self.email.clone().unwrap_or_default(),
        }
    }
}

/// GoTrue token response.
#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthUser,
}

impl TokenResponse {
    fn into_session(self) -> Result<Session, AppError> {
        let expires_at = match (self.expires_at, self.expires_in) {
            (Some(ts), _) => DateTime::<Utc>::from_timestamp(ts, 0),
            (None, Some(secs)) => Some(Utc::now() + chrono::Duration::seconds(secs)),
            (None, None) => None,
        }
        .ok_or_else(|| AppError::Backend("Token response without expiry".to_string()))?;

        let metadata = IdentityMetadata::from_sources(
            self.user.app_metadata.as_ref(),
            self.user.user_metadata.as_ref(),
        );

        Ok(Session {
            user: self.user.session_user(),
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            metadata,
            offline: false,
        })
    }
}

#[derive(Serialize)]
struct PasswordGrant<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct PkceGrant<'a> {
    auth_code: &'a str,
    code_verifier: &'a str,
}

#[derive(Serialize)]
struct RefreshGrant<'a> {
    refresh_token: &'a str,
}

#[derive(Serialize)]
struct UserIdArg {
    p_user_id: Uuid,
}

#[derive(Deserialize)]
struct VerifyResponse {
    #[serde(default, alias = "success")]
    paid: bool,
}

#[async_trait]
impl AuthProvider for SupabaseClient {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AppError> {
        self.token_grant("password", &PasswordGrant { email, password })
            .await
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AppError> {
        let response = self
            .auth(reqwest::Method::POST, "signup")
            .json(&PasswordGrant { email, password })
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(e, "sign up"))?;

        let body: serde_json::Value = check_response_json(response).await?;

        // With email confirmation enabled the response is the bare user.
        if body.get("access_token").is_some() {
            let token: TokenResponse = serde_json::from_value(body)
                .map_err(|e| AppError::Backend(format!("JSON parse error: {}", e)))?;
            let session = token.into_session()?;
            self.set_session_token(Some(&session.access_token));
            return Ok(SignUpOutcome {
                user: session.user.clone(),
                session: Some(session),
            });
        }

        let user: AuthUser = serde_json::from_value(body)
            .map_err(|e| AppError::Backend(format!("JSON parse error: {}", e)))?;
        Ok(SignUpOutcome {
            user: user.session_user(),
            session: None,
        })
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AppError> {
        self.set_session_token(None);
        let response = self
            .auth(reqwest::Method::POST, "logout")
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(e, "sign out"))?;
        check_response(response).await?;
        Ok(())
    }

    async fn exchange_code(&self, auth_code: &str, code_verifier: &str) -> Result<Session, AppError> {
        self.token_grant(
            "pkce",
            &PkceGrant {
                auth_code,
                code_verifier,
            },
        )
        .await
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AppError> {
        self.token_grant("refresh_token", &RefreshGrant { refresh_token })
            .await
    }

    async fn send_password_reset(&self, email: &str, redirect_to: &str) -> Result<(), AppError> {
        let response = self
            .auth(
                reqwest::Method::POST,
                &format!("recover?redirect_to={}", urlencoding::encode(redirect_to)),
            )
            .json(&serde_json::json!({ "email": email }))
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(e, "password reset"))?;
        check_response(response).await?;
        Ok(())
    }

    async fn update_password(&self, access_token: &str, password: &str) -> Result<(), AppError> {
        let response = self
            .auth(reqwest::Method::PUT, "user")
            .bearer_auth(access_token)
            .json(&serde_json::json!({ "password": password }))
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(e, "password update"))?;
        check_response(response).await?;
        Ok(())
    }

    fn authorize_url(&self, provider: &str, redirect_to: &str, code_challenge: &str) -> String {
        format!(
            "{}/auth/v1/authorize?provider={}&redirect_to={}&code_challenge={}&code_challenge_method=s256",
            self.base_url,
            urlencoding::encode(provider),
            urlencoding::encode(redirect_to),
            code_challenge
        )
    }

    fn set_session_token(&self, token: Option<&str>) {
        if let Ok(mut current) = self.session_token.write() {
            *current = token.map(str::to_string);
        }
    }
}

#[async_trait]
impl ProfileStore for SupabaseClient {
    async fn get_profile(&self, id: Uuid) -> Result<Option<Profile>, AppError> {
        let response = self
            .rest(reqwest::Method::GET, "profiles")
            .query(&[("id", format!("eq.{}", id)), ("select", "*".to_string())])
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(e, "profiles select"))?;

        let rows: Vec<Profile> = check_response_json(response).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<Profile, AppError> {
        let response = self
            .rest(reqwest::Method::POST, "profiles")
            .header("Prefer", "return=representation")
            .json(profile)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(e, "profiles insert"))?;

        let rows: Vec<Profile> = check_response_json(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::Backend("Profile insert returned no row".to_string()))
    }

    async fn update_profile(&self, id: Uuid, patch: &ProfilePatch) -> Result<Profile, AppError> {
        let response = self
            .rest(reqwest::Method::PATCH, "profiles")
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(e, "profiles update"))?;

        let rows: Vec<Profile> = check_response_json(response).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(format!("Profile {}", id)))
    }
}

#[async_trait]
impl AdminRoleStore for SupabaseClient {
    async fn has_admin_role(&self, user_id: Uuid) -> Result<bool, AppError> {
        let response = self
            .rest(reqwest::Method::GET, "admin_roles")
            .query(&[
                ("user_id", format!("eq.{}", user_id)),
                ("select", "user_id".to_string()),
                ("limit", "1".to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::from_reqwest(e, "admin_roles select"))?;

        let rows: Vec<serde_json::Value> = check_response_json(response).await?;
        Ok(!rows.is_empty())
    }
}

#[async_trait]
impl BillingApi for SupabaseClient {
    async fn subscription_status(&self, access_token: &str) -> Result<SubscriptionStatus, AppError> {
        self.invoke_function("subscription-status", access_token, &serde_json::json!({}))
            .await
    }

    async fn create_checkout(
        &self,
        access_token: &str,
        plan: Plan,
        urls: &CheckoutUrls,
    ) -> Result<CheckoutSession, AppError> {
        let body = serde_json::json!({
            "plan": plan,
            "successUrl": urls.success_url,
            "cancelUrl": urls.cancel_url,
        });
        self.invoke_function("create-checkout", access_token, &body)
            .await
            .map_err(|e| AppError::Payment(e.to_string()))
    }

    async fn customer_portal(
        &self,
        access_token: &str,
        return_url: &str,
    ) -> Result<CheckoutSession, AppError> {
        let body = serde_json::json!({ "returnUrl": return_url });
        self.invoke_function("customer-portal", access_token, &body)
            .await
            .map_err(|e| AppError::Payment(e.to_string()))
    }

    async fn verify_checkout_session(
        &self,
        access_token: &str,
        session_id: &str,
    ) -> Result<bool, AppError> {
        let body = serde_json::json!({ "sessionId": session_id });
        let verified: VerifyResponse = self
            .invoke_function("verify-stripe-session", access_token, &body)
            .await
            .map_err(|e| AppError::Payment(e.to_string()))?;
        Ok(verified.paid)
    }
}

#[async_trait]
impl PendingPlanStore for SupabaseClient {
    async fn get_pending_plan(&self, user_id: Uuid) -> Result<Option<PendingPlan>, AppError> {
        let value = self
            .rpc("handle_pending_subscription", &UserIdArg { p_user_id: user_id })
            .await?;
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| AppError::Backend(format!("Malformed pending subscription: {}", e)))
    }

    async fn save_pending_plan(&self, user_id: Uuid, pending: &PendingPlan) -> Result<(), AppError> {
        let body = serde_json::json!({
            "p_user_id": user_id,
            "p_plan": pending.plan,
            "p_timestamp": pending.timestamp,
        });
        self.rpc("save_pending_subscription", &body).await?;
        Ok(())
    }

    async fn clear_pending_plan(&self, user_id: Uuid) -> Result<(), AppError> {
        self.rpc("clear_pending_subscription", &UserIdArg { p_user_id: user_id })
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_into_session() {
        let id = Uuid::new_v4();
        let token: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "at",
            "token_type": "bearer",
            "expires_in": 3600,
            "expires_at": 1900000000,
            "refresh_token": "rt",
            "user": {
                "id": id,
                "email": "athlete@example.com",
                "app_metadata": { "provider": "email" },
                "user_metadata": { "is_paid": true, "stripe_customer_id": "cus_9" }
            }
        }))
        .unwrap();

        let session = token.into_session().unwrap();
        assert_eq!(session.user.id, id);
        assert_eq!(session.expires_at.timestamp(), 1900000000);
        assert_eq!(session.metadata.is_paid, Some(true));
        assert_eq!(session.metadata.stripe_customer_id.as_deref(), Some("cus_9"));
    }

    #[test]
    fn test_gotrue_message_extraction() {
        assert_eq!(
            gotrue_message(r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#),
            "Invalid login credentials"
        );
        assert_eq!(gotrue_message("plain text"), "plain text");
    }

    #[test]
    fn test_authorize_url_encodes_redirect() {
        let client =
            SupabaseClient::new("https://x.supabase.co/", "anon", Duration::from_secs(15)).unwrap();
        let url = client.authorize_url("google", "http://localhost:8080/auth/callback?a=b", "abc");
        assert!(url.starts_with("https://x.supabase.co/auth/v1/authorize?provider=google"));
        assert!(url.contains("redirect_to=http%3A%2F%2Flocalhost%3A8080%2Fauth%2Fcallback%3Fa%3Db"));
        assert!(url.ends_with("code_challenge=abc&code_challenge_method=s256"));
    }
}
