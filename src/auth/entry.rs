// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! User-initiated operations on the auth context.
//!
//! Input is validated before any network call. Sign-in style operations
//! wait for the resulting reconciliation pass and hand back the navigation
//! it decided on.

use serde::Serialize;
use validator::Validate;

use crate::error::AppError;
use crate::models::{
    PasswordResetRequest, PasswordUpdate, Plan, Profile, ProfilePatch, Session, SignInRequest,
    SignUpRequest, SubscriptionState,
};
use crate::navigation::{
    Navigation, NavigationState, DEFAULT_LANDING_ROUTE, LOGIN_ROUTE, OAUTH_CALLBACK_ROUTE,
    RESET_PASSWORD_ROUTE, SIGNUP_ROUTE,
};
use crate::services::pkce::{OAuthIntent, PkcePair, FLOW_TTL};

use super::context::AuthContext;
use super::state::AuthView;

/// OAuth providers enabled on the Supabase project.
pub const OAUTH_PROVIDERS: &[&str] = &["google"];

/// Result of a sign-in, once its pass has settled.
#[derive(Debug, Clone, Serialize)]
pub struct SignInOutcome {
    pub view: AuthView,
    pub navigation: Option<Navigation>,
    /// The session signed in, for the transport to hand to the client.
    #[serde(skip)]
    pub session: Option<Session>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SignUpResult {
    pub view: AuthView,
    pub navigation: Option<Navigation>,
    /// The account exists but must confirm its email before signing in.
    pub confirmation_required: bool,
    #[serde(skip)]
    pub session: Option<Session>,
}

/// Where to send the browser to start an OAuth sign-in.
#[derive(Debug, Clone)]
pub struct OAuthStart {
    pub authorize_url: String,
    /// Goes into the flow cookie.
    pub flow_id: String,
}

impl AuthContext {
    pub async fn sign_in(&self, request: SignInRequest) -> Result<SignInOutcome, AppError> {
        request.validate()?;

        let location = request.location.as_deref().unwrap_or(LOGIN_ROUTE);
        let intent = NavigationState::at(location).with_plan(request.plan);
        let session = self
            .sessions
            .sign_in(&request.email, &request.password, intent)
            .await?;

        Ok(self.settled_outcome(&session).await)
    }

    pub async fn sign_up(&self, request: SignUpRequest) -> Result<SignUpResult, AppError> {
        request.validate()?;

        let intent = NavigationState::at(SIGNUP_ROUTE).with_plan(request.plan);
        let outcome = self
            .sessions
            .sign_up(&request.email, &request.password, intent)
            .await?;

        match outcome.session {
            Some(session) => {
                let settled = self.settled_outcome(&session).await;
                Ok(SignUpResult {
                    view: settled.view,
                    navigation: settled.navigation,
                    confirmation_required: false,
                    session: settled.session,
                })
            }
            None => {
                // Resume checkout at the first sign-in, wherever it happens.
                if let Some(plan) = request.plan {
                    if let Err(e) = self.pending.defer(outcome.user.id, plan).await {
                        tracing::error!(error = %e, user_id = %outcome.user.id, "Failed to save pending plan");
                    }
                }
                Ok(SignUpResult {
                    view: self.view(),
                    navigation: None,
                    confirmation_required: true,
                    session: None,
                })
            }
        }
    }

    /// Clear local state at once, then revoke the session with the provider.
    pub async fn sign_out(&self) -> Result<(), AppError> {
        self.apply_signed_out();
        self.sessions.sign_out().await
    }

    pub async fn request_password_reset(
        &self,
        request: PasswordResetRequest,
    ) -> Result<(), AppError> {
        request.validate()?;
        let redirect_to = format!("{}{}", self.site_url, RESET_PASSWORD_ROUTE);
        self.auth
            .send_password_reset(&request.email, &redirect_to)
            .await?;
        tracing::info!("Password reset email requested");
        Ok(())
    }

    pub async fn update_password(&self, request: PasswordUpdate) -> Result<(), AppError> {
        request.validate()?;
        let session = self.online_session()?;
        self.auth
            .update_password(&session.access_token, &request.password)
            .await?;
        tracing::info!(user_id = %session.user.id, "Password updated");
        Ok(())
    }

    /// Begin an OAuth sign-in with PKCE.
    pub fn start_oauth(
        &self,
        provider: &str,
        location: Option<&str>,
        plan: Option<Plan>,
    ) -> Result<OAuthStart, AppError> {
        if !OAUTH_PROVIDERS.contains(&provider) {
            return Err(AppError::Validation(format!(
                "Unsupported OAuth provider: {}",
                provider
            )));
        }

        let pkce = PkcePair::generate()?;
        let intent = OAuthIntent::new(location.unwrap_or(LOGIN_ROUTE), plan)?;
        let redirect_to = format!(
            "{}{}?intent={}",
            self.public_url,
            OAUTH_CALLBACK_ROUTE,
            intent.sign(&self.signing_key)?
        );
        let authorize_url = self
            .auth
            .authorize_url(provider, &redirect_to, &pkce.challenge);
        let flow_id = self.flows.start(pkce.verifier);

        tracing::info!(provider, plan = ?plan, "Starting OAuth flow");
        Ok(OAuthStart {
            authorize_url,
            flow_id,
        })
    }

    /// Finish an OAuth sign-in: exchange the code and wait for the pass.
    ///
    /// An intent that fails verification is ignored.
    pub async fn complete_oauth(
        &self,
        auth_code: &str,
        flow_id: Option<&str>,
        intent: Option<&str>,
    ) -> Result<SignInOutcome, AppError> {
        let verifier = flow_id
            .and_then(|id| self.flows.finish(id))
            .ok_or(AppError::InvalidSession)?;

        let navigation_state = match intent {
            Some(encoded) => match OAuthIntent::verify(encoded, &self.signing_key, FLOW_TTL) {
                Some(intent) => intent.into_navigation(),
                None => {
                    tracing::warn!("Invalid or tampered OAuth intent, ignoring it");
                    NavigationState::at(OAUTH_CALLBACK_ROUTE)
                }
            },
            None => NavigationState::at(OAUTH_CALLBACK_ROUTE),
        };

        let session = self
            .sessions
            .exchange_code(auth_code, &verifier, navigation_state)
            .await?;
        Ok(self.settled_outcome(&session).await)
    }

    /// Save the user's own settings.
    pub async fn update_profile(&self, patch: ProfilePatch) -> Result<Profile, AppError> {
        patch.validate()?;
        let patch = patch.user_editable();
        if patch.is_empty() {
            return Err(AppError::Validation("Nothing to update".to_string()));
        }

        let session = self.sessions.require_session()?;
        let _guard = self.pass_lock.lock().await;
        let epoch = self.current_epoch();

        let profile = if session.offline {
            let mut profile = self
                .view()
                .profile
                .ok_or_else(|| AppError::NotFound(format!("Profile {}", session.user.id)))?;
            profile.apply(&patch);
            profile
        } else {
            self.profiles.update(session.user.id, &patch).await?
        };

        self.commit(epoch, |s| {
            if s.view.user.as_ref().is_some_and(|u| u.id == profile.id) {
                s.view.profile = Some(profile.clone());
            }
        });
        tracing::info!(user_id = %session.user.id, "Profile settings saved");
        Ok(profile)
    }

    /// Re-read the profile row into the view, applying metadata flags first.
    pub async fn refresh_profile(&self) -> Result<AuthView, AppError> {
        let session = self.online_session()?;
        let _guard = self.pass_lock.lock().await;
        let epoch = self.current_epoch();

        self.metadata.sync(&session).await;
        let fetched = self.profiles.fetch_or_create(&session.user).await?;
        self.commit(epoch, |s| s.view.profile = Some(fetched.profile));
        Ok(self.view())
    }

    /// Re-evaluate the subscription into the view.
    pub async fn refresh_subscription(&self) -> Result<SubscriptionState, AppError> {
        let session = self.sessions.require_session()?;
        let _guard = self.pass_lock.lock().await;
        let epoch = self.current_epoch();

        let subscription = self.subscriptions.evaluate(&session).await;
        self.commit(epoch, |s| s.view.subscription = subscription);
        Ok(subscription)
    }

    /// Confirm a finished checkout and pick up the new payment state.
    pub async fn verify_checkout(&self, checkout_session_id: &str) -> Result<bool, AppError> {
        let session = self.online_session()?;
        let paid = self
            .billing
            .verify_checkout_session(&session.access_token, checkout_session_id)
            .await?;

        tracing::info!(user_id = %session.user.id, paid, "Checkout verified");
        if paid {
            self.refresh_profile().await?;
            self.refresh_subscription().await?;
        }
        Ok(paid)
    }

    /// Stripe customer portal URL for the current user.
    pub async fn billing_portal(&self) -> Result<String, AppError> {
        let session = self.online_session()?;
        let return_url = format!("{}{}", self.site_url, DEFAULT_LANDING_ROUTE);
        self.billing
            .customer_portal(&session.access_token, &return_url)
            .await?
            .url
            .ok_or_else(|| AppError::Payment("Portal session has no URL".to_string()))
    }

    async fn settled_outcome(&self, session: &Session) -> SignInOutcome {
        self.wait_settled(&session.access_token).await;
        SignInOutcome {
            view: self.view(),
            navigation: self.take_navigation(),
            session: Some(session.clone()),
        }
    }

    /// The current session, refusing development sessions.
    fn online_session(&self) -> Result<Session, AppError> {
        let session = self.sessions.require_session()?;
        if session.offline {
            return Err(AppError::Validation(
                "Not available for development sessions".to_string(),
            ));
        }
        Ok(session)
    }
}
