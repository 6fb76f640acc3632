// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! Session store: the only component that decides whether we are signed in.
//!
//! Wraps the [`AuthProvider`], persists the session under the
//! `pullup-club-auth` storage key, and broadcasts sign-in/sign-out
//! transitions to subscribers.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::DevCredential;
use crate::error::AppError;
use crate::models::{IdentityMetadata, Session, SessionUser};
use crate::navigation::NavigationState;
use crate::ports::{AuthProvider, SignUpOutcome};

/// Restored sessions this close to expiry are refreshed first.
const RESTORE_REFRESH_MARGIN_SECS: i64 = 60;

/// Lifetime of a development session.
const DEV_SESSION_HOURS: i64 = 12;

/// Auth-change notification.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// A live sign-in, carrying the navigation state it started from.
    SignedIn {
        session: Session,
        intent: NavigationState,
    },
    SignedOut,
}

/// Claims of a locally issued development token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DevClaims {
    /// Subject (user id)
    pub sub: String,
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Create a development session token.
pub fn create_dev_token(user: &SessionUser, signing_key: &[u8]) -> anyhow::Result<String> {
    let now = Utc::now().timestamp() as usize;

    let claims = DevClaims {
        sub: user.id.to_string(),
        email: user.email.clone(),
        iat: now,
        exp: now + (DEV_SESSION_HOURS * 60 * 60) as usize,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}

/// Verify a development session token.
pub fn verify_dev_token(token: &str, signing_key: &[u8]) -> Result<DevClaims, AppError> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);
    decode::<DevClaims>(token, &key, &validation)
        .map(|data| data.claims)
        .map_err(|_| AppError::InvalidSession)
}

/// Stable user id for a development email.
fn dev_user_id(email: &str) -> Uuid {
    let digest = Sha256::digest(email.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    uuid::Builder::from_random_bytes(bytes).into_uuid()
}

struct DevLogin {
    credential: DevCredential,
    signing_key: Vec<u8>,
}

/// Holds the current session and broadcasts auth transitions.
pub struct SessionStore {
    provider: Arc<dyn AuthProvider>,
    current: RwLock<Option<Session>>,
    events: broadcast::Sender<AuthEvent>,
    storage_path: Option<PathBuf>,
    dev: Option<DevLogin>,
}

impl SessionStore {
    pub fn new(provider: Arc<dyn AuthProvider>, storage_path: Option<PathBuf>) -> Self {
        let (events, _) = broadcast::channel(32);
        Self {
            provider,
            current: RwLock::new(None),
            events,
            storage_path,
            dev: None,
        }
    }

    /// Accept the development credential, signing its sessions with `signing_key`.
    pub fn with_dev_credential(mut self, credential: DevCredential, signing_key: &[u8]) -> Self {
        self.dev = Some(DevLogin {
            credential,
            signing_key: signing_key.to_vec(),
        });
        self
    }

    /// Subscribe to auth-change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    pub fn current_user(&self) -> Option<SessionUser> {
        self.current_session().map(|s| s.user)
    }

    pub fn current_session(&self) -> Option<Session> {
        self.current.read().ok().and_then(|s| s.clone())
    }

    /// The session or [`AppError::Unauthorized`].
    pub fn require_session(&self) -> Result<Session, AppError> {
        self.current_session().ok_or(AppError::Unauthorized)
    }

    pub async fn sign_in(
        &self,
        email: &str,
        password: &str,
        intent: NavigationState,
    ) -> Result<Session, AppError> {
        let session = match self.dev_session(email, password)? {
            Some(session) => session,
            None => self.provider.sign_in_with_password(email, password).await?,
        };
        tracing::info!(user_id = %session.user.id, offline = session.offline, "Signed in");
        self.establish(session.clone(), intent).await;
        Ok(session)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        intent: NavigationState,
    ) -> Result<SignUpOutcome, AppError> {
        let outcome = self.provider.sign_up(email, password).await?;
        match &outcome.session {
            Some(session) => {
                tracing::info!(user_id = %session.user.id, "Signed up and signed in");
                self.establish(session.clone(), intent).await;
            }
            None => {
                tracing::info!(user_id = %outcome.user.id, "Signed up, awaiting email confirmation");
            }
        }
        Ok(outcome)
    }

    /// Complete an OAuth sign-in with the PKCE code returned to the callback.
    pub async fn exchange_code(
        &self,
        auth_code: &str,
        code_verifier: &str,
        intent: NavigationState,
    ) -> Result<Session, AppError> {
        let session = self.provider.exchange_code(auth_code, code_verifier).await?;
        tracing::info!(user_id = %session.user.id, "OAuth sign-in completed");
        self.establish(session.clone(), intent).await;
        Ok(session)
    }

    /// Clear the session locally, notify, then revoke it with the provider.
    pub async fn sign_out(&self) -> Result<(), AppError> {
        let previous = self.current.write().ok().and_then(|mut s| s.take());
        self.provider.set_session_token(None);
        self.remove_persisted().await;
        let _ = self.events.send(AuthEvent::SignedOut);

        match previous {
            Some(session) if !session.offline => {
                self.provider.sign_out(&session.access_token).await
            }
            _ => Ok(()),
        }
    }

    /// Load the persisted session, if any, without emitting an event.
    ///
    /// Sessions close to expiry are refreshed; a session that cannot be
    /// refreshed is discarded.
    pub async fn restore(&self) -> Result<Option<Session>, AppError> {
        let Some(path) = &self.storage_path else {
            return Ok(None);
        };

        let raw = match tokio::fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::Internal(anyhow::anyhow!(
                    "Failed to read session file: {}",
                    e
                )))
            }
        };

        let session: Session = match serde_json::from_slice(&raw) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable session file");
                self.remove_persisted().await;
                return Ok(None);
            }
        };

        let session = if session.offline {
            match &self.dev {
                Some(dev) if verify_dev_token(&session.access_token, &dev.signing_key).is_ok() => {
                    session
                }
                _ => {
                    tracing::info!("Discarding development session");
                    self.remove_persisted().await;
                    return Ok(None);
                }
            }
        } else if session.expires_within(Duration::seconds(RESTORE_REFRESH_MARGIN_SECS)) {
            match self.refresh_persisted(&session).await {
                Ok(refreshed) => refreshed,
                Err(e) => {
                    tracing::warn!(error = %e, user_id = %session.user.id, "Stored session expired and could not be refreshed");
                    self.remove_persisted().await;
                    return Ok(None);
                }
            }
        } else {
            session
        };

        self.set_current(Some(session.clone()));
        self.persist(&session).await;
        tracing::info!(user_id = %session.user.id, expires_at = %session.expires_at, "Restored session");
        Ok(Some(session))
    }

    async fn refresh_persisted(&self, session: &Session) -> Result<Session, AppError> {
        let refresh_token = session
            .refresh_token
            .as_deref()
            .ok_or(AppError::InvalidSession)?;
        self.provider.refresh_session(refresh_token).await
    }

    async fn establish(&self, session: Session, intent: NavigationState) {
        self.set_current(Some(session.clone()));
        self.persist(&session).await;
        let _ = self.events.send(AuthEvent::SignedIn { session, intent });
    }

    fn set_current(&self, session: Option<Session>) {
        let token = session
            .as_ref()
            .filter(|s| !s.offline)
            .map(|s| s.access_token.clone());
        self.provider.set_session_token(token.as_deref());
        if let Ok(mut current) = self.current.write() {
            *current = session;
        }
    }

    fn dev_session(&self, email: &str, password: &str) -> Result<Option<Session>, AppError> {
        let Some(dev) = &self.dev else {
            return Ok(None);
        };
        if dev.credential.email != email || dev.credential.password != password {
            return Ok(None);
        }

        tracing::warn!(email, "Signing in with development credential");
        let user = SessionUser {
            id: dev_user_id(email),
            email: email.to_string(),
        };
        let access_token = create_dev_token(&user, &dev.signing_key)?;
        let expires_at: DateTime<Utc> = Utc::now() + Duration::hours(DEV_SESSION_HOURS);

        Ok(Some(Session {
            user,
            access_token,
            refresh_token: None,
            expires_at,
            metadata: IdentityMetadata {
                is_paid: Some(true),
                stripe_customer_id: None,
            },
            offline: true,
        }))
    }

    async fn persist(&self, session: &Session) {
        let Some(path) = &self.storage_path else {
            return;
        };
        if let Err(e) = write_session_file(path, session).await {
            tracing::warn!(error = %e, path = %path.display(), "Failed to persist session");
        }
    }

    async fn remove_persisted(&self) {
        if let Some(path) = &self.storage_path {
            if let Err(e) = tokio::fs::remove_file(path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(error = %e, "Failed to remove session file");
                }
            }
        }
    }
}

async fn write_session_file(path: &Path, session: &Session) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(path, serde_json::to_vec(session)?).await?;
    Ok(())
}
