// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! OAuth sign-in plumbing: PKCE verifiers and the signed sign-in intent.
//!
//! The intent (return location and chosen plan) rides on the provider's
//! `redirect_to` URL, so it is HMAC-signed and checked on the way back.
//! Verifiers stay server-side, keyed by a flow id held in a cookie.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use ring::rand::{SecureRandom, SystemRandom};
use sha2::{Digest, Sha256};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::Plan;
use crate::navigation::NavigationState;

type HmacSha256 = Hmac<Sha256>;

/// Cookie carrying the flow id between `/auth/oauth/start` and the callback.
pub const FLOW_COOKIE: &str = "puc_oauth_flow";

/// How long a started OAuth flow may take to come back.
pub const FLOW_TTL: Duration = Duration::from_secs(10 * 60);

/// PKCE code verifier and its S256 challenge.
#[derive(Debug, Clone)]
pub struct PkcePair {
    pub verifier: String,
    pub challenge: String,
}

impl PkcePair {
    pub fn generate() -> Result<Self, AppError> {
        let mut bytes = [0u8; 32];
        SystemRandom::new()
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("System RNG unavailable")))?;
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = challenge_for(&verifier);
        Ok(Self {
            verifier,
            challenge,
        })
    }
}

/// S256 code challenge for `verifier`.
pub fn challenge_for(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

/// Where the user was and what they meant to buy when OAuth started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthIntent {
    pub location: String,
    pub plan: Option<Plan>,
    /// Milliseconds since the Unix epoch.
    pub issued_at: u128,
}

impl OAuthIntent {
    pub fn new(location: &str, plan: Option<Plan>) -> Result<Self, AppError> {
        Ok(Self {
            location: location.to_string(),
            plan,
            issued_at: now_millis()?,
        })
    }

    /// Encode as `base64("location|plan|timestamp_hex|signature_hex")`.
    pub fn sign(&self, secret: &[u8]) -> Result<String, AppError> {
        let payload = self.payload();
        let signature = hex::encode(mac_for(secret, &payload)?);
        let signed = format!("{}|{}", payload, signature);
        Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
    }

    /// Decode and verify a signed intent. `None` if tampered, malformed or
    /// older than `max_age`.
    pub fn verify(encoded: &str, secret: &[u8], max_age: Duration) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(encoded).ok()?;
        let text = String::from_utf8(bytes).ok()?;

        // The location may itself contain '|', so split from the right.
        let mut parts = text.rsplitn(4, '|');
        let signature_hex = parts.next()?;
        let timestamp_hex = parts.next()?;
        let plan = parts.next()?;
        let location = parts.next()?;

        let payload = format!("{}|{}|{}", location, plan, timestamp_hex);
        let expected = mac_for(secret, &payload).ok()?;
        let provided = hex::decode(signature_hex).ok()?;
        if !bool::from(expected.as_slice().ct_eq(provided.as_slice())) {
            tracing::error!("OAuth intent signature mismatch! Potential tampering.");
            return None;
        }

        let issued_at = u128::from_str_radix(timestamp_hex, 16).ok()?;
        let age = now_millis().ok()?.saturating_sub(issued_at);
        if age > max_age.as_millis() {
            tracing::warn!(age_ms = age as u64, "OAuth intent expired");
            return None;
        }

        let plan = match plan {
            "" => None,
            other => Some(other.parse().ok()?),
        };

        Some(Self {
            location: location.to_string(),
            plan,
            issued_at,
        })
    }

    pub fn into_navigation(self) -> NavigationState {
        NavigationState::at(&self.location).with_plan(self.plan)
    }

    fn payload(&self) -> String {
        format!(
            "{}|{}|{:x}",
            self.location,
            self.plan.map(|p| p.as_str()).unwrap_or_default(),
            self.issued_at
        )
    }
}

fn mac_for(secret: &[u8], payload: &str) -> Result<Vec<u8>, AppError> {
    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn now_millis() -> Result<u128, AppError> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("System time error: {}", e)))?
        .as_millis())
}

struct PendingFlow {
    verifier: String,
    started: Instant,
}

/// Code verifiers of OAuth flows that have not come back yet.
#[derive(Default)]
pub struct PkceFlows {
    flows: DashMap<String, PendingFlow>,
}

impl PkceFlows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a verifier and return the flow id to hand to the browser.
    pub fn start(&self, verifier: String) -> String {
        self.flows.retain(|_, flow| flow.started.elapsed() < FLOW_TTL);
        let flow_id = Uuid::new_v4().simple().to_string();
        self.flows.insert(
            flow_id.clone(),
            PendingFlow {
                verifier,
                started: Instant::now(),
            },
        );
        flow_id
    }

    /// Remove and return the verifier for `flow_id`, if it has not expired.
    pub fn finish(&self, flow_id: &str) -> Option<String> {
        let (_, flow) = self.flows.remove(flow_id)?;
        (flow.started.elapsed() < FLOW_TTL).then_some(flow.verifier)
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}
