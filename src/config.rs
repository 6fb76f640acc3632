//! Application configuration loaded from environment variables.
//!
//! Everything the client needs to reach Supabase, Stripe and the local
//! companion server is read once at startup. Reconciliation timings and
//! failure policies live in [`ReconcileConfig`] so they are explicit rather
//! than scattered through the code paths that use them.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// What the orchestrator does when the admin-role lookup fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminFailurePolicy {
    /// Treat the user as non-admin (fail closed).
    Deny,
    /// Keep the admin flag from the previous pass for the same user.
    KeepPrevious,
}

/// What the subscription evaluator reports when billing lookup fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingFailurePolicy {
    /// Degrade to "unpaid" so billing outages never block the app.
    TreatAsUnpaid,
    /// Grace mode: assume the subscription is active while billing is down.
    TreatAsActive,
}

/// Timings and policies for a reconciliation pass.
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Retries after the first failed profile read.
    pub profile_retries: u32,
    /// Fixed delay between profile read attempts.
    pub profile_retry_delay: Duration,
    /// Soft deadline for the whole fetch-or-create operation.
    pub profile_timeout: Duration,
    /// Forces `is_loading = false` if a pass hangs.
    pub safety_timeout: Duration,
    /// Per-request cutoff on the HTTP client.
    pub http_timeout: Duration,
    /// Pending plans older than this are discarded.
    pub pending_plan_ttl: Duration,
    pub admin_failure: AdminFailurePolicy,
    pub billing_failure: BillingFailurePolicy,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            profile_retries: 3,
            profile_retry_delay: Duration::from_millis(1000),
            profile_timeout: Duration::from_secs(10),
            safety_timeout: Duration::from_secs(10),
            http_timeout: Duration::from_secs(15),
            pending_plan_ttl: Duration::from_secs(24 * 60 * 60),
            admin_failure: AdminFailurePolicy::Deny,
            billing_failure: BillingFailurePolicy::TreatAsUnpaid,
        }
    }
}

/// Which backend implementation the server talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Supabase,
    /// In-process backend, for offline development.
    Memory,
}

/// Local development credential that bypasses every remote call.
#[derive(Debug, Clone)]
pub struct DevCredential {
    pub email: String,
    pub password: String,
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Supabase project URL, e.g. `https://abc.supabase.co`
    pub supabase_url: String,
    /// Supabase anon (public) key
    pub supabase_anon_key: String,
    /// Public URL of the web app, used for checkout and OAuth redirects
    pub site_url: String,
    /// Interface the companion server listens on
    pub bind_host: String,
    /// Companion server port
    pub port: u16,
    /// Public URL of the companion server, used as the OAuth callback base
    pub public_url: String,
    /// Directory holding the persisted session file
    pub storage_dir: PathBuf,
    /// HMAC key for OAuth intents and development sessions
    pub state_signing_key: Vec<u8>,
    pub stripe_publishable_key: Option<String>,
    pub meta_pixel_id: Option<String>,
    /// Present only when development mode is enabled
    pub dev_credential: Option<DevCredential>,
    pub backend: BackendKind,
    pub reconcile: ReconcileConfig,
}

/// File name (storage key) of the persisted session.
pub const SESSION_STORAGE_KEY: &str = "pullup-club-auth";

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let dev_mode = env::var("PUC_DEV_MODE")
            .map(|v| matches!(v.trim(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let dev_credential = if dev_mode {
            let email =
                env::var("PUC_DEV_EMAIL").map_err(|_| ConfigError::Missing("PUC_DEV_EMAIL"))?;
            let password = env::var("PUC_DEV_PASSWORD")
                .map_err(|_| ConfigError::Missing("PUC_DEV_PASSWORD"))?;
            tracing::warn!(email = %email, "Development credential enabled");
            Some(DevCredential { email, password })
        } else {
            None
        };

        let state_signing_key = match env::var("PUC_STATE_SIGNING_KEY") {
            Ok(key) => key.trim().as_bytes().to_vec(),
            Err(_) if dev_mode => b"dev_state_signing_key_32_bytes!!".to_vec(),
            Err(_) => return Err(ConfigError::Missing("PUC_STATE_SIGNING_KEY")),
        };
        if state_signing_key.len() < 32 {
            return Err(ConfigError::Invalid(
                "PUC_STATE_SIGNING_KEY",
                "must be at least 32 bytes".to_string(),
            ));
        }

        let backend = match env::var("PUC_BACKEND").as_deref().map(str::trim) {
            Err(_) | Ok("supabase") => BackendKind::Supabase,
            Ok("memory") => BackendKind::Memory,
            Ok(other) => return Err(ConfigError::Invalid("PUC_BACKEND", other.to_string())),
        };
        let supabase_var = |name: &'static str| match env::var(name) {
            Ok(v) => Ok(v.trim().trim_end_matches('/').to_string()),
            Err(_) if backend == BackendKind::Memory => Ok(String::new()),
            Err(_) => Err(ConfigError::Missing(name)),
        };

        let mut reconcile = ReconcileConfig::default();
        if let Ok(ttl) = env::var("PUC_PENDING_PLAN_TTL_SECS") {
            let secs: u64 = ttl.trim().parse().map_err(|_| {
                ConfigError::Invalid("PUC_PENDING_PLAN_TTL_SECS", ttl.clone())
            })?;
            reconcile.pending_plan_ttl = Duration::from_secs(secs);
        }

        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        Ok(Self {
            supabase_url: supabase_var("SUPABASE_URL")?,
            supabase_anon_key: supabase_var("SUPABASE_ANON_KEY")?,
            site_url: env::var("SITE_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            bind_host: env::var("PUC_BIND_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port,
            public_url: env::var("PUBLIC_URL")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| format!("http://localhost:{}", port)),
            storage_dir: env::var("PUC_STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            state_signing_key,
            stripe_publishable_key: env::var("STRIPE_PUBLISHABLE_KEY").ok(),
            meta_pixel_id: env::var("META_PIXEL_ID").ok(),
            dev_credential,
            backend,
            reconcile,
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test_anon_key".to_string(),
            site_url: "http://localhost:5173".to_string(),
            bind_host: "127.0.0.1".to_string(),
            port: 8080,
            public_url: "http://localhost:8080".to_string(),
            storage_dir: env::temp_dir().join(format!("pullup-club-test-{}", uuid::Uuid::new_v4())),
            state_signing_key: b"test_state_key_32_bytes_minimum!".to_vec(),
            stripe_publishable_key: None,
            meta_pixel_id: None,
            dev_credential: None,
            backend: BackendKind::Memory,
            reconcile: ReconcileConfig::default(),
        }
    }

    /// Path of the persisted session file.
    pub fn session_file(&self) -> PathBuf {
        self.storage_dir
            .join(format!("{}.json", SESSION_STORAGE_KEY))
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
