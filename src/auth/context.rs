// SPDX-License-Identifier: MIT
// Copyright 2026 Pull-Up Club contributors

//! The reconciliation orchestrator.
//!
//! Sequences the session, profile, admin, subscription and pending-action
//! components on auth transitions and publishes one consolidated
//! [`AuthState`].
//!
//! One pass runs at a time. Sign-in events are queued and handled in order
//! by a single worker; a sign-in for the token that was just reconciled is
//! skipped. Sign-out is applied immediately without waiting for the running
//! pass: it bumps an epoch, and a pass started under an older epoch drops
//! its results instead of committing them.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::{Config, ReconcileConfig};
use crate::error::{AppError, ErrorReport};
use crate::models::{Profile, Role, Session, SubscriptionState};
use crate::navigation::{Navigation, NavigationState, SUBSCRIBE_ROUTE};
use crate::ports::{AuthProvider, Backends, BillingApi, CheckoutUrls};
use crate::services::{
    AdminRoleResolver, AuthEvent, MetadataSync, PendingActionProcessor, PkceFlows,
    ProfileRepository, SessionStore, SubscriptionEvaluator,
};

use super::state::{AuthState, AuthView, Phase};

/// Pass id reserved for the restore at init.
const RESTORE_PASS: u64 = 0;

/// A queued reconciliation pass.
#[derive(Debug)]
struct Job {
    session: Session,
    /// `None` for a passive restore, which never resumes checkouts.
    intent: Option<NavigationState>,
    epoch: u64,
}

/// Application-wide auth context. Create once, share by `Arc`, then call
/// [`init`](Self::init).
pub struct AuthContext {
    pub(super) settings: ReconcileConfig,
    pub(super) site_url: String,
    pub(super) public_url: String,
    pub(super) signing_key: Vec<u8>,
    pub(super) sessions: Arc<SessionStore>,
    pub(super) profiles: ProfileRepository,
    pub(super) metadata: MetadataSync,
    roles: AdminRoleResolver,
    pub(super) subscriptions: SubscriptionEvaluator,
    pub(super) pending: PendingActionProcessor,
    pub(super) auth: Arc<dyn AuthProvider>,
    pub(super) billing: Arc<dyn BillingApi>,
    pub(super) flows: PkceFlows,
    state: watch::Sender<AuthState>,
    initialized: AtomicBool,
    epoch: AtomicU64,
    next_pass: AtomicU64,
    /// Held by each pass and by user-initiated writes to the view.
    pub(super) pass_lock: Mutex<()>,
    jobs: mpsc::UnboundedSender<Job>,
    job_rx: StdMutex<Option<mpsc::UnboundedReceiver<Job>>>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
}

impl AuthContext {
    pub fn new(config: &Config, backends: Backends) -> Self {
        let settings = config.reconcile.clone();

        let mut sessions = SessionStore::new(backends.auth.clone(), Some(config.session_file()));
        if let Some(credential) = &config.dev_credential {
            sessions = sessions.with_dev_credential(credential.clone(), &config.state_signing_key);
        }

        let urls = CheckoutUrls {
            success_url: format!(
                "{}/billing/success?session_id={{CHECKOUT_SESSION_ID}}",
                config.public_url
            ),
            cancel_url: format!("{}{}", config.site_url, SUBSCRIBE_ROUTE),
        };

        let (jobs, job_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(AuthState::default());

        Self {
            profiles: ProfileRepository::new(backends.profiles.clone(), &settings),
            metadata: MetadataSync::new(backends.profiles.clone()),
            roles: AdminRoleResolver::new(backends.roles.clone(), settings.admin_failure),
            subscriptions: SubscriptionEvaluator::new(
                backends.billing.clone(),
                settings.billing_failure,
            ),
            pending: PendingActionProcessor::new(
                backends.billing.clone(),
                backends.pending.clone(),
                urls,
                settings.pending_plan_ttl,
            ),
            sessions: Arc::new(sessions),
            auth: backends.auth,
            billing: backends.billing,
            flows: PkceFlows::new(),
            site_url: config.site_url.clone(),
            public_url: config.public_url.clone(),
            signing_key: config.state_signing_key.clone(),
            settings,
            state,
            initialized: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            next_pass: AtomicU64::new(RESTORE_PASS + 1),
            pass_lock: Mutex::new(()),
            jobs,
            job_rx: StdMutex::new(Some(job_rx)),
            tasks: StdMutex::new(Vec::new()),
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────────

    /// Start listening for auth changes, then restore any persisted session.
    ///
    /// Runs once; later calls return immediately.
    pub async fn init(self: &Arc<Self>) -> Result<(), AppError> {
        if self
            .initialized
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Auth context already initialized");
            return Ok(());
        }

        self.state.send_modify(|s| {
            s.view.phase = Phase::Initializing;
            s.active_pass = Some(RESTORE_PASS);
        });

        // Listener first, so a sign-in racing the restore is not lost.
        let events = self.sessions.subscribe();
        let listener = tokio::spawn(Self::listen(Arc::downgrade(self), events));

        let job_rx = self
            .job_rx
            .lock()
            .ok()
            .and_then(|mut rx| rx.take())
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Reconcile queue already taken")))?;
        let worker = tokio::spawn(Self::work(Arc::downgrade(self), job_rx));

        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(listener);
            tasks.push(worker);
        }
        self.arm_watchdog(RESTORE_PASS);

        let restored = match self.sessions.restore().await {
            Ok(restored) => restored,
            Err(e) => {
                tracing::warn!(error = %e, "Session restore failed");
                None
            }
        };

        match restored {
            Some(session) => {
                tracing::info!(user_id = %session.user.id, "Reconciling restored session");
                let epoch = self.epoch.load(Ordering::SeqCst);
                self.state.send_modify(|s| {
                    s.view.user = Some(session.user.clone());
                });
                self.enqueue(Job {
                    session,
                    intent: None,
                    epoch,
                });
            }
            None => {
                tracing::info!("No existing session");
                self.state.send_if_modified(|s| {
                    // A live sign-in may already own the state.
                    if s.active_pass != Some(RESTORE_PASS) {
                        return false;
                    }
                    s.active_pass = None;
                    s.view.phase = Phase::Ready;
                    s.view.is_loading = false;
                    if s.view.user.is_none() {
                        s.view.subscription = SubscriptionState::Unpaid;
                    }
                    true
                });
            }
        }
        Ok(())
    }

    /// Stop the listener, the worker and any armed watchdogs.
    pub fn dispose(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for task in tasks.drain(..) {
                task.abort();
            }
        }
        tracing::debug!("Auth context disposed");
    }

    // ─── Observation ─────────────────────────────────────────────────────────

    pub fn view(&self) -> AuthView {
        self.state.borrow().view.clone()
    }

    pub fn snapshot(&self) -> AuthState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state.subscribe()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Consume the navigation decided by the last sign-in pass.
    pub fn take_navigation(&self) -> Option<Navigation> {
        let mut navigation = None;
        self.state.send_if_modified(|s| {
            navigation = s.navigation.take();
            navigation.is_some()
        });
        navigation
    }

    /// Wait until `completed_passes` reaches `count` or the safety timeout
    /// elapses. Returns whether it was reached.
    pub async fn wait_for_passes(&self, count: u64) -> bool {
        let mut rx = self.state.subscribe();
        let wait = rx.wait_for(|s| s.completed_passes >= count);
        let reached = matches!(
            tokio::time::timeout(self.settings.safety_timeout, wait).await,
            Ok(Ok(_))
        );
        reached
    }

    /// Wait for the pass handling `access_token` to finish.
    pub(super) async fn wait_settled(&self, access_token: &str) -> bool {
        let mut rx = self.state.subscribe();
        let wait = rx.wait_for(|s| s.last_settled_token.as_deref() == Some(access_token));
        let settled = matches!(
            tokio::time::timeout(self.settings.safety_timeout, wait).await,
            Ok(Ok(_))
        );
        if !settled {
            tracing::warn!("Sign-in pass did not settle before the safety timeout");
        }
        settled
    }

    // ─── Transitions ─────────────────────────────────────────────────────────

    /// Clear the signed-in state. No I/O.
    pub fn apply_signed_out(&self) {
        self.state.send_modify(|s| {
            let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::info!(epoch, user_id = ?s.view.user.as_ref().map(|u| u.id), "Signed out");
            s.view.clear_identity();
            s.view.is_loading = false;
            if s.view.phase == Phase::Initializing && s.active_pass == Some(RESTORE_PASS) {
                s.view.phase = Phase::Ready;
            }
            s.navigation = None;
            s.last_reconciled_token = None;
        });
    }

    /// Apply `update` to the state unless a sign-out happened after `epoch`.
    pub(super) fn commit(&self, epoch: u64, update: impl FnOnce(&mut AuthState)) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|s| {
            if self.epoch.load(Ordering::SeqCst) != epoch {
                return false;
            }
            update(s);
            applied = true;
            true
        });
        applied
    }

    pub(super) fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    fn enqueue(&self, job: Job) {
        if self.jobs.send(job).is_err() {
            tracing::error!("Reconcile worker is gone, dropping pass");
        }
    }

    async fn listen(context: Weak<Self>, mut events: broadcast::Receiver<AuthEvent>) {
        loop {
            let event = events.recv().await;
            let Some(this) = context.upgrade() else {
                break;
            };
            match event {
                Ok(AuthEvent::SignedIn { session, intent }) => {
                    tracing::debug!(user_id = %session.user.id, location = %intent.location, "SIGNED_IN received");
                    let epoch = this.current_epoch();
                    this.enqueue(Job {
                        session,
                        intent: Some(intent),
                        epoch,
                    });
                }
                Ok(AuthEvent::SignedOut) => this.apply_signed_out(),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Auth listener lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn work(context: Weak<Self>, mut jobs: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = jobs.recv().await {
            let Some(this) = context.upgrade() else {
                break;
            };
            let _guard = this.pass_lock.lock().await;
            let pass = this.next_pass.fetch_add(1, Ordering::SeqCst);
            let span = tracing::info_span!(
                "reconcile",
                pass,
                user_id = %job.session.user.id,
                live = job.intent.is_some()
            );
            this.reconcile(pass, job).instrument(span).await;
        }
    }

    /// Force `is_loading` off if `pass` is still running after the safety timeout.
    fn arm_watchdog(self: &Arc<Self>, pass: u64) {
        let context = Arc::downgrade(self);
        let timeout = self.settings.safety_timeout;
        let watchdog = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let Some(context) = context.upgrade() else {
                return;
            };
            context.state.send_if_modified(|s| {
                if s.active_pass != Some(pass) || !s.view.is_loading {
                    return false;
                }
                tracing::warn!(pass, timeout_ms = timeout.as_millis() as u64, "Safety timeout, clearing loading state");
                s.view.is_loading = false;
                if s.view.phase == Phase::Initializing {
                    s.view.phase = Phase::Ready;
                }
                true
            });
        });

        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.retain(|task| !task.is_finished());
            tasks.push(watchdog);
        }
    }

    // ─── Reconciliation pass ────────────────────────────────────────────────

    async fn reconcile(self: &Arc<Self>, pass: u64, job: Job) {
        let token = job.session.access_token.clone();
        let user = job.session.user.clone();
        let live = job.intent.is_some();

        // ─────────────────────────────────────────────────────────────
        // STEP 0: Skip stale and duplicate passes
        // ─────────────────────────────────────────────────────────────
        if job.epoch != self.current_epoch() {
            tracing::info!("Signed out since this pass was queued, skipping");
            self.settle(&token);
            return;
        }
        let duplicate =
            live && self.state.borrow().last_reconciled_token.as_deref() == Some(token.as_str());
        if duplicate {
            tracing::info!("Session already reconciled, skipping");
            self.settle(&token);
            return;
        }

        // ─────────────────────────────────────────────────────────────
        // STEP 1: Set user
        // ─────────────────────────────────────────────────────────────
        let mut previous_admin = None;
        self.commit(job.epoch, |s| {
            let same_user = s.view.user.as_ref().is_some_and(|u| u.id == user.id);
            if same_user && s.view.profile.is_some() {
                previous_admin = Some(s.view.is_admin);
            } else {
                s.view.profile = None;
                s.view.is_admin = false;
                s.view.is_first_login = false;
            }
            s.view.user = Some(user.clone());
            s.view.is_loading = true;
            s.view.last_error = None;
            s.active_pass = Some(pass);
        });
        self.arm_watchdog(pass);
        tracing::info!("Reconciliation pass started");

        // ─────────────────────────────────────────────────────────────
        // STEP 2: Profile (with metadata sync), raced with admin lookup
        // ─────────────────────────────────────────────────────────────
        let fetched = if job.session.offline {
            let mut profile = Profile::new_for_user(user.id, &user.email);
            profile.role = Role::Admin;
            profile.is_paid = true;
            Ok((profile, false, true))
        } else {
            let profile = async {
                self.metadata.sync(&job.session).await;
                self.profiles.fetch_or_create(&user).await
            };
            let (profile, is_admin) =
                tokio::join!(profile, self.roles.resolve(user.id, previous_admin));
            profile.map(|f| (f.profile, f.created, is_admin))
        };

        match fetched {
            Ok((profile, created, is_admin)) => {
                tracing::info!(created, is_admin, is_paid = profile.is_paid, "Profile loaded");
                if !self.commit(job.epoch, |s| {
                    s.view.profile = Some(profile);
                    s.view.is_admin = is_admin;
                    s.view.is_first_login = created || s.view.is_first_login;
                }) {
                    return self.abandon(&token);
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Profile fetch failed, ending pass");
                let report = ErrorReport::from(&e);
                if !self.commit(job.epoch, |s| {
                    s.view.profile = None;
                    s.view.last_error = Some(report);
                    s.view.subscription = SubscriptionState::Unpaid;
                }) {
                    return self.abandon(&token);
                }
                self.finish(job.epoch, &token);
                return;
            }
        }

        // ─────────────────────────────────────────────────────────────
        // STEP 3: Subscription
        // ─────────────────────────────────────────────────────────────
        let subscription = self.subscriptions.evaluate(&job.session).await;
        tracing::info!(subscription = ?subscription, "Subscription evaluated");
        if !self.commit(job.epoch, |s| s.view.subscription = subscription) {
            return self.abandon(&token);
        }

        // ─────────────────────────────────────────────────────────────
        // STEP 4: Pending action (live sign-in only)
        // ─────────────────────────────────────────────────────────────
        if let Some(intent) = &job.intent {
            let navigation = self.pending.process(&job.session, intent).await;
            tracing::info!(navigation = ?navigation, "Pending actions processed");
            if !self.commit(job.epoch, |s| s.navigation = navigation) {
                return self.abandon(&token);
            }
        }

        self.finish(job.epoch, &token);
    }

    fn finish(&self, epoch: u64, token: &str) {
        let committed = self.commit(epoch, |s| {
            s.view.is_loading = false;
            s.view.phase = Phase::Ready;
            s.last_reconciled_token = Some(token.to_string());
        });
        if committed {
            tracing::info!("Reconciliation pass finished");
        }
        self.settle(token);
    }

    fn abandon(&self, token: &str) {
        tracing::info!("Signed out during pass, discarding results");
        self.settle(token);
    }

    fn settle(&self, token: &str) {
        self.state.send_modify(|s| {
            s.completed_passes += 1;
            s.active_pass = None;
            s.last_settled_token = Some(token.to_string());
        });
    }
}

impl Drop for AuthContext {
    fn drop(&mut self) {
        self.dispose();
    }
}
