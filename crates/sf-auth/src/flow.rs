//! Sign-in flow controller
//!
//! Drives the authorization-code-with-PKCE state machine:
//!
//! ```text
//! Idle -> AwaitingAuthorization -> ExchangingCode -> Authenticated
//!                (Failed is reachable from any state)
//! ```
//!
//! `start()` mints the flow secrets, opens the hosted UI in the user's
//! browser, and listens on the completion channel. The authorization code is
//! redeemed at most once per attempt regardless of how many transports
//! deliver it; a response carrying an unknown state is rejected as a forged
//! or stale redirect and logged as a security event. An unanswered attempt
//! times out rather than lingering forever.

use crate::completion::{CompletionChannel, CompletionEvent};
use crate::exchange::TokenEndpoint;
use crate::pkce::generate_pkce_challenge;
use crate::secrets::{generate_secret, DEFAULT_SECRET_LENGTH};
use crate::session::{AuthSession, CredentialPair, FlowContext, Redemption};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sf_config::AuthConfig;
use sf_keystore::CredentialStore;
use sf_types::{AppError, AppResult};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Opens a URL in an external browsing context
///
/// Implemented by the UI shell. A failure means no sign-in context could be
/// opened (e.g. pop-ups blocked) and is surfaced to the caller so it can
/// advise the user.
pub trait BrowserLauncher: Send + Sync {
    fn open(&self, url: &str) -> AppResult<()>;
}

/// Result of starting a sign-in attempt
#[derive(Debug, Clone)]
pub struct FlowStart {
    /// Authorization URL the browser was pointed at
    pub auth_url: String,

    /// Anti-CSRF state for this attempt
    pub state: String,
}

/// Externally observable flow state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowStatus {
    /// No sign-in attempt in progress
    Idle,

    /// Waiting for the user to finish in the hosted UI
    AwaitingAuthorization {
        /// Seconds until the attempt is abandoned
        time_remaining: Option<i64>,
    },

    /// Exchanging the authorization code for tokens
    ExchangingCode,

    /// Signed in; credentials are held in the session
    Authenticated,

    /// The attempt failed terminally
    Failed { message: String },
}

#[derive(Debug, Clone)]
enum Phase {
    Idle,
    AwaitingAuthorization,
    ExchangingCode,
    Authenticated,
    Failed(String),
}

enum Handled {
    /// Terminal for this attempt; stop listening
    Done,
    /// Delivery ignored; keep listening
    Ignored,
}

/// Orchestrates sign-in, refresh, and logout against one owned session
pub struct AuthFlowManager {
    inner: Arc<FlowInner>,
}

struct FlowInner {
    config: AuthConfig,
    session: RwLock<AuthSession>,
    phase: RwLock<Phase>,
    started_at: RwLock<Option<DateTime<Utc>>>,
    /// Bumped by every `start()`; listeners from superseded attempts exit
    generation: AtomicU64,
    endpoint: Arc<dyn TokenEndpoint>,
    credentials: CredentialStore,
    launcher: Arc<dyn BrowserLauncher>,
    channel: CompletionChannel,
    forced_logout_listener: RwLock<Option<Arc<dyn Fn() + Send + Sync>>>,
    security_alert: RwLock<Option<String>>,
}

impl AuthFlowManager {
    pub fn new(
        config: AuthConfig,
        endpoint: Arc<dyn TokenEndpoint>,
        credentials: CredentialStore,
        launcher: Arc<dyn BrowserLauncher>,
        channel: CompletionChannel,
    ) -> Self {
        Self {
            inner: Arc::new(FlowInner {
                config,
                session: RwLock::new(AuthSession::new()),
                phase: RwLock::new(Phase::Idle),
                started_at: RwLock::new(None),
                generation: AtomicU64::new(0),
                endpoint,
                credentials,
                launcher,
                channel,
                forced_logout_listener: RwLock::new(None),
                security_alert: RwLock::new(None),
            }),
        }
    }

    /// Register the UI callback invoked when a failed refresh forces logout
    pub fn set_forced_logout_listener(&self, listener: Arc<dyn Fn() + Send + Sync>) {
        *self.inner.forced_logout_listener.write() = Some(listener);
    }

    /// Begin a sign-in attempt
    ///
    /// Generates a fresh flow context (replacing any previous attempt), opens
    /// the hosted UI, and listens for the authorization result until it
    /// arrives or the attempt times out.
    pub async fn start(&self) -> AppResult<FlowStart> {
        let inner = &self.inner;
        let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let pkce = generate_pkce_challenge();
        let state = generate_secret(DEFAULT_SECRET_LENGTH);
        let nonce = generate_secret(DEFAULT_SECRET_LENGTH);

        let auth_url = build_authorize_url(&inner.config, &pkce.code_challenge, &state, &nonce);

        inner.session.write().begin_flow(FlowContext {
            state: state.clone(),
            code_verifier: pkce.code_verifier,
            nonce,
        });

        info!("Starting sign-in attempt {}", generation);

        if let Err(e) = inner.launcher.open(&auth_url) {
            warn!("Could not open a sign-in context: {}", e);
            inner.session.write().abandon_flow();
            inner.set_phase(Phase::Idle);
            return Err(e);
        }

        inner.set_phase(Phase::AwaitingAuthorization);
        *inner.started_at.write() = Some(Utc::now());

        let rx = inner.channel.open().await?;
        let listener_inner = Arc::clone(inner);
        tokio::spawn(async move {
            FlowInner::drive(listener_inner, rx, generation).await;
        });

        Ok(FlowStart { auth_url, state })
    }

    /// Current flow state, with the remaining authorization window
    pub fn poll_status(&self) -> FlowStatus {
        let phase = self.inner.phase.read().clone();
        match phase {
            Phase::Idle => FlowStatus::Idle,
            Phase::AwaitingAuthorization => {
                let time_remaining = self
                    .inner
                    .started_at
                    .read()
                    .map(|started| {
                        self.inner.config.flow_timeout_secs
                            - Utc::now().signed_duration_since(started).num_seconds()
                    })
                    .filter(|&remaining| remaining > 0);
                FlowStatus::AwaitingAuthorization { time_remaining }
            }
            Phase::ExchangingCode => FlowStatus::ExchangingCode,
            Phase::Authenticated => FlowStatus::Authenticated,
            Phase::Failed(message) => FlowStatus::Failed { message },
        }
    }

    /// Consume the pending security warning, if one was raised
    ///
    /// Set when an authorization response carried a state this client never
    /// issued, a possible forged redirect the user should hear about.
    pub fn take_security_alert(&self) -> Option<String> {
        self.inner.security_alert.write().take()
    }

    /// Access token currently held in the session
    pub fn access_token(&self) -> Option<String> {
        self.inner
            .session
            .read()
            .credentials()
            .map(|c| c.access_token.clone())
    }

    /// Identity token currently held in the session
    pub fn id_token(&self) -> Option<String> {
        self.inner
            .session
            .read()
            .credentials()
            .map(|c| c.id_token.clone())
    }

    /// Nonce on record for the active attempt (for identity-token validation)
    pub fn session_nonce(&self) -> Option<String> {
        self.inner.session.read().nonce().map(str::to_string)
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.read().is_authenticated()
    }

    /// Mint a fresh credential pair from the persisted refresh token
    ///
    /// On success the in-memory credentials are replaced and `next_action`
    /// runs exactly once: the UI action that needed fresh tokens in the
    /// first place. On any failure the user is signed out; there is no retry.
    pub async fn refresh(&self, next_action: impl FnOnce() + Send) -> AppResult<()> {
        let refresh_token = match self.inner.credentials.refresh_token() {
            Ok(Some(token)) => token,
            Ok(None) => {
                warn!("Refresh requested without a stored refresh token");
                self.inner.force_logout();
                return Err(AppError::Unauthorized);
            }
            Err(e) => {
                self.inner.force_logout();
                return Err(e);
            }
        };

        match self.inner.endpoint.refresh(&refresh_token).await {
            Ok(tokens) => {
                self.inner.session.write().store_credentials(CredentialPair {
                    access_token: tokens.access_token,
                    id_token: tokens.id_token,
                });
                // Providers may rotate the refresh token on use
                if let Some(ref rotated) = tokens.refresh_token {
                    self.inner.credentials.store_refresh_token(rotated)?;
                }
                self.inner.set_phase(Phase::Authenticated);
                info!("Credentials refreshed");
                next_action();
                Ok(())
            }
            Err(e) => {
                warn!("Refresh failed, signing out: {}", e);
                self.inner.force_logout();
                Err(e)
            }
        }
    }

    /// Sign out: best-effort revocation, then wipe all credentials
    pub async fn logout(&self) {
        if let Ok(Some(token)) = self.inner.credentials.refresh_token() {
            if let Err(e) = self.inner.endpoint.revoke(&token).await {
                warn!("Token revocation failed: {}", e);
            }
        }

        if let Err(e) = self.inner.credentials.clear_refresh_token() {
            warn!("Failed to clear stored refresh token: {}", e);
        }
        self.inner.session.write().reset();
        self.inner.set_phase(Phase::Idle);
        info!("Logged out");
    }
}

impl FlowInner {
    fn set_phase(&self, phase: Phase) {
        *self.phase.write() = phase;
    }

    /// Listen for the authorization result of one attempt
    async fn drive(
        inner: Arc<FlowInner>,
        mut rx: mpsc::Receiver<CompletionEvent>,
        generation: u64,
    ) {
        let timeout_secs = u64::try_from(inner.config.flow_timeout_secs).unwrap_or(0);
        let deadline = tokio::time::Instant::now() + std::time::Duration::from_secs(timeout_secs);

        loop {
            let event = match tokio::time::timeout_at(deadline, rx.recv()).await {
                Err(_) => {
                    // The user never finished (or walked away); abandon the
                    // attempt instead of leaving it pending forever
                    if inner.generation.load(Ordering::SeqCst) == generation {
                        warn!(
                            "Sign-in attempt {} timed out after {}s",
                            generation, timeout_secs
                        );
                        inner.session.write().abandon_flow();
                        inner.set_phase(Phase::Failed("Sign-in timed out".to_string()));
                    }
                    return;
                }
                Ok(None) => return,
                Ok(Some(event)) => event,
            };

            if inner.generation.load(Ordering::SeqCst) != generation {
                debug!("Ignoring delivery for superseded attempt {}", generation);
                return;
            }

            match inner.handle_completion(event).await {
                Handled::Done => return,
                Handled::Ignored => continue,
            }
        }
    }

    async fn handle_completion(&self, event: CompletionEvent) -> Handled {
        let redemption = self.session.write().redeem(&event.state);

        match redemption {
            Redemption::Mismatch => {
                // Security event: the provider echoed a state this attempt
                // never issued, so the redirect is forged or stale
                error!(
                    "Authorization response state mismatch; rejecting possible forged redirect"
                );
                *self.security_alert.write() = Some(
                    "The sign-in response could not be verified and was rejected.".to_string(),
                );
                self.session.write().abandon_flow();
                self.set_phase(Phase::Idle);
                Handled::Done
            }
            Redemption::AlreadyRedeemed => {
                debug!("Duplicate authorization delivery ignored; code already redeemed");
                Handled::Ignored
            }
            Redemption::Granted { code_verifier } => {
                self.set_phase(Phase::ExchangingCode);

                match self.endpoint.exchange_code(&event.code, &code_verifier).await {
                    Ok(tokens) => {
                        if let Some(ref refresh_token) = tokens.refresh_token {
                            if let Err(e) = self.credentials.store_refresh_token(refresh_token) {
                                warn!("Failed to persist refresh token: {}", e);
                            }
                        }
                        self.session.write().store_credentials(CredentialPair {
                            access_token: tokens.access_token,
                            id_token: tokens.id_token,
                        });
                        self.set_phase(Phase::Authenticated);
                        info!("Sign-in complete");
                    }
                    Err(e) => {
                        error!("Token exchange failed: {}", e);
                        // No partial credentials survive a failed exchange
                        self.session.write().reset();
                        self.set_phase(Phase::Failed(e.to_string()));
                    }
                }
                Handled::Done
            }
        }
    }

    fn force_logout(&self) {
        if let Err(e) = self.credentials.clear_refresh_token() {
            warn!("Failed to clear stored refresh token: {}", e);
        }
        self.session.write().reset();
        self.set_phase(Phase::Idle);

        let listener = self.forced_logout_listener.read().clone();
        if let Some(listener) = listener {
            listener();
        }
    }
}

/// Build the authorization URL for the hosted UI
fn build_authorize_url(config: &AuthConfig, code_challenge: &str, state: &str, nonce: &str) -> String {
    format!(
        "{}?client_id={}&response_type=code&scope={}&redirect_uri={}&state={}&code_challenge={}&code_challenge_method=S256&nonce={}",
        config.authorize_endpoint(),
        urlencoding::encode(&config.client_id),
        urlencoding::encode(&config.scopes_string()),
        urlencoding::encode(&config.redirect_uri()),
        urlencoding::encode(state),
        urlencoding::encode(code_challenge),
        urlencoding::encode(nonce),
    )
}
