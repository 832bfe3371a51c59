//! Session management using FSM-based state tracking.
//!
//! `SessionManager` owns the auth state machine, the in-memory copy of the
//! token and user, and the decision of when the client's auth interceptor is
//! attached. The persisted token lives in the `SessionStore`.

use crate::auth_fsm::{AuthMachine, AuthMachineInput, AuthState, AuthStateChangedPayload};
use crate::models::{AuthUser, Credentials, Registration, TokenResponse};
use crate::recovery::ForcedSignOut;
use crate::{AuthError, AuthResult};
use api_transport::{fingerprint, ApiClient, ApiError, ApiRequest, AuthInterceptor};
use client_config::Config;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use session_storage::SessionStore;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Callback type for auth state change notifications.
pub type AuthStateCallback = Box<dyn Fn(AuthStateChangedPayload) + Send + Sync>;

/// Session manager for authentication state with FSM-based state tracking.
pub struct SessionManager {
    client: Arc<ApiClient>,
    store: Arc<SessionStore>,
    users_path: String,
    recovery_wait: Duration,
    /// Internal FSM for tracking auth state transitions.
    fsm: Mutex<AuthMachine>,
    token: RwLock<Option<String>>,
    user: RwLock<Option<AuthUser>>,
    /// Optional callback for state change notifications.
    state_callback: Mutex<Option<AuthStateCallback>>,
    this: Weak<SessionManager>,
}

impl SessionManager {
    /// Create a session manager whose user endpoints sit at the API root.
    pub fn new(
        client: Arc<ApiClient>,
        store: Arc<SessionStore>,
        recovery_wait: Duration,
    ) -> Arc<Self> {
        Self::with_users_path(client, store, "", recovery_wait)
    }

    /// Create a session manager whose user endpoints sit under `users_path`.
    pub fn with_users_path(
        client: Arc<ApiClient>,
        store: Arc<SessionStore>,
        users_path: &str,
        recovery_wait: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            client,
            store,
            users_path: users_path.trim_end_matches('/').to_string(),
            recovery_wait,
            fsm: Mutex::new(AuthMachine::new()),
            token: RwLock::new(None),
            user: RwLock::new(None),
            state_callback: Mutex::new(None),
            this: this.clone(),
        })
    }

    /// Create a session manager with the users path and recovery wait from `config`.
    pub fn from_config(
        client: Arc<ApiClient>,
        store: Arc<SessionStore>,
        config: &Config,
    ) -> Arc<Self> {
        Self::with_users_path(
            client,
            store,
            &config.services.users,
            config.recovery_wait_timeout(),
        )
    }

    /// Set a callback to be notified of auth state changes.
    pub fn set_state_callback(&self, callback: AuthStateCallback) {
        *self.state_callback.lock() = Some(callback);
    }

    /// The client this session authenticates.
    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    pub fn state(&self) -> AuthState {
        AuthState::from(self.fsm.lock().state())
    }

    pub fn is_signed_in(&self) -> bool {
        self.state().is_signed_in()
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    /// The last profile loaded, if any.
    pub fn auth_user(&self) -> Option<AuthUser> {
        self.user.read().clone()
    }

    /// The in-memory copy of the session token.
    pub fn cached_token(&self) -> Option<String> {
        self.token.read().clone()
    }

    /// Fail with [`AuthError::NotSignedIn`] unless a session is active.
    pub fn require_signed_in(&self) -> AuthResult<()> {
        if self.is_signed_in() {
            Ok(())
        } else {
            Err(AuthError::NotSignedIn)
        }
    }

    /// Transition the FSM and notify callback if state changed.
    fn transition(&self, input: &AuthMachineInput) -> AuthResult<AuthState> {
        let mut fsm = self.fsm.lock();
        let old_state = AuthState::from(fsm.state());

        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;

        let new_state = AuthState::from(fsm.state());
        drop(fsm);

        if old_state != new_state {
            debug!(
                old_state = %old_state,
                new_state = %new_state,
                "Auth state transition"
            );
            self.notify_state_change(new_state);
        }

        Ok(new_state)
    }

    fn notify_state_change(&self, state: AuthState) {
        let cb = self.state_callback.lock();
        if let Some(callback) = cb.as_ref() {
            let (user_id, email) = self
                .auth_user()
                .map(|user| (Some(user.id.to_string()), Some(user.email)))
                .unwrap_or((None, None));

            callback(AuthStateChangedPayload {
                state,
                user_id,
                email,
            });
        }
    }

    /// Settle the startup state from the persisted token.
    ///
    /// Only valid while `Initializing`. Without a token the session is
    /// signed out and nothing is fetched. With one, `GET /profile` is
    /// probed: success signs in and caches the profile. A 401 or 403 purges
    /// the token and signs out. Any other failure signs out but keeps the
    /// token for the next start, and the error is returned.
    pub async fn initialize(&self) -> AuthResult<AuthState> {
        let state = self.state();
        if state != AuthState::Initializing {
            return Err(AuthError::InvalidStateTransition(format!(
                "Cannot initialize in state {:?}",
                state
            )));
        }

        let token = match self.store.get_auth_token()? {
            Some(token) => token,
            None => {
                info!("No stored session token on startup");
                return self.transition(&AuthMachineInput::NoStoredToken);
            }
        };

        debug!(token = %fingerprint(&token), "Probing stored session");
        match self.probe(&token).await {
            Ok(user) => {
                info!(user_id = user.id, "Stored session verified");
                *self.user.write() = Some(user);
                *self.token.write() = Some(token.clone());
                self.attach_interceptor(&token);
                self.transition(&AuthMachineInput::ProbeSucceeded)
            }
            Err(e) if rejects_token(&e) => {
                warn!(error = %e, "Stored session rejected, clearing it");
                self.store.clear_auth_token()?;
                self.clear_memory();
                self.transition(&AuthMachineInput::ProbeFailed)
            }
            Err(e) => {
                warn!(error = %e, "Could not verify stored session, keeping token");
                self.clear_memory();
                self.transition(&AuthMachineInput::ProbeFailed)?;
                Err(AuthError::Api(e))
            }
        }
    }

    async fn probe(&self, token: &str) -> Result<AuthUser, ApiError> {
        let mut request = ApiRequest::get(self.users_url("/profile")).without_recovery();
        request.set_bearer(token)?;
        self.client.send_as(request).await
    }

    /// Sign in with email and password.
    ///
    /// The profile is not fetched; call [`Self::fetch_user_profile`] after.
    pub async fn sign_in(&self, credentials: &Credentials) -> AuthResult<AuthState> {
        info!(email = %credentials.email, "Signing in");
        let response = self
            .exchange_credentials(&self.users_url("/login"), credentials)
            .await?;
        self.accept_token(response.access_token)
    }

    /// Register a new account and sign in with the returned token.
    pub async fn sign_up(&self, registration: &Registration) -> AuthResult<AuthState> {
        info!(email = %registration.email, "Registering account");
        let response = self
            .exchange_credentials(&self.users_url("/register"), registration)
            .await?;
        self.accept_token(response.access_token)
    }

    async fn exchange_credentials<B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> AuthResult<TokenResponse> {
        let request = ApiRequest::post(path).with_json(body)?.without_recovery();
        match self.client.send_as::<TokenResponse>(request).await {
            Ok(response) => Ok(response),
            Err(ApiError::HttpStatus { status, body }) if (400..500).contains(&status) => {
                warn!(status, path = %path, "Credentials rejected");
                Err(AuthError::InvalidCredentials(rejection_detail(status, &body)))
            }
            Err(e) => Err(AuthError::Api(e)),
        }
    }

    fn accept_token(&self, token: String) -> AuthResult<AuthState> {
        if token.trim().is_empty() {
            return Err(AuthError::InvalidCredentials(
                "server returned an empty access token".to_string(),
            ));
        }
        self.store.set_auth_token(&token)?;
        debug!(token = %fingerprint(&token), "Session token stored");
        *self.token.write() = Some(token.clone());
        self.attach_interceptor(&token);
        let state = self.transition(&AuthMachineInput::CredentialsAccepted)?;
        info!("Signed in");
        Ok(state)
    }

    /// Sign out. Safe to call in any state.
    pub fn sign_out(&self) -> AuthResult<AuthState> {
        let had_token = self.end_session()?;
        info!(had_token, "Signed out");
        self.transition(&AuthMachineInput::SignOutRequested)
    }

    /// Forced sign-out after the server rejected the session token.
    pub fn expire_session(&self) -> AuthResult<AuthState> {
        let had_token = self.end_session()?;
        warn!(had_token, "Session expired, signing out");
        self.transition(&AuthMachineInput::SessionExpired)
    }

    /// Forced sign-out on behalf of the session that was using `token`.
    ///
    /// A rejection of a token that is no longer current belongs to an
    /// earlier session and leaves the current one untouched; `None` is
    /// returned in that case.
    pub fn expire_session_for(&self, token: &str) -> AuthResult<Option<AuthState>> {
        if self.cached_token().as_deref() != Some(token) {
            debug!(token = %fingerprint(token), "Rejected token is no longer current");
            return Ok(None);
        }
        self.expire_session().map(Some)
    }

    fn end_session(&self) -> AuthResult<bool> {
        self.client.detach_interceptor();
        let had_token = self.store.clear_auth_token()?;
        self.clear_memory();
        Ok(had_token)
    }

    fn clear_memory(&self) {
        self.token.write().take();
        self.user.write().take();
    }

    /// Load the signed-in user's profile.
    ///
    /// Uses the cached token, falling back to the persisted one. Returns
    /// `Ok(None)` without a request when there is no token at all.
    pub async fn fetch_user_profile(&self) -> AuthResult<Option<AuthUser>> {
        let token = match self.cached_token() {
            Some(token) => token,
            None => match self.store.get_auth_token()? {
                Some(token) => {
                    debug!("Token cache empty, using persisted token");
                    *self.token.write() = Some(token.clone());
                    token
                }
                None => {
                    debug!("No session token, skipping profile fetch");
                    return Ok(None);
                }
            },
        };

        let mut request = ApiRequest::get(self.users_url("/profile"));
        request.set_bearer(&token)?;
        let user: AuthUser = self.client.send_as(request).await?;

        debug!(user_id = user.id, "Profile loaded");
        *self.user.write() = Some(user.clone());
        Ok(Some(user))
    }

    fn attach_interceptor(&self, token: &str) {
        let handler = Arc::new(ForcedSignOut::new(self.this.clone(), token));
        let interceptor = AuthInterceptor::new(self.store.clone(), handler, self.recovery_wait);
        self.client.attach_interceptor(Arc::new(interceptor));
    }

    fn users_url(&self, suffix: &str) -> String {
        format!("{}{}", self.users_path, suffix)
    }
}

/// Whether a failed probe means the server refused the token itself.
fn rejects_token(error: &ApiError) -> bool {
    matches!(error.status(), Some(401) | Some(403))
}

/// Human-readable reason from an error body (`detail` or `message`), or
/// the status when the body has neither.
fn rejection_detail(status: u16, body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| {
            ["detail", "message", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(|v| v.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| format!("HTTP {}", status))
}
