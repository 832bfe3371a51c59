//! Credential injection and 401 recovery.
//!
//! One [`AuthInterceptor`] belongs to one [`crate::ApiClient`]. It owns the
//! recovery flag and the queue of requests waiting on a recovery, so two
//! clients never share recovery state.
//!
//! When a request comes back 401 and has not been retried yet, the first such
//! request becomes the leader: it runs the [`RecoveryHandler`] while every
//! other 401 that arrives in the meantime parks on a oneshot continuation.
//! When the handler settles, the flag clears and the queue drains exactly
//! once, with every waiter receiving the same settlement.

use crate::request::ApiRequest;
use crate::{ApiError, ApiResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use session_storage::SessionStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Result of a session recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryOutcome {
    /// A new token was obtained; queued requests are resent with it.
    Refreshed(String),
    /// The session was ended; queued requests fail with their own 401.
    SignedOut,
}

/// The recovery action run once per expiry episode.
///
/// A handler that returns [`RecoveryOutcome::Refreshed`] is responsible for
/// persisting the new token; the interceptor only reattaches it.
#[async_trait]
pub trait RecoveryHandler: Send + Sync {
    async fn recover(&self, trigger: &ApiError) -> ApiResult<RecoveryOutcome>;
}

/// What a queued request receives: the outcome, or the triggering error when
/// the handler failed.
type Settlement = Result<RecoveryOutcome, ApiError>;

#[derive(Default)]
struct RecoveryState {
    in_progress: bool,
    pending: Vec<oneshot::Sender<Settlement>>,
}

enum Role {
    Leader,
    Follower(oneshot::Receiver<Settlement>),
}

/// Attaches the bearer token and serializes 401 recovery.
pub struct AuthInterceptor {
    store: Arc<SessionStore>,
    handler: Arc<dyn RecoveryHandler>,
    recovery_wait: Duration,
    state: Mutex<RecoveryState>,
}

impl AuthInterceptor {
    /// `recovery_wait` bounds how long a queued request waits for the leader.
    pub fn new(
        store: Arc<SessionStore>,
        handler: Arc<dyn RecoveryHandler>,
        recovery_wait: Duration,
    ) -> Self {
        Self {
            store,
            handler,
            recovery_wait,
            state: Mutex::new(RecoveryState::default()),
        }
    }

    /// Prepare an outgoing request: fix `Content-Type` for the body kind and
    /// set `Authorization` from the stored token.
    ///
    /// Idempotent. The header is replaced, never appended.
    pub fn augment(&self, request: &mut ApiRequest) -> ApiResult<()> {
        request.apply_content_type();
        if let Some(token) = self.store.get_auth_token()? {
            request.set_bearer(&token)?;
        }
        Ok(())
    }

    /// Handle a failed request.
    ///
    /// Returns `Ok(())` when the caller should resend `request` once, or the
    /// error the caller should surface. Anything other than a first 401 is
    /// returned unchanged.
    pub async fn recover(&self, request: &mut ApiRequest, error: ApiError) -> ApiResult<()> {
        if !error.is_unauthorized() || request.is_retried() {
            return Err(error);
        }
        request.mark_retried();

        let role = {
            let mut state = self.state.lock();
            if state.in_progress {
                let (tx, rx) = oneshot::channel();
                state.pending.push(tx);
                Role::Follower(rx)
            } else {
                state.in_progress = true;
                Role::Leader
            }
        };

        let settlement = match role {
            Role::Leader => self.lead(request, &error).await,
            Role::Follower(rx) => {
                debug!(path = %request.path(), "Session recovery in progress, request queued");
                match tokio::time::timeout(self.recovery_wait, rx).await {
                    Ok(Ok(settlement)) => settlement,
                    Ok(Err(_)) => return Err(ApiError::RecoveryAbandoned),
                    Err(_) => {
                        warn!(
                            path = %request.path(),
                            wait_secs = self.recovery_wait.as_secs_f64(),
                            "Gave up waiting for session recovery"
                        );
                        return Err(ApiError::RecoveryTimedOut);
                    }
                }
            }
        };

        match settlement {
            Ok(RecoveryOutcome::Refreshed(token)) => request.set_bearer(&token),
            Ok(RecoveryOutcome::SignedOut) => Err(error),
            Err(trigger) => Err(trigger),
        }
    }

    async fn lead(&self, request: &ApiRequest, error: &ApiError) -> Settlement {
        let guard = RecoveryGuard {
            interceptor: self,
            armed: true,
        };
        info!(path = %request.path(), "Authorization rejected, starting session recovery");

        let settlement = match self.handler.recover(error).await {
            Ok(outcome) => {
                info!(outcome = outcome_label(&outcome), "Session recovery finished");
                Ok(outcome)
            }
            Err(handler_error) => {
                warn!(error = %handler_error, "Session recovery failed");
                Err(error.clone())
            }
        };

        guard.settle(settlement.clone());
        settlement
    }

    /// Clear the flag and release every queued request with `settlement`.
    fn finish(&self, settlement: Settlement) {
        let pending = {
            let mut state = self.state.lock();
            state.in_progress = false;
            std::mem::take(&mut state.pending)
        };
        if !pending.is_empty() {
            debug!(count = pending.len(), "Releasing queued requests");
        }
        for waiter in pending {
            // The receiver is gone if its request timed out or was dropped.
            let _ = waiter.send(settlement.clone());
        }
    }

    /// Whether a recovery is in flight.
    pub fn is_recovering(&self) -> bool {
        self.state.lock().in_progress
    }

    /// Number of requests waiting on the in-flight recovery.
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }
}

fn outcome_label(outcome: &RecoveryOutcome) -> &'static str {
    match outcome {
        RecoveryOutcome::Refreshed(_) => "refreshed",
        RecoveryOutcome::SignedOut => "signed_out",
    }
}

/// Settles the queue if the leader is dropped before its handler returns.
struct RecoveryGuard<'a> {
    interceptor: &'a AuthInterceptor,
    armed: bool,
}

impl RecoveryGuard<'_> {
    fn settle(mut self, settlement: Settlement) {
        self.armed = false;
        self.interceptor.finish(settlement);
    }
}

impl Drop for RecoveryGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Session recovery abandoned, releasing queued requests");
            self.interceptor.finish(Err(ApiError::RecoveryAbandoned));
        }
    }
}
