//! Recovery policy for 401 responses: end the session that was rejected.

use crate::session::SessionManager;
use api_transport::{ApiError, ApiResult, RecoveryHandler, RecoveryOutcome};
use async_trait::async_trait;
use std::sync::Weak;
use tracing::debug;

/// Treats a rejected token as a forced sign-out.
///
/// Each handler is bound to the token of the session it was built for, so
/// a late 401 from an earlier session cannot end a newer one. Holds the
/// session weakly: the session owns the client, and the client owns the
/// interceptor that owns this handler.
pub struct ForcedSignOut {
    session: Weak<SessionManager>,
    token: String,
}

impl ForcedSignOut {
    pub fn new(session: Weak<SessionManager>, token: impl Into<String>) -> Self {
        Self {
            session,
            token: token.into(),
        }
    }
}

#[async_trait]
impl RecoveryHandler for ForcedSignOut {
    async fn recover(&self, trigger: &ApiError) -> ApiResult<RecoveryOutcome> {
        match self.session.upgrade() {
            Some(session) => {
                debug!(trigger = %trigger, "Signing out after rejected token");
                session
                    .expire_session_for(&self.token)
                    .map_err(|e| ApiError::Storage(e.to_string()))?;
            }
            None => debug!("Session already dropped, nothing to sign out"),
        }
        Ok(RecoveryOutcome::SignedOut)
    }
}
