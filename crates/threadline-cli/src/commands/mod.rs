//! CLI command implementations.

mod auth;
mod feed;

pub use auth::{login, logout, profile, register, status};
pub use feed::{feed, notifications};

use crate::output::{self, OutputFormat};
use anyhow::Result;
use api_transport::{ApiClient, ApiError};
use auth_session::{AuthError, SessionManager};
use client_config::{Config, Paths};
use social_api::SocialApi;
use std::sync::Arc;
use tracing::{debug, warn};

/// Everything a command needs: the settled session and the domain API,
/// both sending through one client.
pub struct AppContext {
    pub config: Config,
    pub session: Arc<SessionManager>,
    pub api: SocialApi,
}

impl AppContext {
    /// Build the store, client and session, then run the startup check.
    pub async fn connect(config: Config, paths: &Paths) -> Result<Self> {
        let store = Arc::new(session_storage::create_session_store(
            &paths.session_file(),
        )?);
        let client = Arc::new(ApiClient::new(&config)?);
        let session = SessionManager::from_config(client.clone(), store, &config);
        let api = SocialApi::new(client, config.services.clone());

        match session.initialize().await {
            Ok(state) => debug!(state = %state, "Session initialized"),
            // Session is settled as signed out with the token kept.
            Err(AuthError::Api(e)) => warn!(error = %e, "Could not verify stored session"),
            Err(e) => return Err(e.into()),
        }

        Ok(Self {
            config,
            session,
            api,
        })
    }

    /// Print an error and return false unless signed in.
    fn require_signed_in(&self, format: &OutputFormat) -> bool {
        if self.session.require_signed_in().is_ok() {
            return true;
        }
        output::print_error("Not signed in. Run 'threadline login' first", format);
        false
    }
}

/// Report a failed API call. A 401 has already signed the session out.
fn report_api_error(error: &ApiError, format: &OutputFormat) {
    if error.is_unauthorized() {
        output::print_error(
            "Session expired. Run 'threadline login' to sign in again",
            format,
        );
    } else {
        output::print_error(&error.to_string(), format);
    }
}
