//! Authentication state machine using rust-fsm.
//!
//! ## State Diagram
//!
//! ```text
//! ┌─────────────────┐
//! │  Initializing   │ (initial)
//! └────────┬────────┘
//!          │ NoStoredToken / ProbeFailed      ProbeSucceeded
//!          ▼                                        │
//! ┌─────────────────┐   CredentialsAccepted  ┌──────▼──────────┐
//! │    SignedOut    │ ─────────────────────► │    SignedIn     │
//! │                 │ ◄───────────────────── │                 │
//! └─────────────────┘   SignOutRequested /   └─────────────────┘
//!                       SessionExpired
//! ```
//!
//! There is no terminal state. Sign-out inputs are accepted in every state
//! so that signing out twice, or an expiry racing an explicit sign-out, is
//! not an error.

use rust_fsm::*;
use serde::{Deserialize, Serialize};

state_machine! {
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub auth_machine(Initializing)

    Initializing => {
        NoStoredToken => SignedOut,
        ProbeSucceeded => SignedIn,
        ProbeFailed => SignedOut,
        CredentialsAccepted => SignedIn,
        SignOutRequested => SignedOut,
        SessionExpired => SignedOut
    },
    SignedOut => {
        CredentialsAccepted => SignedIn,
        SignOutRequested => SignedOut,
        SessionExpired => SignedOut,
        ProbeFailed => SignedOut
    },
    SignedIn => {
        // Signing in again replaces the session.
        CredentialsAccepted => SignedIn,
        SignOutRequested => SignedOut,
        SessionExpired => SignedOut
    }
}

pub use auth_machine::Input as AuthMachineInput;
pub use auth_machine::State as AuthMachineState;
pub use auth_machine::StateMachine as AuthMachine;

/// Authentication state as seen by the navigation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    /// Startup check has not finished.
    Initializing,
    /// No usable session.
    SignedOut,
    /// A token is held and the interceptor is attached.
    SignedIn,
}

impl AuthState {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, AuthState::SignedIn)
    }

    /// True until the startup check settles.
    pub fn is_loading(&self) -> bool {
        matches!(self, AuthState::Initializing)
    }
}

impl From<&AuthMachineState> for AuthState {
    fn from(state: &AuthMachineState) -> Self {
        match state {
            AuthMachineState::Initializing => AuthState::Initializing,
            AuthMachineState::SignedOut => AuthState::SignedOut,
            AuthMachineState::SignedIn => AuthState::SignedIn,
        }
    }
}

impl std::fmt::Display for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            AuthState::Initializing => "initializing",
            AuthState::SignedOut => "signed_out",
            AuthState::SignedIn => "signed_in",
        };
        f.write_str(label)
    }
}

/// Payload for auth state change events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthStateChangedPayload {
    /// Current auth state.
    pub state: AuthState,
    /// User ID if a profile is loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// User email if a profile is loaded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}
