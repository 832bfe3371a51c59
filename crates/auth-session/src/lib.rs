//! Authentication for the Threadline client.
//!
//! This crate provides:
//! - Explicit FSM-based auth state (`Initializing`, `SignedOut`, `SignedIn`)
//! - `SessionManager`: startup probe, sign-in/up/out, profile fetch
//! - `ForcedSignOut`, the recovery policy the auth interceptor runs on a 401

mod auth_fsm;
mod error;
mod models;
mod recovery;
mod session;

pub use auth_fsm::auth_machine;
pub use auth_fsm::{
    AuthMachine, AuthMachineInput, AuthMachineState, AuthState, AuthStateChangedPayload,
};
pub use error::{AuthError, AuthResult};
pub use models::{AuthUser, Credentials, Registration, TokenResponse, UserProfile};
pub use recovery::ForcedSignOut;
pub use session::{AuthStateCallback, SessionManager};
