//! HTTP transport for the Threadline API.
//!
//! This crate provides:
//! - `ApiClient`, the shared client every API module sends through
//! - `ApiRequest` and its tagged `RequestBody`
//! - `AuthInterceptor`, which attaches the bearer token and serializes
//!   session recovery after a 401

mod client;
mod error;
mod interceptor;
mod request;

pub use client::ApiClient;
pub use error::{fingerprint, ApiError, ApiResult};
pub use interceptor::{AuthInterceptor, RecoveryHandler, RecoveryOutcome};
pub use request::{bearer_value, ApiRequest, FileUpload, MultipartPayload, RequestBody};

pub use reqwest::Method;
