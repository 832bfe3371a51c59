//! Durable session storage for the Threadline client.
//!
//! This crate provides:
//! - The `SecureStorage` backend trait
//! - A JSON-file backend (`FileStorage`) and an in-memory one (`MemoryStorage`)
//! - `SessionStore`, the typed facade holding the `auth_token` entry

mod file;
mod keys;
mod memory;
mod session;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use session::SessionStore;
pub use traits::SecureStorage;

use std::path::Path;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create a session store persisted to `path`.
pub fn create_session_store(path: &Path) -> StorageResult<SessionStore> {
    let storage = FileStorage::new(path)?;
    Ok(SessionStore::new(Box::new(storage)))
}

/// Create a session store that lives only as long as the process.
pub fn create_memory_session_store() -> SessionStore {
    SessionStore::new(Box::new(MemoryStorage::new()))
}
