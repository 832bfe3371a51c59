//! High-level API for the persisted session token.

use crate::{SecureStorage, StorageError, StorageKeys, StorageResult};

/// Typed access to the session entries of a storage backend.
///
/// The store is the single source of truth for the bearer token: the auth
/// session writes it on sign-in and clears it on sign-out or expiry, and the
/// request interceptor reads it for every outgoing call.
pub struct SessionStore {
    storage: Box<dyn SecureStorage>,
}

impl SessionStore {
    /// Create a new session store with the given storage backend
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Retrieve the persisted auth token, if any.
    pub fn get_auth_token(&self) -> StorageResult<Option<String>> {
        Ok(self
            .storage
            .get(StorageKeys::AUTH_TOKEN)?
            .filter(|token| !token.is_empty()))
    }

    /// Persist the auth token, replacing any previous one.
    pub fn set_auth_token(&self, token: &str) -> StorageResult<()> {
        if token.trim().is_empty() {
            return Err(StorageError::Encoding(
                "refusing to store an empty auth token".to_string(),
            ));
        }
        self.storage.set(StorageKeys::AUTH_TOKEN, token)?;
        tracing::debug!("Auth token persisted");
        Ok(())
    }

    /// Remove the auth token. Returns whether one was stored.
    pub fn clear_auth_token(&self) -> StorageResult<bool> {
        let existed = self.storage.delete(StorageKeys::AUTH_TOKEN)?;
        if existed {
            tracing::debug!("Auth token cleared");
        }
        Ok(existed)
    }

    /// Check whether a token is persisted.
    pub fn has_auth_token(&self) -> StorageResult<bool> {
        Ok(self.get_auth_token()?.is_some())
    }
}
