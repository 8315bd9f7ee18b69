//! Bearer-token slot shared by every request.
//!
//! DESIGN
//! ======
//! One token at most. Writes go to the [`TokenStore`] first and only then to
//! memory, so a token visible in memory is always persisted as well. Presence
//! is the only signal: the token is never decoded or checked for expiry.

#[cfg(test)]
#[path = "auth_test.rs"]
mod auth_test;

use std::sync::{PoisonError, RwLock};

use super::storage::{StorageError, TokenStore};

/// Storage key holding the bearer token.
pub const TOKEN_KEY: &str = "jwtToken";

pub struct AuthState {
    token: RwLock<Option<String>>,
    store: Box<dyn TokenStore>,
}

impl AuthState {
    /// Seed in-memory state from whatever token `store` already holds.
    ///
    /// An unparsable store counts as holding no token; the next `set` or
    /// `clear` rewrites it.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn load(store: Box<dyn TokenStore>) -> Result<Self, StorageError> {
        let token = match store.get(TOKEN_KEY) {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(StorageError::Format { path, source }) => {
                tracing::warn!(path = %path.display(), error = %source, "ignoring unreadable token store");
                None
            }
            Err(e) => return Err(e),
        };
        if token.is_some() {
            tracing::debug!("restored persisted bearer token");
        }
        Ok(Self { token: RwLock::new(token), store })
    }

    /// Persist `token` and make it the active credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails; memory is left untouched.
    pub fn set(&self, token: &str) -> Result<(), StorageError> {
        self.store.set(TOKEN_KEY, token)?;
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token.to_owned());
        Ok(())
    }

    /// Forget the token in memory and in storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be updated. Memory is cleared
    /// regardless.
    pub fn clear(&self) -> Result<(), StorageError> {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.store.remove(TOKEN_KEY)
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.read().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Current token, if any.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl std::fmt::Debug for AuthState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthState").field("authenticated", &self.is_authenticated()).finish_non_exhaustive()
    }
}
