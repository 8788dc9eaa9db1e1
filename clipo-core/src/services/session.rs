//! Session service - the token store
//!
//! Single source of truth for the bearer token and the identity decoded from
//! it. Every change is written through to durable storage; readers get a
//! snapshot that is valid for the call that took it.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info};

use crate::domain::result::{Error, Result};
use crate::domain::UserIdentity;
use crate::ports::{TokenSource, TokenStorage};

#[derive(Debug, Default)]
struct SessionState {
    token: Option<String>,
    identity: Option<UserIdentity>,
    /// Bumped on every token change
    version: u64,
}

/// Authenticated session backed by a `TokenStorage`
pub struct Session {
    storage: Arc<dyn TokenStorage>,
    state: RwLock<SessionState>,
}

impl Session {
    /// Restore the session from storage. A persisted token is available
    /// immediately, before any network call.
    pub fn restore(storage: Arc<dyn TokenStorage>) -> Result<Self> {
        let token = storage.load()?.filter(|t| !t.is_empty());
        let identity = token.as_deref().and_then(UserIdentity::decode);
        debug!(restored = token.is_some(), "session restored");
        Ok(Self {
            storage,
            state: RwLock::new(SessionState {
                token,
                identity,
                version: 0,
            }),
        })
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, SessionState>> {
        self.state
            .read()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, SessionState>> {
        self.state
            .write()
            .map_err(|e| Error::Other(format!("Lock poisoned: {}", e)))
    }

    /// Replace the token. `None` (or an empty string) logs out and removes
    /// the durable entry.
    ///
    /// Storage is written first; memory only changes when that succeeded.
    pub fn set_token(&self, token: Option<String>) -> Result<()> {
        let token = token.filter(|t| !t.is_empty());
        let mut state = self.write()?;

        match &token {
            Some(t) => self.storage.save(t)?,
            None => self.storage.clear()?,
        }

        // Malformed tokens keep their value; only the identity is dropped
        state.identity = token.as_deref().and_then(UserIdentity::decode);
        state.token = token;
        state.version += 1;

        info!(
            authenticated = state.token.is_some(),
            identity = state.identity.is_some(),
            "session token changed"
        );
        Ok(())
    }

    /// Log out
    pub fn clear(&self) -> Result<()> {
        self.set_token(None)
    }

    /// Current token, if any
    pub fn token(&self) -> Option<String> {
        self.read().ok().and_then(|s| s.token.clone())
    }

    /// Identity decoded from the current token
    pub fn identity(&self) -> Option<UserIdentity> {
        self.read().ok().and_then(|s| s.identity.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().map(|s| s.token.is_some()).unwrap_or(false)
    }

    /// Monotonic counter of token changes in this process
    pub fn version(&self) -> u64 {
        self.read().map(|s| s.version).unwrap_or(0)
    }
}

impl TokenSource for Session {
    fn current_token(&self) -> Option<String> {
        self.token()
    }
}
