//! Durable token storage port

use crate::domain::result::Result;

/// Durable storage for the raw session token.
///
/// Exactly one entry is managed. Absence means logged out.
pub trait TokenStorage: Send + Sync {
    /// Read the persisted token, if any
    fn load(&self) -> Result<Option<String>>;

    /// Persist the token, replacing any previous one
    fn save(&self, token: &str) -> Result<()>;

    /// Remove the persisted token. Succeeds when nothing was stored.
    fn clear(&self) -> Result<()>;
}

/// Read access to the current token, snapshotted per request
pub trait TokenSource: Send + Sync {
    fn current_token(&self) -> Option<String>;
}
