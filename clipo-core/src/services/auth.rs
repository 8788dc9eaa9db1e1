//! Login, registration and logout

use std::sync::Arc;

use tracing::info;

use crate::adapters::{ApiClient, ApiRequest};
use crate::domain::result::{Error, Result};
use crate::domain::{AuthMode, AuthResponse, Credentials, Registration, UserIdentity};
use crate::services::Session;

/// Toast shown when registration succeeded without signing in
pub const REGISTERED_MESSAGE: &str = "Registration successful! Please login.";

/// What a successful auth request did to the session
#[derive(Debug, Clone, PartialEq)]
pub enum AuthOutcome {
    /// A token was stored; identity is `None` when it could not be decoded
    SignedIn { identity: Option<UserIdentity> },
    /// The account exists but no token was handed out
    Registered,
}

impl AuthOutcome {
    pub fn message(&self, mode: AuthMode) -> String {
        match self {
            AuthOutcome::SignedIn { .. } => mode.success_message(),
            AuthOutcome::Registered => REGISTERED_MESSAGE.to_string(),
        }
    }
}

pub struct AuthService {
    api: Arc<ApiClient>,
    session: Arc<Session>,
}

impl AuthService {
    pub fn new(api: Arc<ApiClient>, session: Arc<Session>) -> Self {
        Self { api, session }
    }

    pub fn login(&self, credentials: &Credentials) -> Result<AuthOutcome> {
        credentials.validate()?;
        let response = self.submit(AuthMode::Login, credentials)?;
        match response.into_token() {
            Some(token) => self.sign_in(token),
            None => Err(Error::Other(AuthMode::Login.fallback_failure_message())),
        }
    }

    pub fn register(&self, registration: &Registration) -> Result<AuthOutcome> {
        registration.validate()?;
        let response = self.submit(AuthMode::Register, registration)?;
        match response.into_token() {
            Some(token) => self.sign_in(token),
            None => {
                info!("registration accepted without token");
                Ok(AuthOutcome::Registered)
            }
        }
    }

    /// Drop the token. Queries fall back to idle on their next access.
    pub fn logout(&self) -> Result<()> {
        self.session.clear()?;
        info!("logged out");
        Ok(())
    }

    fn submit<B: serde::Serialize>(&self, mode: AuthMode, body: &B) -> Result<AuthResponse> {
        let request = ApiRequest::post(mode.endpoint()).json(body)?;
        // Some backends answer with an empty body or a bare message object
        let response: Option<AuthResponse> = self.api.send(request)?;
        Ok(response.unwrap_or_default())
    }

    fn sign_in(&self, token: String) -> Result<AuthOutcome> {
        self.session.set_token(Some(token))?;
        let identity = self.session.identity();
        info!(identity = identity.is_some(), "signed in");
        Ok(AuthOutcome::SignedIn { identity })
    }
}

/// Toast text for a failed auth request: the server's `message` when it
/// sent one, otherwise the generic failure for `mode`
pub fn failure_message(mode: AuthMode, err: &Error) -> String {
    match err {
        Error::Validation(msg) => msg.clone(),
        _ => err
            .server_message()
            .unwrap_or_else(|| mode.fallback_failure_message()),
    }
}
