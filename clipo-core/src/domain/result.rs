//! Result and error types for the core library

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core library error type
#[derive(Error, Debug)]
pub enum Error {
    /// Non-2xx response. Status and body are kept exactly as received.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Not authenticated")]
    NotAuthenticated,

    /// Stored token cannot be sent as a header value
    #[error("Invalid session token: {0}")]
    InvalidToken(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a storage error
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// HTTP status code, if the server answered
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// The `message` field of a JSON error body, when the server sent one
    pub fn server_message(&self) -> Option<String> {
        let Self::Http { body, .. } = self else {
            return None;
        };
        let value: serde_json::Value = serde_json::from_str(body).ok()?;
        value
            .get("message")
            .and_then(|m| m.as_str())
            .filter(|m| !m.trim().is_empty())
            .map(str::to_string)
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;

/// Broad category of a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 401/403, or no token at request time
    Unauthorized,
    /// Connection refused, timeout, DNS
    Network,
    /// Any other non-2xx status
    Http,
    /// The server answered 2xx but the body did not match the expected shape
    Decode,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unauthorized => "unauthorized",
            Self::Network => "network",
            Self::Http => "http",
            Self::Decode => "decode",
        };
        f.write_str(s)
    }
}

/// Typed failure of a data fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
    pub status: Option<u16>,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == FailureKind::Unauthorized
    }
}

impl fmt::Display for FetchFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} failure (HTTP {}): {}", self.kind, status, self.message),
            None => write!(f, "{} failure: {}", self.kind, self.message),
        }
    }
}

impl From<&Error> for FetchFailure {
    fn from(err: &Error) -> Self {
        let status = err.status();
        let kind = match err {
            Error::NotAuthenticated | Error::InvalidToken(_) => FailureKind::Unauthorized,
            Error::Http { status: 401 | 403, .. } => FailureKind::Unauthorized,
            Error::Http { .. } => FailureKind::Http,
            Error::Transport(e) if e.is_decode() => FailureKind::Decode,
            Error::Transport(e) if e.status().is_some() => FailureKind::Http,
            Error::Transport(_) => FailureKind::Network,
            Error::Json(_) | Error::Decode(_) => FailureKind::Decode,
            _ => FailureKind::Http,
        };
        let message = err.server_message().unwrap_or_else(|| err.to_string());
        Self {
            kind,
            message,
            status,
        }
    }
}
