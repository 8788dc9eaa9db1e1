//! User identity decoded from the session token

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Claims read from the token payload. Not verified client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserIdentity {
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub iat: Option<i64>,
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(flatten)]
    pub claims: Map<String, JsonValue>,
}

impl UserIdentity {
    /// Best-effort decode of a JWT payload.
    ///
    /// Returns `None` for anything that is not three dot-separated segments
    /// with a base64url JSON object in the middle.
    pub fn decode(token: &str) -> Option<Self> {
        let mut parts = token.split('.');
        let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
        if parts.next().is_some() {
            return None;
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        let JsonValue::Object(mut claims) = serde_json::from_slice(&bytes).ok()? else {
            return None;
        };

        // A claim of an unexpected type is dropped on its own
        let sub = claims.remove("sub").and_then(|v| match v {
            JsonValue::String(s) => Some(s),
            JsonValue::Number(n) => Some(n.to_string()),
            _ => None,
        });
        let iat = claims.remove("iat").as_ref().and_then(numeric_date);
        let exp = claims.remove("exp").as_ref().and_then(numeric_date);
        Some(Self {
            sub,
            iat,
            exp,
            claims,
        })
    }

    /// Subject, or "User" when the token carries none
    pub fn display_name(&self) -> &str {
        self.sub.as_deref().filter(|s| !s.is_empty()).unwrap_or("User")
    }

    /// Avatar initial
    pub fn initial(&self) -> char {
        self.sub
            .as_deref()
            .and_then(|s| s.chars().next())
            .and_then(|c| c.to_uppercase().next())
            .unwrap_or('U')
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Whether `exp` lies in the past. Tokens without `exp` never expire here.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }
}

/// Seconds since the epoch; fractional values are truncated
fn numeric_date(value: &JsonValue) -> Option<i64> {
    value.as_i64().or_else(|| value.as_f64().map(|f| f as i64))
}

#[cfg(test)]
pub(crate) fn encode_test_token(payload: &JsonValue) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{}.{}.signature", header, body)
}
