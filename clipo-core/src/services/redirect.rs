//! Redirect resolution
//!
//! The backend owns `/{code}`; the client only needs to know where that is
//! and, on request, where it points.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use tracing::debug;

use crate::domain::result::{Error, Result};
use crate::services::links::validate_short_code;

/// How long the "redirecting" indicator stays up
pub const REDIRECT_DELAY: Duration = Duration::from_millis(1200);

pub const REDIRECT_MESSAGE: &str = "Redirecting you, please wait...";

pub struct RedirectService {
    client: Client,
    backend_url: String,
}

impl RedirectService {
    pub fn new(backend_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .redirect(Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            backend_url: backend_url.trim_end_matches('/').to_string(),
        })
    }

    /// Backend address that redirects to the original URL
    pub fn target(&self, short_code: &str) -> Result<String> {
        validate_short_code(short_code)?;
        Ok(format!("{}/{}", self.backend_url, short_code))
    }

    /// Ask the backend where `short_code` leads without following it.
    /// Counts as a click on the backend.
    pub fn resolve(&self, short_code: &str) -> Result<String> {
        let target = self.target(short_code)?;
        let response = self.client.get(&target).send()?;
        let status = response.status();
        debug!(short_code, status = status.as_u16(), "redirect resolved");

        if !status.is_redirection() {
            return Err(Error::Http {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }
        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::Decode(format!("Redirect for '{}' has no Location header", short_code)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::http::DEFAULT_TIMEOUT;
    use crate::adapters::mock_api::{MockApiConfig, MockApiServer};

    #[test]
    fn test_target() {
        let redirect = RedirectService::new("http://localhost:8080/", DEFAULT_TIMEOUT).unwrap();
        assert_eq!(redirect.target("abc").unwrap(), "http://localhost:8080/abc");
        assert!(redirect.target("a/b").is_err());
    }

    #[test]
    fn test_resolve_reads_location() {
        let server = MockApiServer::start(MockApiConfig::default()).unwrap();
        let redirect = RedirectService::new(&server.base_url(), DEFAULT_TIMEOUT).unwrap();
        assert_eq!(redirect.resolve("mid222").unwrap(), "https://example.com/middle");
        assert_eq!(server.request_count("/mid222"), 1);
    }

    #[test]
    fn test_resolve_unknown_code() {
        let server = MockApiServer::start(MockApiConfig::default()).unwrap();
        let redirect = RedirectService::new(&server.base_url(), DEFAULT_TIMEOUT).unwrap();
        let err = redirect.resolve("missing").unwrap_err();
        assert_eq!(err.status(), Some(404));
    }
}
