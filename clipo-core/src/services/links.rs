//! Link creation and sharing

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde_json::json;
use tracing::info;
use url::Url;

use crate::adapters::{ApiClient, ApiRequest};
use crate::domain::result::{Error, Result};
use crate::domain::ShortLink;

pub const SHORTEN_PATH: &str = "/api/urls/shorten";

/// Reject anything that is not a plain short code
pub fn validate_short_code(code: &str) -> Result<()> {
    static CODE: OnceLock<Regex> = OnceLock::new();
    let re = CODE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("valid short code regex"));
    if re.is_match(code) {
        Ok(())
    } else {
        Err(Error::validation(format!("'{}' is not a valid short code", code)))
    }
}

/// Only absolute http(s) URLs can be shortened
pub fn validate_target_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::validation(format!("'{}' is not a valid URL: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url),
        _ => Err(Error::validation(format!("'{}' must be an http(s) URL", raw))),
    }
}

pub struct LinkService {
    api: Arc<ApiClient>,
    frontend_url: String,
}

impl LinkService {
    pub fn new(api: Arc<ApiClient>, frontend_url: &str) -> Self {
        Self {
            api,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a short link. Callers refetch their link list afterwards.
    pub fn shorten(&self, original_url: &str) -> Result<ShortLink> {
        let url = validate_target_url(original_url)?;
        let request = ApiRequest::post(SHORTEN_PATH).json(&json!({ "originalUrl": url.as_str() }))?;
        let link: ShortLink = self.api.send(request)?;
        info!(short_code = %link.short_code, "short link created");
        Ok(link)
    }

    /// Public address of a short link
    pub fn share_url(&self, short_code: &str) -> String {
        format!("{}/s/{}", self.frontend_url, short_code)
    }

    /// Share URL without the scheme, as shown in the link list
    pub fn display_url(&self, short_code: &str) -> String {
        strip_scheme(&self.share_url(short_code)).to_string()
    }
}

fn strip_scheme(url: &str) -> &str {
    url.split_once("://").map(|(_, rest)| rest).unwrap_or(url)
}
