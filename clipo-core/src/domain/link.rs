//! Short link domain model

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize};

/// A shortened URL as returned by `/api/urls/myurls`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShortLink {
    pub original_url: String,
    /// Short code, resolved by the backend at `/{code}`
    #[serde(rename = "shortUrl")]
    pub short_code: String,
    #[serde(default)]
    pub click_count: u64,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_date: NaiveDateTime,
}

impl ShortLink {
    pub fn new(
        original_url: impl Into<String>,
        short_code: impl Into<String>,
        click_count: u64,
        created_date: NaiveDateTime,
    ) -> Self {
        Self {
            original_url: original_url.into(),
            short_code: short_code.into(),
            click_count,
            created_date,
        }
    }
}

/// Sort links newest first. Stable, so equal timestamps keep server order.
pub fn sort_newest_first(links: &mut [ShortLink]) {
    links.sort_by(|a, b| b.created_date.cmp(&a.created_date));
}

/// Parse the timestamp shapes the backend is known to send:
/// local date-time (with or without fractional seconds), RFC 3339, or a bare date.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(dt);
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> std::result::Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| D::Error::custom(format!("invalid timestamp: {}", raw)))
}
