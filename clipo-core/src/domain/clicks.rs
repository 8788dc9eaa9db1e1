//! Click aggregates and date ranges

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use super::result::{Error, Result};

/// One point of a click time series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickCount {
    #[serde(alias = "date")]
    pub click_date: String,
    pub count: u64,
}

impl ClickCount {
    pub fn new(click_date: impl Into<String>, count: u64) -> Self {
        Self {
            click_date: click_date.into(),
            count,
        }
    }
}

/// Turn a `{date: count}` object into an ordered series.
///
/// Iteration order is the key order of the JSON object as received.
pub fn series_from_date_map(map: Map<String, JsonValue>) -> Result<Vec<ClickCount>> {
    map.into_iter()
        .map(|(date, value)| {
            let count = value.as_u64().ok_or_else(|| {
                Error::Decode(format!("click count for {} is not a non-negative integer: {}", date, value))
            })?;
            Ok(ClickCount::new(date, count))
        })
        .collect()
}

/// Sum of all counts in a series
pub fn total_clicks(series: &[ClickCount]) -> u64 {
    series.iter().map(|c| c.count).sum()
}

/// Inclusive calendar date range used by the analytics endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::validation(format!(
                "start date {} is after end date {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// January 1st to December 31st of the given year
    pub fn year(year: i32) -> Result<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)
            .ok_or_else(|| Error::validation(format!("invalid year {}", year)))?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)
            .ok_or_else(|| Error::validation(format!("invalid year {}", year)))?;
        Ok(Self { start, end })
    }

    /// The current calendar year in local time
    pub fn current_year() -> Self {
        let year = Local::now().year();
        Self::year(year).unwrap_or(Self {
            start: NaiveDate::MIN,
            end: NaiveDate::MAX,
        })
    }

    /// Parse `YYYY-MM-DD` bounds
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map_err(|_| Error::validation(format!("invalid date '{}', expected YYYY-MM-DD", s)))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// Query parameters for `/api/urls/totalClicks` (plain dates)
    pub fn date_params(&self) -> [(&'static str, String); 2] {
        [
            ("startDate", self.start.format("%Y-%m-%d").to_string()),
            ("endDate", self.end.format("%Y-%m-%d").to_string()),
        ]
    }

    /// Query parameters for `/api/urls/analytics/{code}` (start and end of day)
    pub fn datetime_params(&self) -> [(&'static str, String); 2] {
        [
            ("startDate", format!("{}T00:00:00", self.start.format("%Y-%m-%d"))),
            ("endDate", format!("{}T23:59:59", self.end.format("%Y-%m-%d"))),
        ]
    }
}
