//! The dashboard's data queries
//!
//! - `MyLinks`: the user's links, newest first
//! - `TotalClicks`: account-wide clicks per day for a date range
//! - `LinkAnalytics`: clicks per day for one short code, loaded on demand

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value as JsonValue};

use crate::adapters::{ApiClient, ApiRequest};
use crate::domain::clicks::series_from_date_map;
use crate::domain::link::sort_newest_first;
use crate::domain::result::Result;
use crate::domain::{ClickCount, DateRange, ShortLink};
use crate::services::query::{Query, QuerySpec};
use crate::services::Session;

pub const MY_LINKS_PATH: &str = "/api/urls/myurls";
pub const TOTAL_CLICKS_PATH: &str = "/api/urls/totalClicks";
pub const ANALYTICS_PATH: &str = "/api/urls/analytics";

/// All links of the signed-in user
#[derive(Debug, Clone, Default)]
pub struct MyLinks;

impl QuerySpec for MyLinks {
    type Raw = Vec<ShortLink>;
    type Output = Vec<ShortLink>;

    fn tag(&self) -> &'static str {
        "my-shortenurls"
    }

    fn request(&self) -> ApiRequest {
        ApiRequest::get(MY_LINKS_PATH)
    }

    fn select(&self, mut links: Vec<ShortLink>) -> Result<Vec<ShortLink>> {
        sort_newest_first(&mut links);
        Ok(links)
    }
}

/// Clicks per day across all links
#[derive(Debug, Clone)]
pub struct TotalClicks {
    pub range: DateRange,
}

impl TotalClicks {
    pub fn new(range: DateRange) -> Self {
        Self { range }
    }
}

impl QuerySpec for TotalClicks {
    type Raw = Option<Map<String, JsonValue>>;
    type Output = Vec<ClickCount>;

    fn tag(&self) -> &'static str {
        "url-totalclick"
    }

    fn params(&self) -> Vec<String> {
        self.range.date_params().into_iter().map(|(_, v)| v).collect()
    }

    fn request(&self) -> ApiRequest {
        self.range
            .date_params()
            .into_iter()
            .fold(ApiRequest::get(TOTAL_CLICKS_PATH), |req, (k, v)| req.query(k, v))
    }

    fn select(&self, raw: Option<Map<String, JsonValue>>) -> Result<Vec<ClickCount>> {
        series_from_date_map(raw.unwrap_or_default())
    }
}

/// Clicks per day for a single short code
#[derive(Debug, Clone)]
pub struct LinkAnalytics {
    pub short_code: String,
    pub range: DateRange,
}

impl LinkAnalytics {
    pub fn new(short_code: impl Into<String>, range: DateRange) -> Self {
        Self {
            short_code: short_code.into(),
            range,
        }
    }
}

impl QuerySpec for LinkAnalytics {
    type Raw = Option<Vec<ClickCount>>;
    type Output = Vec<ClickCount>;

    fn tag(&self) -> &'static str {
        "url-analytics"
    }

    fn params(&self) -> Vec<String> {
        let mut params = vec![self.short_code.clone()];
        params.extend(self.range.datetime_params().into_iter().map(|(_, v)| v));
        params
    }

    fn request(&self) -> ApiRequest {
        let path = format!("{}/{}", ANALYTICS_PATH, self.short_code);
        self.range
            .datetime_params()
            .into_iter()
            .fold(ApiRequest::get(path), |req, (k, v)| req.query(k, v))
    }

    fn select(&self, raw: Option<Vec<ClickCount>>) -> Result<Vec<ClickCount>> {
        Ok(raw.unwrap_or_default())
    }
}

pub type MyLinksQuery = Query<MyLinks>;
pub type TotalClicksQuery = Query<TotalClicks>;
pub type LinkAnalyticsQuery = Query<LinkAnalytics>;

/// Fetch-My-Links
pub fn my_links_query(api: Arc<ApiClient>, session: Arc<Session>, stale_time: Duration) -> MyLinksQuery {
    Query::new(MyLinks, api, session, stale_time)
}

/// Fetch-Total-Clicks
pub fn total_clicks_query(
    api: Arc<ApiClient>,
    session: Arc<Session>,
    range: DateRange,
    stale_time: Duration,
) -> TotalClicksQuery {
    Query::new(TotalClicks::new(range), api, session, stale_time)
}

/// Fetch-Link-Analytics. Never served from cache: every `fetch` loads.
pub fn link_analytics_query(
    api: Arc<ApiClient>,
    session: Arc<Session>,
    short_code: &str,
    range: DateRange,
) -> LinkAnalyticsQuery {
    Query::new(LinkAnalytics::new(short_code, range), api, session, Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use crate::adapters::http::DEFAULT_TIMEOUT;
    use crate::adapters::mock_api::{MockApiConfig, MockApiServer};
    use crate::adapters::MemoryTokenStorage;
    use crate::domain::link::parse_timestamp;
    use crate::domain::result::FailureKind;
    use crate::services::query::QueryState;

    const STALE: Duration = Duration::from_secs(5);

    fn setup(config: MockApiConfig, token: Option<&str>) -> (MockApiServer, Arc<ApiClient>, Arc<Session>) {
        let server = MockApiServer::start(config).unwrap();
        let storage = match token {
            Some(t) => MemoryTokenStorage::with_token(t),
            None => MemoryTokenStorage::new(),
        };
        let session = Arc::new(Session::restore(Arc::new(storage)).unwrap());
        let api = Arc::new(
            ApiClient::with_token_source(&server.base_url(), session.clone(), DEFAULT_TIMEOUT).unwrap(),
        );
        (server, api, session)
    }

    fn range() -> DateRange {
        DateRange::year(2025).unwrap()
    }

    fn codes(state: &QueryState<Vec<ShortLink>>) -> Vec<String> {
        state
            .data()
            .map(|links| links.iter().map(|l| l.short_code.clone()).collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_my_links_sorted_newest_first() {
        let (_server, api, session) = setup(MockApiConfig::default(), Some(MockApiConfig::VALID_TOKEN));
        let query = my_links_query(api, session, STALE);
        let state = query.fetch();
        assert_eq!(codes(&state), vec!["new333", "mid222", "old111"]);
    }

    #[test]
    fn test_no_token_stays_idle_without_request() {
        let (server, api, session) = setup(MockApiConfig::default(), None);
        let links = my_links_query(api.clone(), session.clone(), STALE);
        let clicks = total_clicks_query(api, session, range(), STALE);

        assert!(!links.is_enabled());
        assert!(links.key().is_none());
        assert!(links.fetch().is_idle());
        assert!(links.refetch().is_idle());
        assert!(clicks.fetch().is_idle());
        assert!(clicks.state().is_idle());
        assert!(server.requests().is_empty());
    }

    #[test]
    fn test_fresh_result_served_from_cache() {
        let (server, api, session) = setup(MockApiConfig::default(), Some(MockApiConfig::VALID_TOKEN));
        let query = my_links_query(api, session, STALE);
        assert!(query.fetch().is_success());
        assert!(query.fetch().is_success());
        assert_eq!(server.request_count(MY_LINKS_PATH), 1);

        // Manual refetch always hits the network
        assert!(query.refetch().is_success());
        assert_eq!(server.request_count(MY_LINKS_PATH), 2);
    }

    #[test]
    fn test_stale_result_reloaded() {
        let (server, api, session) = setup(MockApiConfig::default(), Some(MockApiConfig::VALID_TOKEN));
        let query = my_links_query(api, session, Duration::from_millis(20));
        query.fetch();
        thread::sleep(Duration::from_millis(40));
        query.fetch();
        assert_eq!(server.request_count(MY_LINKS_PATH), 2);
    }

    #[test]
    fn test_invalidate_forces_reload() {
        let (server, api, session) = setup(MockApiConfig::default(), Some(MockApiConfig::VALID_TOKEN));
        let query = my_links_query(api, session, STALE);
        query.fetch();
        query.invalidate();
        query.fetch();
        assert_eq!(server.request_count(MY_LINKS_PATH), 2);
    }

    #[test]
    fn test_unauthorized_calls_back_once() {
        let (server, api, session) = setup(
            MockApiConfig {
                fail_auth: true,
                ..Default::default()
            },
            Some(MockApiConfig::VALID_TOKEN),
        );
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let query = my_links_query(api, session, STALE).with_on_error(move |failure| {
            assert_eq!(failure.kind, FailureKind::Unauthorized);
            seen.fetch_add(1, Ordering::SeqCst);
        });

        let state = query.fetch();
        assert_eq!(state.failure().map(|f| f.status), Some(Some(401)));

        // Error is sticky: no new request, no second callback
        assert!(query.fetch().is_error());
        assert!(query.state().is_error());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(server.request_count(MY_LINKS_PATH), 1);
    }

    #[test]
    fn test_refetch_recovers_from_error() {
        let (server, api, session) = setup(
            MockApiConfig {
                fail_auth: true,
                ..Default::default()
            },
            Some(MockApiConfig::VALID_TOKEN),
        );
        let query = my_links_query(api, session, STALE);
        assert!(query.fetch().is_error());

        server.set_fail_auth(false);
        assert!(query.refetch().is_success());
    }

    #[test]
    fn test_server_error_is_http_failure() {
        let (_server, api, session) = setup(
            MockApiConfig {
                fail_status: Some(503),
                ..Default::default()
            },
            Some(MockApiConfig::VALID_TOKEN),
        );
        let query = total_clicks_query(api, session, range(), STALE);
        let failure = query.fetch().failure().cloned().unwrap();
        assert_eq!(failure.kind, FailureKind::Http);
        assert_eq!(failure.status, Some(503));
    }

    #[test]
    fn test_network_failure_kind() {
        let storage = MemoryTokenStorage::with_token(MockApiConfig::VALID_TOKEN);
        let session = Arc::new(Session::restore(Arc::new(storage)).unwrap());
        let api = Arc::new(
            ApiClient::with_token_source("http://127.0.0.1:9", session.clone(), DEFAULT_TIMEOUT).unwrap(),
        );
        let query = my_links_query(api, session, STALE);
        let failure = query.fetch().failure().cloned().unwrap();
        assert_eq!(failure.kind, FailureKind::Network);
    }

    #[test]
    fn test_total_clicks_ordered_pairs() {
        let (server, api, session) = setup(MockApiConfig::default(), Some(MockApiConfig::VALID_TOKEN));
        let query = total_clicks_query(api, session, range(), STALE);
        let state = query.fetch();
        assert_eq!(
            state.into_data().unwrap(),
            vec![ClickCount::new("2025-07-28", 2), ClickCount::new("2025-07-27", 3)]
        );
        let request = server.requests().pop().unwrap();
        assert_eq!(request.query.as_deref(), Some("startDate=2025-01-01&endDate=2025-12-31"));
    }

    #[test]
    fn test_total_clicks_null_body_is_empty() {
        let (_server, api, session) = setup(
            MockApiConfig {
                total_clicks: "null".to_string(),
                ..Default::default()
            },
            Some(MockApiConfig::VALID_TOKEN),
        );
        let query = total_clicks_query(api, session, range(), STALE);
        assert_eq!(query.fetch().into_data(), Some(vec![]));
    }

    #[test]
    fn test_total_clicks_bad_shape_is_decode_failure() {
        let (_server, api, session) = setup(
            MockApiConfig {
                total_clicks: r#"{"2025-07-28": "lots"}"#.to_string(),
                ..Default::default()
            },
            Some(MockApiConfig::VALID_TOKEN),
        );
        let query = total_clicks_query(api, session, range(), STALE);
        assert_eq!(query.fetch().failure().unwrap().kind, FailureKind::Decode);
    }

    #[test]
    fn test_range_change_is_key_change() {
        let (server, api, session) = setup(MockApiConfig::default(), Some(MockApiConfig::VALID_TOKEN));
        let query = total_clicks_query(api, session, range(), STALE);
        query.fetch();
        let before = query.key().unwrap();

        query.set_spec(TotalClicks::new(DateRange::year(2024).unwrap()));
        assert_ne!(query.key().unwrap(), before);
        assert!(query.state().is_idle());
        assert!(query.fetch().is_success());
        assert_eq!(server.request_count(TOTAL_CLICKS_PATH), 2);
    }

    #[test]
    fn test_logout_returns_to_idle() {
        let (_server, api, session) = setup(MockApiConfig::default(), Some(MockApiConfig::VALID_TOKEN));
        let query = my_links_query(api, session.clone(), STALE);
        assert!(query.fetch().is_success());

        session.clear().unwrap();
        assert!(query.state().is_idle());
        assert!(query.fetch().is_idle());
    }

    #[test]
    fn test_token_swap_drops_previous_data() {
        let (server, api, session) = setup(MockApiConfig::default(), Some(MockApiConfig::VALID_TOKEN));
        let query = my_links_query(api, session.clone(), STALE);
        assert!(query.fetch().is_success());

        session.set_token(Some(MockApiConfig::token_for("someone-else"))).unwrap();
        assert!(query.state().is_idle());
        assert!(query.fetch().is_success());
        assert_eq!(server.request_count(MY_LINKS_PATH), 2);
    }

    #[test]
    fn test_superseded_response_discarded() {
        // First request is held back long enough for a second one to finish
        let (server, api, session) = setup(
            MockApiConfig {
                delays: vec![300, 0],
                ..Default::default()
            },
            Some(MockApiConfig::VALID_TOKEN),
        );
        let query = Arc::new(my_links_query(api, session, STALE));

        let slow = {
            let query = Arc::clone(&query);
            thread::spawn(move || query.refetch())
        };
        // Let the slow request reach the server with the original links
        while server.request_count(MY_LINKS_PATH) == 0 {
            thread::sleep(Duration::from_millis(5));
        }
        let newer = parse_timestamp("2025-12-01T00:00:00").unwrap();
        server.set_links(vec![ShortLink::new("https://example.com/fresh", "fresh1", 1, newer)]);

        let fast = query.refetch();
        assert_eq!(codes(&fast), vec!["fresh1"]);

        // The slow answer arrives last but must not win
        let late = slow.join().unwrap();
        assert_eq!(codes(&late), vec!["fresh1"]);
        assert_eq!(codes(&query.state()), vec!["fresh1"]);
    }

    #[test]
    fn test_response_from_before_relogin_discarded() {
        let (server, api, session) = setup(
            MockApiConfig {
                delays: vec![300, 0],
                ..Default::default()
            },
            Some(MockApiConfig::VALID_TOKEN),
        );
        let query = Arc::new(my_links_query(api, session.clone(), STALE));

        let slow = {
            let query = Arc::clone(&query);
            thread::spawn(move || query.refetch())
        };
        while server.request_count(MY_LINKS_PATH) == 0 {
            thread::sleep(Duration::from_millis(5));
        }

        // Same token comes back, so the key is identical to the slow request's
        session.clear().unwrap();
        session.set_token(Some(MockApiConfig::VALID_TOKEN.to_string())).unwrap();
        let newer = parse_timestamp("2025-12-01T00:00:00").unwrap();
        server.set_links(vec![ShortLink::new("https://example.com/fresh", "fresh1", 1, newer)]);

        assert_eq!(codes(&query.refetch()), vec!["fresh1"]);
        slow.join().unwrap();
        assert_eq!(codes(&query.state()), vec!["fresh1"]);
    }

    #[test]
    fn test_link_analytics_always_loads() {
        let (server, api, session) = setup(MockApiConfig::default(), Some(MockApiConfig::VALID_TOKEN));
        let query = link_analytics_query(api, session, "mid222", range());
        let state = query.fetch();
        assert_eq!(state.data().map(|s| s.len()), Some(2));
        query.fetch();
        assert_eq!(server.request_count("/api/urls/analytics/mid222"), 2);

        let request = server.requests().pop().unwrap();
        assert_eq!(
            request.query.as_deref(),
            Some("startDate=2025-01-01T00%3A00%3A00&endDate=2025-12-31T23%3A59%3A59")
        );
    }

    #[test]
    fn test_link_analytics_unknown_code() {
        let (_server, api, session) = setup(MockApiConfig::default(), Some(MockApiConfig::VALID_TOKEN));
        let query = link_analytics_query(api, session, "nope", range());
        let failure = query.fetch().failure().cloned().unwrap();
        assert_eq!(failure.status, Some(404));
    }
}
