//! Query engine - cached, keyed data fetches
//!
//! A `Query` turns an API call into a value that moves through
//! `Idle -> Loading -> Success | Error`:
//!
//! - disabled (no token) queries stay `Idle` and never touch the network
//! - a `Success` is served from cache while younger than the stale time
//! - an `Error` sticks to its key until `refetch` or a key change
//! - every request takes a generation from a cache-wide counter; an answer
//!   whose generation is no longer current for its key is dropped instead
//!   of overwriting newer state, including across a session change

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::adapters::{ApiClient, ApiRequest};
use crate::domain::result::{FetchFailure, Result};
use crate::services::Session;

/// Cache key: resource tag, token, then parameters
pub type QueryKey = Vec<String>;

/// Invoked once each time a query lands in `Error`
pub type ErrorCallback = Arc<dyn Fn(&FetchFailure) + Send + Sync>;

/// Observable state of a query
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
    Idle,
    Loading,
    Success(T),
    Error(FetchFailure),
}

impl<T> QueryState<T> {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Self::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&FetchFailure> {
        match self {
            Self::Error(failure) => Some(failure),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Success(_) => "success",
            Self::Error(_) => "error",
        }
    }
}

#[derive(Debug)]
struct Entry<T> {
    generation: u64,
    state: QueryState<T>,
    fetched_at: Option<Instant>,
}

impl<T> Default for Entry<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            state: QueryState::Idle,
            fetched_at: None,
        }
    }
}

/// Proof that a request was started for a key at a given generation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    key: QueryKey,
    generation: u64,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Keyed state store with staleness and generation tracking
pub struct QueryCache<T> {
    entries: Mutex<HashMap<QueryKey, Entry<T>>>,
    // Never reset, so a ticket issued before `clear` cannot match a later one
    generations: AtomicU64,
    stale_time: Duration,
}

impl<T: Clone> QueryCache<T> {
    pub fn new(stale_time: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            generations: AtomicU64::new(0),
            stale_time,
        }
    }

    pub fn stale_time(&self) -> Duration {
        self.stale_time
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry<T>>> {
        // Entries are plain data; a panic mid-update cannot leave them torn
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// State for a key; unknown keys are `Idle`
    pub fn state(&self, key: &QueryKey) -> QueryState<T> {
        self.lock()
            .get(key)
            .map(|e| e.state.clone())
            .unwrap_or(QueryState::Idle)
    }

    /// Whether the key holds a success younger than the stale time
    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        self.lock().get(key).is_some_and(|e| {
            e.state.is_success() && e.fetched_at.is_some_and(|at| at.elapsed() < self.stale_time)
        })
    }

    /// Start a request: bump the generation and move to `Loading`
    pub fn begin(&self, key: &QueryKey) -> Ticket {
        let mut entries = self.lock();
        let entry = entries.entry(key.clone()).or_default();
        entry.generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        entry.state = QueryState::Loading;
        Ticket {
            key: key.clone(),
            generation: entry.generation,
        }
    }

    /// Finish a request. Returns the new state, or `None` when a newer
    /// request for the same key has started since `ticket` was issued.
    pub fn complete(
        &self,
        ticket: Ticket,
        outcome: std::result::Result<T, FetchFailure>,
    ) -> Option<QueryState<T>> {
        let mut entries = self.lock();
        let entry = entries.get_mut(&ticket.key)?;
        if entry.generation != ticket.generation {
            debug!(
                stale = ticket.generation,
                current = entry.generation,
                "discarding superseded response"
            );
            return None;
        }

        entry.state = match outcome {
            Ok(data) => {
                entry.fetched_at = Some(Instant::now());
                QueryState::Success(data)
            }
            Err(failure) => {
                entry.fetched_at = None;
                QueryState::Error(failure)
            }
        };
        Some(entry.state.clone())
    }

    /// Mark a key stale so the next `fetch` goes to the network
    pub fn invalidate(&self, key: &QueryKey) {
        if let Some(entry) = self.lock().get_mut(key) {
            entry.fetched_at = None;
        }
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// What a query fetches and how the answer is shaped
pub trait QuerySpec: Clone + Send + Sync {
    /// Wire shape of the response body
    type Raw: DeserializeOwned;
    /// Shape handed to callers
    type Output: Clone + Send;

    /// Resource tag, first element of the key
    fn tag(&self) -> &'static str;

    /// Parameters appended to the key after the token
    fn params(&self) -> Vec<String> {
        Vec::new()
    }

    /// Request to send, without authorization
    fn request(&self) -> ApiRequest;

    /// Turn the wire shape into the output
    fn select(&self, raw: Self::Raw) -> Result<Self::Output>;
}

/// A token-gated, cached API query
pub struct Query<S: QuerySpec> {
    spec: Mutex<S>,
    api: Arc<ApiClient>,
    session: Arc<Session>,
    cache: QueryCache<S::Output>,
    on_error: Option<ErrorCallback>,
    session_version: Mutex<u64>,
}

impl<S: QuerySpec> fmt::Debug for Query<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("stale_time", &self.cache.stale_time())
            .field("entries", &self.cache.len())
            .finish()
    }
}

impl<S: QuerySpec> Query<S> {
    pub fn new(spec: S, api: Arc<ApiClient>, session: Arc<Session>, stale_time: Duration) -> Self {
        let version = session.version();
        Self {
            spec: Mutex::new(spec),
            api,
            session,
            cache: QueryCache::new(stale_time),
            on_error: None,
            session_version: Mutex::new(version),
        }
    }

    /// Register the callback run when a fetch fails
    pub fn with_on_error(mut self, callback: impl Fn(&FetchFailure) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(callback));
        self
    }

    fn spec(&self) -> MutexGuard<'_, S> {
        self.spec.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Change the parameters. The key changes with them, so the next
    /// `fetch` loads fresh data.
    pub fn set_spec(&self, spec: S) {
        *self.spec() = spec;
    }

    /// Run `f` against the current parameters
    pub fn with_spec<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.spec())
    }

    /// Copy of the parameters; one fetch works from a single snapshot
    fn snapshot(&self) -> S {
        self.spec().clone()
    }

    fn key_for(spec: &S, token: &str) -> QueryKey {
        let mut key = vec![spec.tag().to_string(), token.to_string()];
        key.extend(spec.params());
        key
    }

    /// Current key, or `None` while there is no token
    pub fn key(&self) -> Option<QueryKey> {
        self.session.token().map(|t| Self::key_for(&self.spec(), &t))
    }

    pub fn is_enabled(&self) -> bool {
        self.session.is_authenticated()
    }

    /// Entries cached under a previous token are dropped on the first
    /// access after the session changed
    fn sync_session(&self) {
        let current = self.session.version();
        let mut seen = self.session_version.lock().unwrap_or_else(|e| e.into_inner());
        if *seen != current {
            debug!(from = *seen, to = current, "session changed, dropping cached queries");
            self.cache.clear();
            *seen = current;
        }
    }

    /// Current state without any network activity
    pub fn state(&self) -> QueryState<S::Output> {
        self.sync_session();
        match self.key() {
            Some(key) => self.cache.state(&key),
            None => QueryState::Idle,
        }
    }

    /// Load unless the key holds fresh data or a sticky error
    pub fn fetch(&self) -> QueryState<S::Output> {
        self.sync_session();
        let Some(token) = self.session.token() else {
            return QueryState::Idle;
        };
        let spec = self.snapshot();
        let key = Self::key_for(&spec, &token);

        if self.cache.is_fresh(&key) {
            return self.cache.state(&key);
        }
        match self.cache.state(&key) {
            state @ QueryState::Error(_) => state,
            _ => self.run(&spec, &token, key),
        }
    }

    /// Load regardless of freshness or a previous error
    pub fn refetch(&self) -> QueryState<S::Output> {
        self.sync_session();
        let Some(token) = self.session.token() else {
            return QueryState::Idle;
        };
        let spec = self.snapshot();
        let key = Self::key_for(&spec, &token);
        self.run(&spec, &token, key)
    }

    /// Mark the current key stale
    pub fn invalidate(&self) {
        if let Some(key) = self.key() {
            self.cache.invalidate(&key);
        }
    }

    fn run(&self, spec: &S, token: &str, key: QueryKey) -> QueryState<S::Output> {
        let ticket = self.cache.begin(&key);
        let request = spec.request().bearer(token);

        let outcome = self
            .api
            .send::<S::Raw>(request)
            .and_then(|raw| spec.select(raw))
            .map_err(|e| FetchFailure::from(&e));

        match self.cache.complete(ticket, outcome) {
            Some(QueryState::Error(failure)) => {
                warn!(kind = %failure.kind, status = ?failure.status, "query failed");
                if let Some(callback) = &self.on_error {
                    callback(&failure);
                }
                QueryState::Error(failure)
            }
            Some(state) => state,
            // Superseded: report whatever the newer request left behind
            None => self.cache.state(&key),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::result::FailureKind;

    fn key(parts: &[&str]) -> QueryKey {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_unknown_key_is_idle() {
        let cache: QueryCache<u32> = QueryCache::new(Duration::from_secs(5));
        assert!(cache.state(&key(&["a"])).is_idle());
        assert!(!cache.is_fresh(&key(&["a"])));
    }

    #[test]
    fn test_begin_then_complete() {
        let cache: QueryCache<u32> = QueryCache::new(Duration::from_secs(5));
        let k = key(&["links", "t"]);
        let ticket = cache.begin(&k);
        assert!(cache.state(&k).is_loading());

        let state = cache.complete(ticket, Ok(7)).unwrap();
        assert_eq!(state, QueryState::Success(7));
        assert!(cache.is_fresh(&k));
    }

    #[test]
    fn test_stale_response_discarded() {
        let cache: QueryCache<u32> = QueryCache::new(Duration::from_secs(5));
        let k = key(&["links", "t"]);
        let first = cache.begin(&k);
        let second = cache.begin(&k);
        assert!(second.generation() > first.generation());

        assert_eq!(cache.complete(second, Ok(2)), Some(QueryState::Success(2)));
        assert_eq!(cache.complete(first, Ok(1)), None);
        assert_eq!(cache.state(&k), QueryState::Success(2));
    }

    #[test]
    fn test_stale_error_discarded() {
        let cache: QueryCache<u32> = QueryCache::new(Duration::from_secs(5));
        let k = key(&["links", "t"]);
        let first = cache.begin(&k);
        let second = cache.begin(&k);
        cache.complete(second, Ok(2));
        let failure = FetchFailure::new(FailureKind::Network, "boom");
        assert_eq!(cache.complete(first, Err(failure)), None);
        assert!(cache.state(&k).is_success());
    }

    #[test]
    fn test_ticket_from_before_clear_discarded() {
        let cache: QueryCache<u32> = QueryCache::new(Duration::from_secs(5));
        let k = key(&["links", "t"]);
        let old = cache.begin(&k);
        cache.clear();

        let current = cache.begin(&k);
        assert!(current.generation() > old.generation());
        assert_eq!(cache.complete(current, Ok(2)), Some(QueryState::Success(2)));
        assert_eq!(cache.complete(old, Ok(1)), None);
        assert_eq!(cache.state(&k), QueryState::Success(2));
    }

    #[test]
    fn test_generations_shared_across_keys() {
        let cache: QueryCache<u32> = QueryCache::new(Duration::from_secs(5));
        let a = cache.begin(&key(&["links", "a"]));
        let b = cache.begin(&key(&["links", "b"]));
        assert_ne!(a.generation(), b.generation());
    }

    #[test]
    fn test_zero_stale_time_never_fresh() {
        let cache: QueryCache<u32> = QueryCache::new(Duration::ZERO);
        let k = key(&["analytics"]);
        let ticket = cache.begin(&k);
        cache.complete(ticket, Ok(1));
        assert!(!cache.is_fresh(&k));
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache: QueryCache<u32> = QueryCache::new(Duration::from_secs(60));
        let k = key(&["links", "t"]);
        let ticket = cache.begin(&k);
        cache.complete(ticket, Ok(1));
        cache.invalidate(&k);
        assert!(!cache.is_fresh(&k));
        assert!(cache.state(&k).is_success());

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.state(&k).is_idle());
    }

    #[test]
    fn test_keys_are_independent() {
        let cache: QueryCache<u32> = QueryCache::new(Duration::from_secs(60));
        let a = key(&["links", "token-a"]);
        let b = key(&["links", "token-b"]);
        let ticket = cache.begin(&a);
        cache.complete(ticket, Ok(1));
        assert!(cache.state(&b).is_idle());
        assert_eq!(cache.len(), 1);
    }

    #[derive(Clone)]
    struct Labelled(&'static str);

    impl QuerySpec for Labelled {
        type Raw = serde_json::Value;
        type Output = String;

        fn tag(&self) -> &'static str {
            "labelled"
        }

        fn params(&self) -> Vec<String> {
            vec![self.0.to_string()]
        }

        fn request(&self) -> ApiRequest {
            ApiRequest::get("/api/urls/myurls")
        }

        fn select(&self, _raw: serde_json::Value) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn test_parameter_change_mid_fetch_keeps_key_and_data_together() {
        use crate::adapters::http::DEFAULT_TIMEOUT;
        use crate::adapters::mock_api::{MockApiConfig, MockApiServer};
        use crate::adapters::MemoryTokenStorage;

        let server = MockApiServer::start(MockApiConfig {
            delays: vec![300],
            ..Default::default()
        })
        .unwrap();
        let storage = MemoryTokenStorage::with_token(MockApiConfig::VALID_TOKEN);
        let session = Arc::new(Session::restore(Arc::new(storage)).unwrap());
        let api = Arc::new(
            ApiClient::with_token_source(&server.base_url(), session.clone(), DEFAULT_TIMEOUT).unwrap(),
        );
        let query = Arc::new(Query::new(Labelled("a"), api, session, Duration::from_secs(60)));
        let key_a = query.key().unwrap();

        let slow = {
            let query = Arc::clone(&query);
            std::thread::spawn(move || query.fetch())
        };
        while server.request_count("/api/urls/myurls") == 0 {
            std::thread::sleep(Duration::from_millis(5));
        }
        query.set_spec(Labelled("b"));

        assert_eq!(slow.join().unwrap(), QueryState::Success("a".to_string()));
        assert_eq!(query.cache.state(&key_a), QueryState::Success("a".to_string()));
        assert!(query.state().is_idle());
    }

    #[test]
    fn test_state_accessors() {
        let s: QueryState<u32> = QueryState::Success(3);
        assert_eq!(s.data(), Some(&3));
        assert_eq!(s.label(), "success");
        let e: QueryState<u32> = QueryState::Error(FetchFailure::new(FailureKind::Http, "x"));
        assert!(e.failure().is_some());
        assert!(e.clone().into_data().is_none());
        assert_eq!(e.label(), "error");
    }
}
