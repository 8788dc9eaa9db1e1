//! Clipo Core - client library for the Clipo URL shortener
//!
//! Hexagonal layout:
//!
//! - **domain**: links, click aggregates, identity, auth forms, errors
//! - **ports**: token storage traits
//! - **services**: session, auth, cached queries, links, redirect, event log
//! - **adapters**: reqwest API client, token storage, mock backend

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod ports;
pub mod services;

use std::path::Path;
use std::sync::{Arc, RwLock};

use anyhow::Result;

use adapters::{ApiClient, FileTokenStorage};
use config::Config;
use ports::TokenStorage;
use services::queries::{link_analytics_query, my_links_query, total_clicks_query};
use services::*;

pub use domain::result::{Error, FailureKind, FetchFailure};
pub use domain::{ClickCount, DateRange, ShortLink, UserIdentity};

/// Receives every fetch failure together with the tag of the failing query
pub type FetchErrorHandler = Arc<dyn Fn(&str, &FetchFailure) + Send + Sync>;

/// Shared slot the queries report failures to. The handler can be set
/// after the queries were built.
#[derive(Clone, Default)]
pub struct FetchErrorRoute {
    handler: Arc<RwLock<Option<FetchErrorHandler>>>,
}

impl FetchErrorRoute {
    pub fn set(&self, handler: impl Fn(&str, &FetchFailure) + Send + Sync + 'static) {
        if let Ok(mut slot) = self.handler.write() {
            *slot = Some(Arc::new(handler));
        }
    }

    pub fn dispatch(&self, tag: &str, failure: &FetchFailure) {
        let handler = self.handler.read().ok().and_then(|h| h.clone());
        if let Some(handler) = handler {
            handler(tag, failure);
        }
    }

    fn attach<S: QuerySpec>(&self, query: Query<S>, tag: &'static str) -> Query<S> {
        let route = self.clone();
        query.with_on_error(move |failure| route.dispatch(tag, failure))
    }
}

/// Main context for Clipo operations
///
/// Holds the configuration, the session and every service built on them.
pub struct ClipoContext {
    pub config: Config,
    pub session: Arc<Session>,
    pub api: Arc<ApiClient>,
    pub auth_service: AuthService,
    pub link_service: LinkService,
    pub redirect_service: RedirectService,
    pub dashboard: DashboardService,
    errors: FetchErrorRoute,
}

impl ClipoContext {
    /// Open the context for a Clipo directory: settings.json plus the
    /// persisted session token
    pub fn new(clipo_dir: &Path) -> Result<Self> {
        let config = Config::load(clipo_dir)?;
        let storage = Arc::new(FileTokenStorage::new(clipo_dir));
        Self::with_storage(config, storage)
    }

    /// Build the context over any token storage
    pub fn with_storage(config: Config, storage: Arc<dyn TokenStorage>) -> Result<Self> {
        let session = Arc::new(Session::restore(storage)?);
        let api = Arc::new(ApiClient::with_token_source(
            &config.backend_url,
            session.clone(),
            config.timeout,
        )?);

        let errors = FetchErrorRoute::default();
        let links = errors.attach(
            my_links_query(api.clone(), session.clone(), config.stale_time),
            "my-shortenurls",
        );
        let clicks = errors.attach(
            total_clicks_query(api.clone(), session.clone(), config.date_range, config.stale_time),
            "url-totalclick",
        );

        Ok(Self {
            auth_service: AuthService::new(api.clone(), session.clone()),
            link_service: LinkService::new(api.clone(), &config.frontend_url),
            redirect_service: RedirectService::new(&config.backend_url, config.timeout)?,
            dashboard: DashboardService::new(links, clicks),
            errors,
            config,
            session,
            api,
        })
    }

    /// Route fetch failures of every query to `handler`
    pub fn on_fetch_error(&self, handler: impl Fn(&str, &FetchFailure) + Send + Sync + 'static) {
        self.errors.set(handler);
    }

    /// Analytics for one link, loaded on demand
    pub fn link_analytics(&self, short_code: &str, range: DateRange) -> Result<LinkAnalyticsQuery> {
        services::links::validate_short_code(short_code)?;
        let query = link_analytics_query(self.api.clone(), self.session.clone(), short_code, range);
        Ok(self.errors.attach(query, "url-analytics"))
    }
}
