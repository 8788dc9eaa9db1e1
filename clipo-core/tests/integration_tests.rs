//! End-to-end tests for clipo-core
//!
//! Every test runs a real `ClipoContext` against `MockApiServer` with the
//! session persisted to a temp directory.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use clipo_core::adapters::mock_api::{MockApiConfig, MockApiServer};
use clipo_core::adapters::FileTokenStorage;
use clipo_core::config::Config;
use clipo_core::domain::{Credentials, DateRange};
use clipo_core::ports::TokenStorage;
use clipo_core::services::queries::{MY_LINKS_PATH, TOTAL_CLICKS_PATH};
use clipo_core::services::AuthOutcome;
use clipo_core::{ClickCount, ClipoContext, FailureKind};

// ============================================================================
// Test Helpers
// ============================================================================

fn open_context(dir: &Path, server: &MockApiServer) -> ClipoContext {
    let backend = server.base_url();
    let mut config = Config::load_with_env(dir, |key| match key {
        "CLIPO_BACKEND_URL" => Some(backend.clone()),
        _ => None,
    })
    .expect("Failed to load config");
    config.date_range = DateRange::year(2025).unwrap();
    let storage = Arc::new(FileTokenStorage::new(dir));
    ClipoContext::with_storage(config, storage).expect("Failed to open context")
}

fn record_failures(ctx: &ClipoContext) -> Arc<Mutex<Vec<(String, FailureKind)>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    ctx.on_fetch_error(move |tag, failure| {
        sink.lock().unwrap().push((tag.to_string(), failure.kind));
    });
    seen
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

// ============================================================================
// Session persistence
// ============================================================================

#[test]
fn test_token_survives_restart() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockApiServer::start(MockApiConfig::default()).unwrap();

    let ctx = open_context(temp_dir.path(), &server);
    ctx.session.set_token(Some("abc.def.ghi".to_string())).unwrap();
    assert_eq!(ctx.session.token().as_deref(), Some("abc.def.ghi"));
    drop(ctx);

    let storage = FileTokenStorage::new(temp_dir.path());
    assert_eq!(storage.load().unwrap().as_deref(), Some("abc.def.ghi"));

    let restarted = open_context(temp_dir.path(), &server);
    assert_eq!(restarted.session.token().as_deref(), Some("abc.def.ghi"));
    assert!(server.requests().is_empty());
}

#[test]
fn test_malformed_token_kept_without_identity() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockApiServer::start(MockApiConfig::default()).unwrap();
    let ctx = open_context(temp_dir.path(), &server);

    ctx.session.set_token(Some("not-a-jwt".to_string())).unwrap();
    assert!(ctx.session.identity().is_none());
    assert_eq!(ctx.session.token().as_deref(), Some("not-a-jwt"));

    let storage = FileTokenStorage::new(temp_dir.path());
    assert_eq!(storage.load().unwrap().as_deref(), Some("not-a-jwt"));
}

// ============================================================================
// Query gating and error routing
// ============================================================================

#[test]
fn test_logged_out_dashboard_is_idle() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockApiServer::start(MockApiConfig::default()).unwrap();
    let ctx = open_context(temp_dir.path(), &server);
    let failures = record_failures(&ctx);

    let view = ctx.dashboard.load();
    assert!(view.links.is_idle());
    assert!(view.clicks.is_idle());
    assert!(view.summary().is_none());
    assert!(server.requests().is_empty());
    assert!(failures.lock().unwrap().is_empty());
}

#[test]
fn test_unauthorized_routes_each_failure_once() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockApiServer::start(MockApiConfig {
        fail_auth: true,
        ..Default::default()
    })
    .unwrap();
    let ctx = open_context(temp_dir.path(), &server);
    ctx.session
        .set_token(Some(MockApiConfig::token_for("alice")))
        .unwrap();
    let failures = record_failures(&ctx);

    let view = ctx.dashboard.load();
    assert!(view.links.failure().unwrap().is_unauthorized());
    assert!(view.clicks.failure().unwrap().is_unauthorized());

    // A second render does not refire the callback
    ctx.dashboard.load();
    let seen = failures.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            ("my-shortenurls".to_string(), FailureKind::Unauthorized),
            ("url-totalclick".to_string(), FailureKind::Unauthorized),
        ]
    );
}

// ============================================================================
// Login -> dashboard -> logout
// ============================================================================

#[test]
fn test_login_then_dashboard_loads() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockApiServer::start(MockApiConfig {
        delay_ms: 150,
        ..Default::default()
    })
    .unwrap();
    let ctx = open_context(temp_dir.path(), &server);
    let failures = record_failures(&ctx);

    let outcome = ctx
        .auth_service
        .login(&Credentials::new("alice", "secret"))
        .unwrap();
    assert!(matches!(outcome, AuthOutcome::SignedIn { identity: Some(_) }));
    assert!(ctx.dashboard.view().links.is_idle());

    thread::scope(|scope| {
        let loader = scope.spawn(|| ctx.dashboard.load());
        assert!(wait_until(|| ctx.dashboard.links().state().is_loading()));
        let view = loader.join().unwrap();

        let links = view.links.data().unwrap();
        assert_eq!(links[0].short_code, "new333");
        assert_eq!(
            view.clicks.data().unwrap(),
            &vec![ClickCount::new("2025-07-28", 2), ClickCount::new("2025-07-27", 3)]
        );
        assert_eq!(view.summary().unwrap().total_clicks, 5);
    });

    assert!(failures.lock().unwrap().is_empty());
    assert_eq!(
        server.last_header(MY_LINKS_PATH, "authorization"),
        Some(format!("Bearer {}", MockApiConfig::token_for("alice")))
    );
}

#[test]
fn test_logout_returns_queries_to_idle() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockApiServer::start(MockApiConfig::default()).unwrap();
    let ctx = open_context(temp_dir.path(), &server);
    let failures = record_failures(&ctx);

    ctx.auth_service
        .login(&Credentials::new("alice", "secret"))
        .unwrap();
    assert!(ctx.dashboard.load().summary().is_some());

    ctx.auth_service.logout().unwrap();
    let view = ctx.dashboard.view();
    assert!(view.links.is_idle());
    assert!(view.clicks.is_idle());
    assert!(!view.links.is_error());
    assert!(ctx.dashboard.load().links.is_idle());

    assert!(!temp_dir.path().join("session.json").exists());
    assert!(failures.lock().unwrap().is_empty());
}

#[test]
fn test_shorten_then_refresh_shows_new_link() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockApiServer::start(MockApiConfig::default()).unwrap();
    let ctx = open_context(temp_dir.path(), &server);
    ctx.auth_service
        .login(&Credentials::new("alice", "secret"))
        .unwrap();
    assert_eq!(ctx.dashboard.load().links.data().unwrap().len(), 3);

    let link = ctx.link_service.shorten("https://example.com/fresh").unwrap();
    assert_eq!(ctx.dashboard.load().links.data().unwrap().len(), 3);

    let links = ctx.dashboard.refresh().links.into_data().unwrap();
    assert_eq!(links.len(), 4);
    assert_eq!(links[0].short_code, link.short_code);
    assert_eq!(server.request_count(MY_LINKS_PATH), 2);
    assert_eq!(server.request_count(TOTAL_CLICKS_PATH), 2);
}

#[test]
fn test_link_analytics_on_demand() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockApiServer::start(MockApiConfig::default()).unwrap();
    let ctx = open_context(temp_dir.path(), &server);
    let failures = record_failures(&ctx);
    ctx.auth_service
        .login(&Credentials::new("alice", "secret"))
        .unwrap();

    assert!(ctx.link_analytics("../etc", DateRange::year(2025).unwrap()).is_err());

    let analytics = ctx
        .link_analytics("old111", DateRange::year(2025).unwrap())
        .unwrap();
    assert_eq!(analytics.fetch().data().map(|s| s.len()), Some(2));

    let missing = ctx
        .link_analytics("gone99", DateRange::year(2025).unwrap())
        .unwrap();
    assert_eq!(missing.fetch().failure().unwrap().status, Some(404));
    assert_eq!(
        failures.lock().unwrap().clone(),
        vec![("url-analytics".to_string(), FailureKind::Http)]
    );
}

#[test]
fn test_redirect_resolution() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockApiServer::start(MockApiConfig::default()).unwrap();
    let ctx = open_context(temp_dir.path(), &server);

    assert_eq!(
        ctx.redirect_service.target("mid222").unwrap(),
        format!("{}/mid222", server.base_url())
    );
    assert_eq!(
        ctx.redirect_service.resolve("mid222").unwrap(),
        "https://example.com/middle"
    );
}

#[test]
fn test_failure_callback_once_per_failure() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockApiServer::start(MockApiConfig::default()).unwrap();
    let ctx = open_context(temp_dir.path(), &server);
    ctx.session
        .set_token(Some(MockApiConfig::token_for("alice")))
        .unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    ctx.on_fetch_error(move |_, _| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    server.set_fail_auth(true);
    ctx.dashboard.load();
    ctx.dashboard.load();
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Explicit refetch may fail again and reports again
    ctx.dashboard.refresh();
    assert_eq!(calls.load(Ordering::SeqCst), 4);

    server.set_fail_auth(false);
    assert!(ctx.dashboard.refresh().summary().is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 4);
}
