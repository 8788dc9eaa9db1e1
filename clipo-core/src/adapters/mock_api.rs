//! Mock Clipo backend for testing
//!
//! A small HTTP/1.1 server on a random local port that answers the same
//! routes as the real backend:
//! - POST /api/auth/public/login returns { token }
//! - POST /api/auth/public/register returns { token } or { message }
//! - GET /api/urls/myurls returns [ShortLink]
//! - GET /api/urls/totalClicks returns { date: count }
//! - GET /api/urls/analytics/{code} returns [{ clickDate, count }]
//! - POST /api/urls/shorten returns ShortLink
//! - GET /{code} answers 302 with the original URL
//!
//! Every request is recorded so tests can assert on call counts and headers.

use std::collections::{HashMap, VecDeque};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::NaiveDate;
use serde_json::{json, Value as JsonValue};

use crate::domain::{ClickCount, ShortLink};

const MOCK_SIGNATURE: &str = "mock-signature";

/// Configuration for the mock backend
#[derive(Debug, Clone)]
pub struct MockApiConfig {
    /// Links returned by /api/urls/myurls, in server order
    pub links: Vec<ShortLink>,
    /// Raw JSON object returned by /api/urls/totalClicks
    pub total_clicks: String,
    /// Series returned by /api/urls/analytics/{code} for known codes
    pub analytics: Vec<ClickCount>,
    /// Answer every authenticated route with 401
    pub fail_auth: bool,
    /// Answer every authenticated route with this status
    pub fail_status: Option<u16>,
    /// Whether registration hands out a token
    pub register_returns_token: bool,
    /// Delay in milliseconds applied to every request
    pub delay_ms: u64,
    /// Per-request delays consumed in arrival order, on top of `delay_ms`
    pub delays: Vec<u64>,
}

impl MockApiConfig {
    /// Opaque token the server always accepts
    pub const VALID_TOKEN: &'static str = "mock-valid-token";
    /// Password the login route always rejects
    pub const WRONG_PASSWORD: &'static str = "wrong-password";
    /// Username the register route reports as taken
    pub const TAKEN_USERNAME: &'static str = "taken";

    /// JWT-shaped token for `username`, accepted by this server
    pub fn token_for(username: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = json!({ "sub": username, "iat": 1_735_689_600i64 });
        let payload = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
        format!("{}.{}.{}", header, payload, MOCK_SIGNATURE)
    }

    fn default_links() -> Vec<ShortLink> {
        let at = |y, m, d| {
            NaiveDate::from_ymd_opt(y, m, d)
                .and_then(|date| date.and_hms_opt(12, 0, 0))
                .unwrap_or_default()
        };
        vec![
            ShortLink::new("https://example.com/older", "old111", 3, at(2025, 1, 10)),
            ShortLink::new("https://example.com/newest", "new333", 0, at(2025, 7, 28)),
            ShortLink::new("https://example.com/middle", "mid222", 8, at(2025, 3, 5)),
        ]
    }
}

impl Default for MockApiConfig {
    fn default() -> Self {
        Self {
            links: Self::default_links(),
            total_clicks: r#"{"2025-07-28": 2, "2025-07-27": 3}"#.to_string(),
            analytics: vec![
                ClickCount::new("2025-07-27", 1),
                ClickCount::new("2025-07-28", 4),
            ],
            fail_auth: false,
            fail_status: None,
            register_returns_token: true,
            delay_ms: 0,
            delays: Vec::new(),
        }
    }
}

/// A request as seen by the mock server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    /// Header names lowercased
    pub headers: HashMap<String, String>,
    pub body: String,
}

#[derive(Debug)]
struct MockState {
    config: MockApiConfig,
    links: Vec<ShortLink>,
    delays: VecDeque<u64>,
    requests: Vec<RecordedRequest>,
    created: usize,
}

/// Mock Clipo backend for testing
pub struct MockApiServer {
    port: u16,
    running: Arc<AtomicBool>,
    state: Arc<Mutex<MockState>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl MockApiServer {
    /// Start a new mock server on a random available port
    pub fn start(config: MockApiConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let state = Arc::new(Mutex::new(MockState {
            links: config.links.clone(),
            delays: config.delays.iter().copied().collect(),
            config,
            requests: Vec::new(),
            created: 0,
        }));

        // Non-blocking accept so stop() can end the loop
        listener.set_nonblocking(true)?;

        let running_clone = Arc::clone(&running);
        let state_clone = Arc::clone(&state);
        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let state = Arc::clone(&state_clone);
                        thread::spawn(move || handle_connection(stream, &state));
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            state,
            thread_handle: Some(thread_handle),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// All requests received so far
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .map(|s| s.requests.clone())
            .unwrap_or_default()
    }

    /// Number of requests received for a path (query string ignored)
    pub fn request_count(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }

    /// Header of the most recent request to `path`
    pub fn last_header(&self, path: &str, name: &str) -> Option<String> {
        self.requests()
            .iter()
            .rev()
            .find(|r| r.path == path)
            .and_then(|r| r.headers.get(&name.to_lowercase()).cloned())
    }

    /// Replace the links the server returns
    pub fn set_links(&self, links: Vec<ShortLink>) {
        if let Ok(mut state) = self.state.lock() {
            state.links = links;
        }
    }

    /// Toggle 401 answers on authenticated routes
    pub fn set_fail_auth(&self, fail: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.config.fail_auth = fail;
        }
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockApiServer {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Response {
    status: u16,
    body: String,
    location: Option<String>,
}

impl Response {
    fn json(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            location: None,
        }
    }

    fn message(status: u16, message: &str) -> Self {
        Self::json(status, json!({ "message": message }).to_string())
    }
}

fn read_request(stream: &mut TcpStream) -> Option<RecordedRequest> {
    stream.set_nonblocking(false).ok()?;
    stream.set_read_timeout(Some(Duration::from_secs(5))).ok()?;

    let mut data = Vec::new();
    let mut buffer = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buffer[..n]);
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next()?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
        .collect();

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    while data.len() < header_end + content_length {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..n]);
    }
    let body_end = (header_end + content_length).min(data.len());
    let body = String::from_utf8_lossy(&data[header_end..body_end]).to_string();

    let (path, query) = match target.split_once('?') {
        Some((p, q)) => (p.to_string(), Some(q.to_string())),
        None => (target, None),
    };

    Some(RecordedRequest {
        method,
        path,
        query,
        headers,
        body,
    })
}

fn handle_connection(mut stream: TcpStream, state: &Arc<Mutex<MockState>>) {
    let Some(request) = read_request(&mut stream) else {
        return;
    };

    // The answer is computed on arrival; the delay only holds it back
    let (response, delay) = match state.lock() {
        Ok(mut s) => {
            s.requests.push(request.clone());
            let delay = s.config.delay_ms + s.delays.pop_front().unwrap_or(0);
            (route(&request, &mut s), delay)
        }
        Err(_) => return,
    };
    if delay > 0 {
        thread::sleep(Duration::from_millis(delay));
    }
    send_response(&mut stream, &response);
}

fn is_accepted_token(headers: &HashMap<String, String>) -> bool {
    let Some(token) = headers
        .get("authorization")
        .and_then(|v| v.strip_prefix("Bearer "))
    else {
        return false;
    };
    token == MockApiConfig::VALID_TOKEN || token.ends_with(&format!(".{}", MOCK_SIGNATURE))
}

fn route(request: &RecordedRequest, state: &mut MockState) -> Response {
    let body: JsonValue = serde_json::from_str(&request.body).unwrap_or(JsonValue::Null);
    let field = |name: &str| body.get(name).and_then(|v| v.as_str()).unwrap_or("").to_string();

    match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/api/auth/public/login") => {
            let username = field("username");
            if username.is_empty() || field("password") == MockApiConfig::WRONG_PASSWORD {
                return Response::message(401, "Bad credentials");
            }
            Response::json(200, json!({ "token": MockApiConfig::token_for(&username) }).to_string())
        }
        ("POST", "/api/auth/public/register") => {
            let username = field("username");
            if username == MockApiConfig::TAKEN_USERNAME {
                return Response::message(400, "Username is already taken!");
            }
            if state.config.register_returns_token {
                Response::json(200, json!({ "token": MockApiConfig::token_for(&username) }).to_string())
            } else {
                Response::message(200, "User registered successfully")
            }
        }
        (method, path) if path.starts_with("/api/") => {
            if state.config.fail_auth || !is_accepted_token(&request.headers) {
                return Response::message(401, "Full authentication is required to access this resource");
            }
            if let Some(status) = state.config.fail_status {
                return Response::message(status, "Service unavailable");
            }
            route_authenticated(method, path, &field("originalUrl"), state)
        }
        ("GET", path) => {
            let code = path.trim_start_matches('/');
            match state.links.iter().find(|l| l.short_code == code) {
                Some(link) => Response {
                    status: 302,
                    body: String::new(),
                    location: Some(link.original_url.clone()),
                },
                None => Response::message(404, "Not found"),
            }
        }
        _ => Response::message(405, "Method not allowed"),
    }
}

fn route_authenticated(method: &str, path: &str, original_url: &str, state: &mut MockState) -> Response {
    match (method, path) {
        ("GET", "/api/urls/myurls") => {
            Response::json(200, serde_json::to_string(&state.links).unwrap_or_default())
        }
        ("GET", "/api/urls/totalClicks") => Response::json(200, state.config.total_clicks.clone()),
        ("GET", p) if p.starts_with("/api/urls/analytics/") => {
            let code = p.trim_start_matches("/api/urls/analytics/");
            if state.links.iter().any(|l| l.short_code == code) {
                Response::json(200, serde_json::to_string(&state.config.analytics).unwrap_or_default())
            } else {
                Response::message(404, "Short URL not found")
            }
        }
        ("POST", "/api/urls/shorten") => {
            if original_url.is_empty() {
                return Response::message(400, "originalUrl is required");
            }
            state.created += 1;
            let created_date = chrono::Utc::now().naive_utc();
            let link = ShortLink::new(original_url, format!("gen{:03}", state.created), 0, created_date);
            state.links.push(link.clone());
            Response::json(200, serde_json::to_string(&link).unwrap_or_default())
        }
        _ => Response::message(404, "Endpoint not found"),
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        302 => "Found",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

fn send_response(stream: &mut TcpStream, response: &Response) {
    let location = response
        .location
        .as_ref()
        .map(|l| format!("Location: {}\r\n", l))
        .unwrap_or_default();
    let raw = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\n{}Content-Length: {}\r\nConnection: close\r\n\r\n{}",
        response.status,
        status_text(response.status),
        location,
        response.body.len(),
        response.body
    );
    let _ = stream.write_all(raw.as_bytes());
    let _ = stream.flush();
}
