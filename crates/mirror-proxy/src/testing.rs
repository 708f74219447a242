//! Shared helpers for async tests: event sinks and programmable upstreams.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use bytes::Bytes;
use tokio::net::TcpListener;

use crate::config::ProxyConfig;
use crate::mirror::events::{EventSink, MirrorEvent};
use crate::mirror::snapshot::RequestSnapshot;
use crate::server::AppState;

/// Records `(action, index)` for every event.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<(&'static str, Option<usize>)>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<(&'static str, Option<usize>)> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &MirrorEvent<'_>) {
        self.events
            .lock()
            .unwrap()
            .push((event.action(), event.index()));
    }
}

/// Panics on every event.
pub struct PanickingSink;

impl EventSink for PanickingSink {
    fn emit(&self, event: &MirrorEvent<'_>) {
        panic!("sink failure on {}", event.action());
    }
}

/// What an upstream saw.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// How an upstream answers.
#[derive(Debug, Clone)]
pub struct Reply {
    status: StatusCode,
    headers: Vec<(&'static str, String)>,
    body: &'static str,
    delay: Duration,
}

impl Reply {
    pub fn ok(body: &'static str) -> Self {
        Self {
            status: StatusCode::OK,
            headers: Vec::new(),
            body,
            delay: Duration::ZERO,
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn header(mut self, name: &'static str, value: &str) -> Self {
        self.headers.push((name, value.to_string()));
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// A running upstream on a random local port.
pub struct Upstream {
    pub url: String,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl Upstream {
    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.captured.lock().unwrap().clone()
    }
}

type UpstreamState = (Arc<Mutex<Vec<CapturedRequest>>>, Reply);

/// Start an upstream that records every request and answers with `reply`.
pub async fn spawn_upstream(reply: Reply) -> Upstream {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .fallback(record_and_reply)
        .with_state((captured.clone(), reply));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });

    Upstream {
        url: format!("http://{addr}"),
        captured,
    }
}

async fn record_and_reply(
    State((captured, reply)): State<UpstreamState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    captured.lock().unwrap().push(CapturedRequest {
        method,
        uri,
        headers,
        body,
    });

    if !reply.delay.is_zero() {
        tokio::time::sleep(reply.delay).await;
    }

    let mut response = (reply.status, reply.body).into_response();
    for (name, value) in &reply.headers {
        response.headers_mut().insert(
            HeaderName::from_static(*name),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    response
}

/// A URL nothing listens on.
pub fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

pub fn client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder().timeout(timeout).build().unwrap()
}

pub async fn snapshot(request: http::Request<Body>) -> RequestSnapshot {
    RequestSnapshot::capture(request, "test-request".to_string())
        .await
        .unwrap()
}

pub fn config(destinations: Vec<String>) -> ProxyConfig {
    ProxyConfig {
        forward_urls: destinations,
        host: "127.0.0.1".to_string(),
        port: 0,
        log_file: None,
        logging_level: None,
        timeout_secs: 5,
        max_redirects: 10,
        max_body_bytes: 10 * 1024 * 1024,
        tracing: Default::default(),
    }
}

pub fn state(destinations: Vec<String>, sink: Arc<dyn EventSink>, timeout: Duration) -> AppState {
    AppState::new(config(destinations), client(timeout), sink)
}
