//! Immutable capture of an inbound request.
//!
//! The inbound body stream can be read once, but every destination needs its
//! own copy. The snapshot buffers it in full (no streaming) and is then
//! shared read-only behind an `Arc` by all dispatches of the request.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequest, Request};
use axum::http::header::HOST;
use axum::http::{HeaderMap, Method, Uri};
use bytes::Bytes;
use serde_json::{Map, Value};

use crate::error::SnapshotError;

/// Read-only copy of one inbound request.
///
/// Headers are kept exactly as received, `Host` included; hop-specific
/// headers are removed per dispatch, not here.
#[derive(Debug, Clone)]
pub struct RequestSnapshot {
    request_id: String,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
    client_addr: Option<SocketAddr>,
}

impl RequestSnapshot {
    /// Capture `request`, buffering its whole body.
    ///
    /// The body limit is the router's `DefaultBodyLimit` (axum's default when
    /// none is configured). Reading happens before any dispatch starts.
    pub async fn capture(request: Request, request_id: String) -> Result<Self, SnapshotError> {
        let client_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        let method = request.method().clone();
        let uri = request.uri().clone();
        let headers = request.headers().clone();

        let body = Bytes::from_request(request, &()).await?;

        Ok(Self {
            request_id,
            method,
            uri,
            headers,
            body,
            client_addr,
        })
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Original path and query.
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Absolute URL as the client addressed it, rebuilt from `Host` when the
    /// request line only carried a path. Falls back to the path alone.
    pub fn absolute_url(&self) -> String {
        if self.uri.scheme().is_some() {
            return self.uri.to_string();
        }
        let path = self
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        match self.headers.get(HOST).and_then(|host| host.to_str().ok()) {
            Some(host) => format!("http://{host}{path}"),
            None => path.to_string(),
        }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr
    }

    /// Raw (still percent-encoded) query string, if the request had one.
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Decoded query parameters. Repeated keys become arrays.
    pub fn query_params(&self) -> Map<String, Value> {
        let mut params = Map::new();
        if let Some(query) = self.query() {
            for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
                insert_multi(&mut params, key.into_owned(), value.into_owned());
            }
        }
        params
    }

    /// Headers as a JSON object for logging. Multi-valued headers become arrays.
    pub fn headers_json(&self) -> Value {
        let mut map = Map::new();
        for (name, value) in self.headers.iter() {
            insert_multi(
                &mut map,
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            );
        }
        Value::Object(map)
    }

    /// Body for logging: parsed JSON when it parses, text otherwise, null when empty.
    pub fn body_json(&self) -> Value {
        if self.body.is_empty() {
            return Value::Null;
        }
        serde_json::from_slice(&self.body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.body).into_owned()))
    }
}

fn insert_multi(map: &mut Map<String, Value>, key: String, value: String) {
    match map.get_mut(&key) {
        Some(Value::Array(values)) => values.push(Value::String(value)),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, Value::String(value)]);
        }
        None => {
            map.insert(key, Value::String(value));
        }
    }
}
