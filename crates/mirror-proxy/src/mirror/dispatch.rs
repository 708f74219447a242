//! One outbound exchange toward one destination.
//!
//! A dispatch never fails out of band: transport errors come back as
//! [`DispatchOutcome::Failure`], and any HTTP status, 4xx/5xx included, is a
//! [`DispatchOutcome::Success`].

use std::sync::Arc;
use std::time::Instant;

use axum::http::header::HOST;
use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use tracing::Instrument;

use super::events::{self, EventSink, MirrorEvent};
use super::snapshot::RequestSnapshot;
use crate::error::DispatchError;

/// A fully read upstream reply.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// A dispatch that did not produce an HTTP reply.
#[derive(Debug)]
pub struct DispatchFailure {
    /// Destination base URL as configured.
    pub destination: String,
    pub error: DispatchError,
}

/// Result of one dispatch.
#[derive(Debug)]
pub enum DispatchOutcome {
    Success(UpstreamResponse),
    Failure(DispatchFailure),
}

impl DispatchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Success(_))
    }
}

/// Build the URL a destination is called with.
///
/// Only the query string is carried over; the inbound path is dropped, since
/// each destination base URL already names the path it wants. An empty query
/// adds no trailing `?`.
pub fn forward_url(destination: &str, query: Option<&str>) -> String {
    match query {
        Some(query) if !query.is_empty() => format!("{destination}?{query}"),
        _ => destination.to_string(),
    }
}

/// Inbound headers minus `Host`; the client derives `Host` from the forward URL.
pub fn outbound_headers(headers: &HeaderMap) -> HeaderMap {
    let mut headers = headers.clone();
    headers.remove(HOST);
    headers
}

/// Sends snapshots to destinations. Cheap to clone (shares the client pool).
#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    sink: Arc<dyn EventSink>,
}

impl Dispatcher {
    /// `client` carries the timeout and redirect policy applied to every dispatch.
    pub fn new(client: reqwest::Client, sink: Arc<dyn EventSink>) -> Self {
        Self { client, sink }
    }

    pub fn sink(&self) -> &dyn EventSink {
        self.sink.as_ref()
    }

    /// Replay `snapshot` against the destination at `index`.
    pub async fn dispatch(
        &self,
        snapshot: &RequestSnapshot,
        index: usize,
        destination: &str,
    ) -> DispatchOutcome {
        let url = forward_url(destination, snapshot.query());
        let span = mirror_tracing::dispatch_span!(snapshot.request_id(), index, destination);
        let start = Instant::now();

        async {
            events::emit(
                self.sink(),
                &MirrorEvent::DispatchStarted {
                    request_id: snapshot.request_id(),
                    index,
                    forward_url: &url,
                },
            );

            let result = self.exchange(snapshot, &url).await;

            let latency = start.elapsed().as_millis() as u64;
            tracing::Span::current().record("latency_ms", latency);

            match result {
                Ok(response) => {
                    tracing::Span::current().record("status", response.status.as_u16());
                    events::emit(
                        self.sink(),
                        &MirrorEvent::DispatchCompleted {
                            request_id: snapshot.request_id(),
                            index,
                            forward_url: &url,
                            status: response.status,
                            response_size: response.body.len(),
                            latency_ms: latency,
                        },
                    );
                    DispatchOutcome::Success(response)
                }
                Err(error) => {
                    tracing::Span::current().record("status", 0_u16);
                    events::emit(
                        self.sink(),
                        &MirrorEvent::DispatchFailed {
                            request_id: snapshot.request_id(),
                            index,
                            destination,
                            error: &error,
                            latency_ms: latency,
                        },
                    );
                    DispatchOutcome::Failure(DispatchFailure {
                        destination: destination.to_string(),
                        error,
                    })
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn exchange(
        &self,
        snapshot: &RequestSnapshot,
        url: &str,
    ) -> Result<UpstreamResponse, DispatchError> {
        let response = self
            .client
            .request(snapshot.method().clone(), url)
            .headers(outbound_headers(snapshot.headers()))
            .body(snapshot.body().clone())
            .send()
            .await?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}
